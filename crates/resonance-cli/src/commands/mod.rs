pub mod calibration;
pub mod config;
pub mod decay;
pub mod difficulty;
pub mod energy;
pub mod predict;
pub mod watch;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use resonance_core::{Config, Engine, StateStore};

/// Config, snapshot store and engine for one invocation.
pub struct Session {
    pub config: Config,
    pub engine: Engine,
    store: StateStore,
}

impl Session {
    pub fn open<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let store = StateStore::open()?;
        let engine = Engine::new(store.load(now)?, &config);
        Ok(Self {
            config,
            engine,
            store,
        })
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.store.save(self.engine.state())?;
        Ok(())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
