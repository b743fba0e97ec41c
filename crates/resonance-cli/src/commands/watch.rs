//! Long-running mode: the engine task owns the state and the timers.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use resonance_core::{Clock, Config, Engine, EngineHandle, StateStore, SystemClock};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch())
}

async fn watch() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = StateStore::open()?;
    let engine = Engine::new(store.load(&SystemClock.now())?, &config);

    let handle = EngineHandle::spawn(engine, SystemClock, &config.engine);
    let mut signals = handle.subscribe();
    info!(path = %store.path().display(), "watching, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = signals.recv() => match received {
                Ok(signal) => println!("{}", serde_json::to_string(&signal)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "signal stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let state = handle.shutdown().await?;
    store.save(&state)?;
    info!("state saved");
    Ok(())
}
