//! # Resonance Core Library
//!
//! Gamified productivity scoring. Completed work becomes energy, energy
//! climbs through seven color tiers over a local calendar day, and the day
//! closes into history at midnight.
//!
//! ## Architecture
//!
//! - **Ledger**: the only persisted, mutable aggregate. Transitions consume
//!   the state and return the next one; derived views are never stored.
//! - **Resonance**: how well a completion matched the user's state, which
//!   scales the energy it earns, plus harmony and streak summaries.
//! - **Decay**: inactivity warnings and capped decay, quiet during sleep.
//! - **Prediction**: forecast of the day's closing total against a goal tier.
//! - **Difficulty**: adaptive scaling of the color thresholds.
//! - **Calibration**: personal circadian peak from collected samples.
//! - **Engine**: a single writer that serializes all of the above, with an
//!   async handle that owns the background timers.
//!
//! Every time-dependent operation takes the current instant as an argument.
//!
//! ## Key Components
//!
//! - [`EnergyState`]: the ledger
//! - [`Engine`] / [`EngineHandle`]: serialized command processing
//! - [`Config`]: TOML configuration
//! - [`StateStore`]: JSON snapshot persistence

pub mod calibration;
pub mod decay;
pub mod difficulty;
pub mod energy;
pub mod engine;
pub mod error;
pub mod events;
pub mod prediction;
pub mod resonance;
pub mod storage;

pub use calibration::{CalibrationConfig, CalibrationModel, CalibrationSample, CircadianCurve};
pub use decay::{DecayConfig, DecayScheduler, DecaySignal};
pub use difficulty::{DifficultyConfig, DifficultyController, DifficultyState, DifficultyTier};
pub use energy::{
    Completion, CompletionKind, DisplayMode, EnergyColor, EnergyEntry, EnergySnapshot,
    EnergySource, EnergyState, TaskPriority,
};
pub use engine::{
    Clock, Engine, EngineHandle, EngineSnapshot, EngineState, FixedClock, SystemClock, TimerConfig,
};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Signal;
pub use prediction::{Prediction, PredictionConfig, PredictionEngine, Recommendation, ScheduledItem};
pub use resonance::{ResonanceStatus, ResonanceSummary};
pub use storage::{Config, StateStore};
