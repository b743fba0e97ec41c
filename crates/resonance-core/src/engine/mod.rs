//! Single-writer engine over the ledger and its derived models.
//!
//! The engine owns the only copy of the persisted state. Every operation
//! applies transitions as `state = transition(state, ..)` and reports what
//! happened as [`Signal`]s, so a foreground completion and a background
//! decay tick issued back to back each see the other's result.
//!
//! [`EngineHandle`] runs an engine inside a tokio task and feeds both user
//! commands and timer ticks through one queue.

mod actor;

pub use actor::{Clock, EngineHandle, FixedClock, SystemClock};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calibration::{CalibrationConfig, CalibrationModel, CalibrationSample};
use crate::decay::{DecayScheduler, DecaySignal};
use crate::difficulty::{color_index_for, DifficultyController, DifficultyState, DifficultyTier};
use crate::energy::{
    Completion, DisplayMode, EnergyColor, EnergySnapshot, EnergyState, LedgerConfig,
};
use crate::events::Signal;
use crate::prediction::{historical_average, Prediction, PredictionEngine, ScheduledItem};
use crate::resonance::summarize;
use crate::storage::Config;

/// Cadence of the background timers driven by [`EngineHandle`].
///
/// A value of zero disables that timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_warning_check_secs")]
    pub warning_check_secs: u64,
    #[serde(default = "default_decay_tick_secs")]
    pub decay_tick_secs: u64,
}

fn default_warning_check_secs() -> u64 {
    60
}
fn default_decay_tick_secs() -> u64 {
    3600
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            warning_check_secs: default_warning_check_secs(),
            decay_tick_secs: default_decay_tick_secs(),
        }
    }
}

/// Everything the engine persists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub energy: EnergyState,
    pub difficulty: DifficultyState,
    #[serde(default)]
    pub calibration: CalibrationModel,
}

impl EngineState {
    /// Fresh state anchored at `now`.
    pub fn new<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self {
            energy: EnergyState::new(now),
            difficulty: DifficultyState::new(now),
            calibration: CalibrationModel::new(),
        }
    }

    /// Rebuild from a persisted JSON value.
    ///
    /// Each part is validated on its own; a part that is missing or corrupt
    /// is replaced by its fresh value and the rest is kept.
    pub fn rehydrate<Tz: TimeZone>(value: serde_json::Value, now: &DateTime<Tz>) -> Self {
        let mut parts = match value {
            serde_json::Value::Object(map) => map,
            _ => {
                warn!("discarding persisted state: not a JSON object");
                return Self::new(now);
            }
        };

        let energy = parts
            .remove("energy")
            .map(|v| EnergyState::rehydrate(v, now))
            .unwrap_or_else(|| EnergyState::new(now));

        let difficulty = match parts.remove("difficulty").map(serde_json::from_value) {
            Some(Ok(difficulty)) => difficulty,
            Some(Err(e)) => {
                warn!("discarding persisted difficulty state: {e}");
                DifficultyState::new(now)
            }
            None => DifficultyState::new(now),
        };

        let calibration = match parts
            .remove("calibration")
            .map(serde_json::from_value::<CalibrationModel>)
        {
            Some(Ok(model)) if calibration_is_valid(&model) => model,
            Some(Ok(_)) => {
                warn!("discarding persisted calibration samples: out of range values");
                CalibrationModel::new()
            }
            Some(Err(e)) => {
                warn!("discarding persisted calibration samples: {e}");
                CalibrationModel::new()
            }
            None => CalibrationModel::new(),
        };

        Self {
            energy,
            difficulty,
            calibration,
        }
    }
}

fn calibration_is_valid(model: &CalibrationModel) -> bool {
    model.samples.iter().all(|s| {
        (0.0..24.0).contains(&s.hour_of_day) && (0.0..=100.0).contains(&s.resonance_outcome)
    })
}

/// Difficulty descriptor handed to renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultySnapshot {
    pub tier: DifficultyTier,
    pub multiplier: f64,
    pub description: String,
    pub thresholds: [i64; 7],
    /// Color index of today's total under the scaled thresholds.
    pub color_index: usize,
    pub last_evaluation: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub samples: usize,
    pub active: bool,
    pub acrophase_hour: Option<f64>,
    pub phase_shift: f64,
    pub curve_peak_hour: f64,
}

/// Read-only view of the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub energy: EnergySnapshot,
    pub difficulty: DifficultySnapshot,
    pub calibration: CalibrationSnapshot,
}

/// The serialized reducer.
#[derive(Debug, Clone)]
pub struct Engine {
    state: EngineState,
    ledger: LedgerConfig,
    decay: DecayScheduler,
    prediction: PredictionEngine,
    difficulty: DifficultyController,
    calibration: CalibrationConfig,
}

impl Engine {
    pub fn new(state: EngineState, config: &Config) -> Self {
        Self {
            state,
            ledger: config.ledger.clone(),
            decay: DecayScheduler::with_config(config.decay.clone()),
            prediction: PredictionEngine::with_config(config.prediction.clone()),
            difficulty: DifficultyController::with_config(config.difficulty.clone()),
            calibration: config.calibration.clone(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn into_state(self) -> EngineState {
        self.state
    }

    pub fn energy(&self) -> &EnergyState {
        &self.state.energy
    }

    pub fn snapshot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> EngineSnapshot {
        let energy = &self.state.energy;
        let difficulty = &self.state.difficulty;
        let calibration = &self.state.calibration;
        EngineSnapshot {
            energy: energy.snapshot(now),
            difficulty: DifficultySnapshot {
                tier: difficulty.tier,
                multiplier: difficulty.tier.multiplier(),
                description: difficulty.tier.description().to_string(),
                thresholds: difficulty.thresholds(),
                color_index: color_index_for(energy.total_energy, difficulty.tier),
                last_evaluation: difficulty.last_evaluation,
            },
            calibration: CalibrationSnapshot {
                samples: calibration.sample_count(),
                active: calibration.is_active(&self.calibration),
                acrophase_hour: calibration.acrophase(&self.calibration),
                phase_shift: calibration.phase_shift(&self.calibration),
                curve_peak_hour: calibration.curve(&self.calibration).acrophase_hour,
            },
        }
    }

    /// Forecast today's closing total against a goal color.
    ///
    /// The goal threshold follows the current difficulty tier.
    pub fn predict<Tz: TimeZone>(
        &self,
        scheduled: &[ScheduledItem],
        goal: EnergyColor,
        now: &DateTime<Tz>,
    ) -> Prediction {
        let energy = &self.state.energy;
        self.prediction.predict(
            energy,
            scheduled,
            historical_average(&energy.daily_history),
            &self.state.difficulty.thresholds(),
            goal,
            now,
        )
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Close out the previous day if needed, then run a due difficulty evaluation.
    pub fn roll_over<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Vec<Signal> {
        let mut signals = Vec::new();
        let at = now.with_timezone(&Utc);
        let energy = &self.state.energy;
        if energy.needs_reset(now) {
            let date = energy.last_reset.with_timezone(&now.timezone()).date_naive();
            let total_energy = energy.total_energy;
            let state = std::mem::take(&mut self.state.energy);
            self.state.energy = state.roll_over(now, &self.ledger);
            signals.push(Signal::DailyReset {
                date,
                total_energy,
                at,
            });
        }
        signals.extend(self.evaluate_difficulty(now));
        signals
    }

    /// Record a completed action.
    pub fn record_completion<Tz: TimeZone>(
        &mut self,
        completion: &Completion,
        now: &DateTime<Tz>,
    ) -> Vec<Signal> {
        let mut signals = self.roll_over(now);
        let at = now.with_timezone(&Utc);

        if let Some(DecaySignal::Recovery { hours_away }) =
            self.decay.on_activity(&self.state.energy, now)
        {
            signals.push(Signal::Recovery { hours_away, at });
        }

        let before = LedgerSummary::of(&self.state.energy, now);
        self.update_energy(|state| state.add_energy(completion, now));
        let energy = &self.state.energy;

        if let Some(entry) = energy.entries.last() {
            signals.push(Signal::EnergyAdded {
                entry_id: entry.id.clone(),
                source: entry.source,
                amount: entry.amount,
                total_energy: energy.total_energy,
                at,
            });
        }
        if energy.color() > before.color {
            signals.push(Signal::ColorAdvanced {
                from: before.color,
                to: energy.color(),
                at,
            });
        }
        if energy.aura_count > before.aura_count {
            signals.push(Signal::AuraEarned {
                aura_count: energy.aura_count,
                at,
            });
        }
        let summary = summarize(energy, now);
        if summary.harmony && !before.harmony {
            signals.push(Signal::HarmonyEntered {
                completed_count: summary.completed_count,
                average_resonance: summary.average_resonance.unwrap_or_default(),
                at,
            });
        }
        signals
    }

    /// Minute-cadence check: warnings only.
    pub fn tick_warning<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Vec<Signal> {
        let mut signals = self.roll_over(now);
        if let Some(DecaySignal::Warning {
            hours_inactive,
            minutes_until_decay,
        }) = self.decay.check_warning(&self.state.energy, now)
        {
            signals.push(Signal::DecayWarning {
                hours_inactive,
                minutes_until_decay,
                at: now.with_timezone(&Utc),
            });
        }
        signals
    }

    /// Hour-cadence tick: warnings and decay.
    pub fn tick_decay<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Vec<Signal> {
        let mut signals = self.roll_over(now);
        let at = now.with_timezone(&Utc);
        let energy = std::mem::take(&mut self.state.energy);
        let (energy, signal) = self.decay.tick(energy, now);
        self.state.energy = energy;

        match signal {
            Some(DecaySignal::Applied { amount, .. }) => signals.push(Signal::DecayApplied {
                amount,
                total_energy: self.state.energy.total_energy,
                at,
            }),
            Some(DecaySignal::Warning {
                hours_inactive,
                minutes_until_decay,
            }) => signals.push(Signal::DecayWarning {
                hours_inactive,
                minutes_until_decay,
                at,
            }),
            Some(DecaySignal::Recovery { .. }) | None => {}
        }
        signals
    }

    /// Run the difficulty evaluation if it is due.
    pub fn evaluate_difficulty<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Option<Signal> {
        let current = self.state.difficulty.clone();
        let (next, change) =
            self.difficulty
                .evaluate(current, &self.state.energy.daily_history, now);
        self.state.difficulty = next;
        change.map(|change| Signal::DifficultyChanged {
            from: change.from,
            to: change.to,
            avg_color_level: change.avg_color_level,
            at: now.with_timezone(&Utc),
        })
    }

    /// Add a calibration sample.
    pub fn record_sample<Tz: TimeZone>(
        &mut self,
        task_duration_minutes: u32,
        resonance_outcome: f64,
        now: &DateTime<Tz>,
    ) -> Vec<Signal> {
        let was_active = self.state.calibration.is_active(&self.calibration);
        let sample = CalibrationSample::new(now, task_duration_minutes, resonance_outcome);
        let model = std::mem::take(&mut self.state.calibration);
        self.state.calibration = model.record(sample, &self.calibration);

        let model = &self.state.calibration;
        if !was_active && model.is_active(&self.calibration) {
            vec![Signal::CalibrationActivated {
                samples: model.sample_count(),
                phase_shift: model.phase_shift(&self.calibration),
                at: now.with_timezone(&Utc),
            }]
        } else {
            Vec::new()
        }
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.update_energy(|state| state.with_display_mode(mode));
    }

    fn update_energy(&mut self, f: impl FnOnce(EnergyState) -> EnergyState) {
        let state = std::mem::take(&mut self.state.energy);
        self.state.energy = f(state);
    }
}

/// The parts of the ledger a completion's signals are computed against.
struct LedgerSummary {
    color: EnergyColor,
    aura_count: u64,
    harmony: bool,
}

impl LedgerSummary {
    fn of<Tz: TimeZone>(state: &EnergyState, now: &DateTime<Tz>) -> Self {
        Self {
            color: state.color(),
            aura_count: state.aura_count,
            harmony: summarize(state, now).harmony,
        }
    }
}
