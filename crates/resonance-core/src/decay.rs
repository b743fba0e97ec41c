//! Inactivity decay for the energy ledger.
//!
//! Decay grows with the time since the last completion, is capped per
//! invocation and per calendar day, and never runs inside the configured
//! sleep window. The scheduler only keeps warning rate-limit bookkeeping;
//! everything else is derived from the ledger and the supplied clock.
//!
//! ## Timeline after the last completion
//!
//! ```text
//! 0h ........ 3h (warning) ........ 4h (decay starts, grows 10%/h, capped)
//! ```

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::energy::EnergyState;
use crate::error::ValidationError;

/// Decay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Hours of inactivity before a warning is emitted.
    #[serde(default = "default_warning_hours")]
    pub warning_hours: f64,
    /// Hours of inactivity before decay is applied.
    #[serde(default = "default_decay_start_hours")]
    pub decay_start_hours: f64,
    /// Energy lost per invocation at the start of decay (negative).
    #[serde(default = "default_base_rate")]
    pub base_rate: i64,
    /// Cap on cumulative decay magnitude per calendar day.
    #[serde(default = "default_max_decay_per_day")]
    pub max_decay_per_day: i64,
    /// Sleep window start, local hour (inclusive).
    #[serde(default = "default_sleep_start_hour")]
    pub sleep_start_hour: u32,
    /// Sleep window end, local hour (exclusive).
    #[serde(default = "default_sleep_end_hour")]
    pub sleep_end_hour: u32,
    /// Minimum gap between two warnings.
    #[serde(default = "default_warning_interval_minutes")]
    pub warning_interval_minutes: i64,
    #[serde(default = "default_recovery_min_hours")]
    pub recovery_min_hours: f64,
    #[serde(default = "default_recovery_max_hours")]
    pub recovery_max_hours: f64,
}

fn default_true() -> bool {
    true
}
fn default_warning_hours() -> f64 {
    3.0
}
fn default_decay_start_hours() -> f64 {
    4.0
}
fn default_base_rate() -> i64 {
    -2
}
fn default_max_decay_per_day() -> i64 {
    50
}
fn default_sleep_start_hour() -> u32 {
    22
}
fn default_sleep_end_hour() -> u32 {
    7
}
fn default_warning_interval_minutes() -> i64 {
    60
}
fn default_recovery_min_hours() -> f64 {
    12.0
}
fn default_recovery_max_hours() -> f64 {
    24.0
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_hours: default_warning_hours(),
            decay_start_hours: default_decay_start_hours(),
            base_rate: default_base_rate(),
            max_decay_per_day: default_max_decay_per_day(),
            sleep_start_hour: default_sleep_start_hour(),
            sleep_end_hour: default_sleep_end_hour(),
            warning_interval_minutes: default_warning_interval_minutes(),
            recovery_min_hours: default_recovery_min_hours(),
            recovery_max_hours: default_recovery_max_hours(),
        }
    }
}

impl DecayConfig {
    /// Whether a local hour falls inside the (possibly wrapping) sleep window.
    pub fn in_sleep_window(&self, hour: u32) -> bool {
        let (start, end) = (self.sleep_start_hour, self.sleep_end_hour);
        if start == end {
            false
        } else if start > end {
            hour >= start || hour < end
        } else {
            hour >= start && hour < end
        }
    }

    /// Largest magnitude a single invocation may apply.
    pub fn per_call_cap(&self) -> i64 {
        2 * self.base_rate.abs()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, hour) in [
            ("decay.sleep_start_hour", self.sleep_start_hour),
            ("decay.sleep_end_hour", self.sleep_end_hour),
        ] {
            if hour > 23 {
                return Err(ValidationError::InvalidHour {
                    field: field.to_string(),
                    hour,
                });
            }
        }
        if self.base_rate >= 0 {
            return Err(ValidationError::InvalidValue {
                field: "decay.base_rate".to_string(),
                message: format!("must be negative, got {}", self.base_rate),
            });
        }
        if self.max_decay_per_day < 0 {
            return Err(ValidationError::InvalidValue {
                field: "decay.max_decay_per_day".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.warning_hours > self.decay_start_hours {
            return Err(ValidationError::InvalidRange {
                field: "decay.warning_hours..decay_start_hours".to_string(),
                min: self.warning_hours,
                max: self.decay_start_hours,
            });
        }
        if self.recovery_min_hours > self.recovery_max_hours {
            return Err(ValidationError::InvalidRange {
                field: "decay.recovery_min_hours..recovery_max_hours".to_string(),
                min: self.recovery_min_hours,
                max: self.recovery_max_hours,
            });
        }
        Ok(())
    }
}

/// Signals produced by the decay scheduler. None of them are errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecaySignal {
    /// Decay is about to start.
    Warning {
        hours_inactive: f64,
        minutes_until_decay: i64,
    },
    /// Energy was removed from the ledger.
    Applied { amount: i64, hours_inactive: f64 },
    /// The user came back after a long absence; no decay is charged for it.
    Recovery { hours_away: f64 },
}

/// Hours since the last completion. A last activity in the future counts as zero.
pub fn hours_since_activity<Tz: TimeZone>(state: &EnergyState, now: &DateTime<Tz>) -> f64 {
    let elapsed = now.with_timezone(&Utc) - state.last_activity;
    (elapsed.num_milliseconds() as f64 / 3_600_000.0).max(0.0)
}

/// Decay magnitude for one invocation, before the daily cap.
pub fn decay_magnitude(hours_since_activity: f64, config: &DecayConfig) -> i64 {
    if !hours_since_activity.is_finite() || hours_since_activity < config.decay_start_hours {
        return 0;
    }
    let inactive_hours = hours_since_activity - config.decay_start_hours;
    let base = config.base_rate.abs() as f64;
    let raw = (base * (1.0 + 0.1 * inactive_hours)).floor() as i64;
    raw.clamp(0, config.per_call_cap())
}

/// Remove decay from the ledger, respecting the per-call and per-day caps.
///
/// The ledger total never goes below zero and only the energy actually
/// removed is logged, so the daily cap counts real losses.
pub fn apply_decay<Tz: TimeZone>(
    state: EnergyState,
    hours_since_activity: f64,
    now: &DateTime<Tz>,
    config: &DecayConfig,
) -> EnergyState {
    let magnitude = decay_magnitude(hours_since_activity, config);
    if magnitude == 0 {
        return state;
    }

    let today = now.date_naive();
    let used = state.decay_applied_on(today, &now.timezone());
    let remaining = (config.max_decay_per_day - used).max(0);
    let capped = magnitude.min(remaining);
    if capped == 0 {
        debug!(used, "daily decay cap reached");
        return state;
    }

    let before = state.total_energy;
    let state = state.record_decay(capped, now);
    if state.total_energy < before {
        info!(
            amount = before - state.total_energy,
            hours_since_activity,
            total = state.total_energy,
            "inactivity decay applied"
        );
    }
    state
}

/// Evaluates decay and warnings on each timer tick.
#[derive(Debug, Clone, Default)]
pub struct DecayScheduler {
    config: DecayConfig,
    last_warning_at: Option<DateTime<Utc>>,
}

impl DecayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecayConfig) -> Self {
        Self {
            config,
            last_warning_at: None,
        }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    fn is_quiet<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        !self.config.enabled || self.config.in_sleep_window(now.hour())
    }

    /// Warning-only evaluation, rate limited to one per warning interval.
    pub fn check_warning<Tz: TimeZone>(
        &mut self,
        state: &EnergyState,
        now: &DateTime<Tz>,
    ) -> Option<DecaySignal> {
        if self.is_quiet(now) {
            return None;
        }
        let hours = hours_since_activity(state, now);
        if hours < self.config.warning_hours || hours >= self.config.decay_start_hours {
            return None;
        }

        let now_utc = now.with_timezone(&Utc);
        if let Some(last) = self.last_warning_at {
            if now_utc - last < Duration::minutes(self.config.warning_interval_minutes) {
                return None;
            }
        }
        self.last_warning_at = Some(now_utc);

        let minutes_until_decay = ((self.config.decay_start_hours - hours) * 60.0).ceil() as i64;
        debug!(hours, minutes_until_decay, "decay warning");
        Some(DecaySignal::Warning {
            hours_inactive: hours,
            minutes_until_decay,
        })
    }

    /// Full evaluation: warn before the decay threshold, decay past it.
    pub fn tick<Tz: TimeZone>(
        &mut self,
        state: EnergyState,
        now: &DateTime<Tz>,
    ) -> (EnergyState, Option<DecaySignal>) {
        if self.is_quiet(now) {
            return (state, None);
        }
        let hours = hours_since_activity(&state, now);
        if hours < self.config.decay_start_hours {
            let signal = self.check_warning(&state, now);
            return (state, signal);
        }

        let before = state.total_energy;
        let state = apply_decay(state, hours, now, &self.config);
        let amount = before - state.total_energy;
        let signal = (amount > 0).then_some(DecaySignal::Applied {
            amount,
            hours_inactive: hours,
        });
        (state, signal)
    }

    /// Called before a completion is recorded.
    ///
    /// Clears the warning rate limit and reports a recovery when the user
    /// returns after a long absence.
    pub fn on_activity<Tz: TimeZone>(
        &mut self,
        state: &EnergyState,
        now: &DateTime<Tz>,
    ) -> Option<DecaySignal> {
        self.last_warning_at = None;
        let hours = hours_since_activity(state, now);
        if hours >= self.config.recovery_min_hours && hours <= self.config.recovery_max_hours {
            info!(hours, "user returned after a long absence");
            Some(DecaySignal::Recovery { hours_away: hours })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::{Completion, EnergySource, EntryKind};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn ledger_with(total: i64, last_activity: DateTime<Utc>) -> EnergyState {
        let mut state = EnergyState::new(&at(0, 30))
            .add_energy(&Completion::new(EnergySource::Goals, total, "seed"), &at(0, 30));
        state.last_activity = last_activity;
        state
    }

    #[test]
    fn test_decay_magnitude_examples() {
        let config = DecayConfig::default();
        assert_eq!(decay_magnitude(3.9, &config), 0);
        assert_eq!(decay_magnitude(4.0, &config), 2);
        assert_eq!(decay_magnitude(6.0, &config), 2);
        assert_eq!(decay_magnitude(9.0, &config), 3);
        assert_eq!(decay_magnitude(14.0, &config), 4);
        assert_eq!(decay_magnitude(40.0, &config), 4);
    }

    #[test]
    fn test_sleep_window_wraps_midnight() {
        let config = DecayConfig::default();
        assert!(config.in_sleep_window(22));
        assert!(config.in_sleep_window(0));
        assert!(config.in_sleep_window(6));
        assert!(!config.in_sleep_window(7));
        assert!(!config.in_sleep_window(21));

        let daytime = DecayConfig {
            sleep_start_hour: 13,
            sleep_end_hour: 14,
            ..Default::default()
        };
        assert!(daytime.in_sleep_window(13));
        assert!(!daytime.in_sleep_window(14));
    }

    #[test]
    fn test_apply_decay_records_negative_entry() {
        let state = ledger_with(100, at(8, 0));
        let state = apply_decay(state, 4.0, &at(12, 0), &DecayConfig::default());
        assert_eq!(state.total_energy, 98);
        let entry = state.entries.last().unwrap();
        assert_eq!(entry.kind, EntryKind::Decay);
        assert_eq!(entry.amount, -2);
        assert_eq!(entry.source, EnergySource::Goals);
        // decay never counts as activity
        assert_eq!(state.last_activity, at(8, 0));
    }

    #[test]
    fn test_apply_decay_floors_at_zero() {
        let state = ledger_with(1, at(8, 0));
        let state = apply_decay(state, 14.0, &at(22, 0), &DecayConfig::default());
        assert_eq!(state.total_energy, 0);
        assert_eq!(state.entries.last().unwrap().amount, -1);

        let state = apply_decay(state, 15.0, &at(23, 0), &DecayConfig::default());
        assert_eq!(state.entries.iter().filter(|e| e.is_decay()).count(), 1);
    }

    #[test]
    fn test_daily_cap() {
        let config = DecayConfig::default();
        let mut state = ledger_with(500, at(1, 0));
        for hour in 5..20 {
            for minute in [0, 15, 30, 45] {
                state = apply_decay(state, 20.0, &at(hour, minute), &config);
            }
        }
        assert_eq!(state.decay_applied_on(at(12, 0).date_naive(), &Utc), 50);
        assert_eq!(state.total_energy, 450);
    }

    #[test]
    fn test_scheduler_warns_once_per_interval() {
        let mut scheduler = DecayScheduler::new();
        let state = ledger_with(100, at(9, 0));

        assert!(scheduler.check_warning(&state, &at(11, 59)).is_none());
        let signal = scheduler.check_warning(&state, &at(12, 0));
        assert_eq!(
            signal,
            Some(DecaySignal::Warning {
                hours_inactive: 3.0,
                minutes_until_decay: 60
            })
        );
        assert!(scheduler.check_warning(&state, &at(12, 30)).is_none());
    }

    #[test]
    fn test_scheduler_tick_applies_decay() {
        let mut scheduler = DecayScheduler::new();
        let state = ledger_with(100, at(9, 0));

        let (state, signal) = scheduler.tick(state, &at(12, 10));
        assert!(matches!(signal, Some(DecaySignal::Warning { .. })));
        assert_eq!(state.total_energy, 100);

        let (state, signal) = scheduler.tick(state, &at(13, 0));
        assert_eq!(
            signal,
            Some(DecaySignal::Applied {
                amount: 2,
                hours_inactive: 4.0
            })
        );
        assert_eq!(state.total_energy, 98);
    }

    #[test]
    fn test_scheduler_quiet_during_sleep_window() {
        let mut scheduler = DecayScheduler::new();
        let state = ledger_with(100, at(9, 0));
        let (state, signal) = scheduler.tick(state, &at(23, 0));
        assert!(signal.is_none());
        assert_eq!(state.total_energy, 100);
    }

    #[test]
    fn test_scheduler_disabled() {
        let mut scheduler = DecayScheduler::with_config(DecayConfig {
            enabled: false,
            ..Default::default()
        });
        let state = ledger_with(100, at(9, 0));
        let (state, signal) = scheduler.tick(state, &at(20, 0));
        assert!(signal.is_none());
        assert_eq!(state.total_energy, 100);
    }

    #[test]
    fn test_future_last_activity_means_no_decay() {
        let state = ledger_with(100, at(18, 0));
        assert_eq!(hours_since_activity(&state, &at(10, 0)), 0.0);
        let mut scheduler = DecayScheduler::new();
        let (state, signal) = scheduler.tick(state, &at(10, 0));
        assert!(signal.is_none());
        assert_eq!(state.total_energy, 100);
    }

    #[test]
    fn test_recovery_window() {
        let mut scheduler = DecayScheduler::new();
        let state = ledger_with(100, at(1, 0));
        assert!(scheduler.on_activity(&state, &at(12, 0)).is_none());
        assert_eq!(
            scheduler.on_activity(&state, &at(13, 0)),
            Some(DecaySignal::Recovery { hours_away: 12.0 })
        );
        let next_day = at(1, 0) + Duration::hours(30);
        assert!(scheduler.on_activity(&state, &next_day).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DecayConfig::default().validate().is_ok());
        let bad_hour = DecayConfig {
            sleep_start_hour: 24,
            ..Default::default()
        };
        assert!(bad_hour.validate().is_err());
        let bad_rate = DecayConfig {
            base_rate: 2,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());
    }
}
