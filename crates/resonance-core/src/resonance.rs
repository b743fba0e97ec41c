//! Resonance multiplier, daily status, streaks and the harmony condition.
//!
//! Resonance is a 0-100 score describing how well a completed action lined
//! up with the user's circadian rhythm. It scales the energy an action earns.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::energy::{DailyHistorySnapshot, EnergyState};

/// Daily average needed for a day to extend a streak.
pub const STREAK_RESONANCE_THRESHOLD: f64 = 80.0;
/// Completions needed today for harmony.
pub const HARMONY_MIN_COMPLETED: usize = 5;
/// Average resonance needed today for harmony.
pub const HARMONY_MIN_RESONANCE: f64 = 80.0;

/// Clamp a reported resonance into 0-100; non-finite values count as absent.
pub fn clamp_resonance(resonance: Option<f64>) -> Option<f64> {
    resonance
        .filter(|r| r.is_finite())
        .map(|r| r.clamp(0.0, 100.0))
}

/// Energy multiplier for a resonance score.
pub fn multiplier_table(resonance: f64) -> f64 {
    let r = if resonance.is_finite() {
        resonance.clamp(0.0, 100.0)
    } else {
        0.0
    };
    if r >= 90.0 {
        2.0
    } else if r >= 80.0 {
        1.5
    } else if r >= 60.0 {
        1.2
    } else if r >= 40.0 {
        1.0
    } else if r >= 20.0 {
        0.8
    } else {
        0.6
    }
}

/// Multiplier for an optional resonance; absent means 1.0.
pub fn multiplier_for(resonance: Option<f64>) -> f64 {
    clamp_resonance(resonance).map_or(1.0, multiplier_table)
}

/// Bucket of a day's average resonance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResonanceStatus {
    Low,
    Medium,
    High,
    Flow,
}

impl ResonanceStatus {
    pub fn from_average(avg: f64) -> Self {
        if avg >= 90.0 {
            ResonanceStatus::Flow
        } else if avg >= 80.0 {
            ResonanceStatus::High
        } else if avg >= 60.0 {
            ResonanceStatus::Medium
        } else {
            ResonanceStatus::Low
        }
    }
}

/// Harmony holds when enough items were completed at a high enough average.
pub fn is_harmony(completed_today: usize, avg_resonance: Option<f64>) -> bool {
    completed_today >= HARMONY_MIN_COMPLETED
        && avg_resonance.is_some_and(|avg| avg >= HARMONY_MIN_RESONANCE)
}

/// Consecutive days immediately before `today` whose average resonance was high.
pub fn streak_days(history: &[DailyHistorySnapshot], today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut expected = today - Duration::days(1);
    for day in history.iter().rev() {
        if day.date > expected {
            continue;
        }
        if day.date < expected {
            break;
        }
        match day.average_resonance {
            Some(avg) if avg >= STREAK_RESONANCE_THRESHOLD => {
                streak += 1;
                expected = expected - Duration::days(1);
            }
            _ => break,
        }
    }
    streak
}

/// Bonus energy for a streak length.
pub fn streak_bonus(days: u32) -> i64 {
    match days {
        7.. => 50,
        5..=6 => 30,
        3..=4 => 15,
        _ => 0,
    }
}

/// Today's resonance picture, recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceSummary {
    pub completed_count: usize,
    pub average_resonance: Option<f64>,
    pub status: Option<ResonanceStatus>,
    pub harmony: bool,
    pub streak_days: u32,
    pub streak_bonus: i64,
}

pub fn summarize<Tz: TimeZone>(state: &EnergyState, now: &DateTime<Tz>) -> ResonanceSummary {
    let completed_count = state.completed_count();
    let average_resonance = state.average_resonance();
    let streak = streak_days(&state.daily_history, now.date_naive());
    ResonanceSummary {
        completed_count,
        average_resonance,
        status: average_resonance.map(ResonanceStatus::from_average),
        harmony: is_harmony(completed_count, average_resonance),
        streak_days: streak,
        streak_bonus: streak_bonus(streak),
    }
}
