//! Adaptive difficulty.
//!
//! Every `evaluation_days` the user's trailing performance is reduced to an
//! average color level, and the difficulty tier moves at most one step.
//! Promotion needs a clearly higher average than demotion, so users whose
//! level hovers in the middle band stay put.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::energy::{
    color_index_of, color_index_with, DailyHistorySnapshot, COLOR_THRESHOLDS,
};

/// Average color level assumed when the window holds no data.
pub const BASELINE_COLOR_LEVEL: f64 = 2.0;

const PROMOTE_LEVEL: f64 = 4.5;
const EASY_PROMOTE_LEVEL: f64 = 3.5;
const DEMOTE_LEVEL: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    #[default]
    Normal,
    Hard,
    Expert,
}

impl DifficultyTier {
    /// Factor applied to the base color thresholds.
    pub fn multiplier(&self) -> f64 {
        match self {
            DifficultyTier::Easy => 0.7,
            DifficultyTier::Normal => 1.0,
            DifficultyTier::Hard => 1.2,
            DifficultyTier::Expert => 1.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Normal => "normal",
            DifficultyTier::Hard => "hard",
            DifficultyTier::Expert => "expert",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "Lower thresholds while you build momentum",
            DifficultyTier::Normal => "Standard color thresholds",
            DifficultyTier::Hard => "Thresholds raised by 20%",
            DifficultyTier::Expert => "Thresholds raised by 50%",
        }
    }

    /// Base thresholds scaled by this tier's multiplier.
    pub fn thresholds(&self) -> [i64; 7] {
        COLOR_THRESHOLDS.map(|t| (t as f64 * self.multiplier()).round() as i64)
    }

    pub fn promote(&self) -> Self {
        match self {
            DifficultyTier::Easy => DifficultyTier::Normal,
            DifficultyTier::Normal => DifficultyTier::Hard,
            DifficultyTier::Hard | DifficultyTier::Expert => DifficultyTier::Expert,
        }
    }

    pub fn demote(&self) -> Self {
        match self {
            DifficultyTier::Easy | DifficultyTier::Normal => DifficultyTier::Easy,
            DifficultyTier::Hard => DifficultyTier::Normal,
            DifficultyTier::Expert => DifficultyTier::Hard,
        }
    }
}

/// Color index of an energy total under a difficulty tier.
pub fn color_index_for(energy: i64, tier: DifficultyTier) -> usize {
    color_index_with(energy, &tier.thresholds())
}

/// Difficulty evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    #[serde(default = "default_evaluation_days")]
    pub evaluation_days: i64,
    /// Days with history required inside the window before evaluating.
    #[serde(default = "default_adjustment_threshold")]
    pub adjustment_threshold: usize,
}

fn default_evaluation_days() -> i64 {
    7
}
fn default_adjustment_threshold() -> usize {
    5
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            evaluation_days: default_evaluation_days(),
            adjustment_threshold: default_adjustment_threshold(),
        }
    }
}

/// Persisted difficulty state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultyState {
    pub tier: DifficultyTier,
    pub last_evaluation: DateTime<Utc>,
}

impl DifficultyState {
    pub fn new<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self {
            tier: DifficultyTier::Normal,
            last_evaluation: now.with_timezone(&Utc),
        }
    }

    pub fn thresholds(&self) -> [i64; 7] {
        self.tier.thresholds()
    }
}

/// A tier move produced by an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierChange {
    pub from: DifficultyTier,
    pub to: DifficultyTier,
    pub avg_color_level: f64,
}

/// History days inside the `days` calendar days before `today`.
pub fn trailing_window(
    history: &[DailyHistorySnapshot],
    today: NaiveDate,
    days: i64,
) -> Vec<&DailyHistorySnapshot> {
    let start = today - Duration::days(days);
    history
        .iter()
        .filter(|d| d.date >= start && d.date < today)
        .collect()
}

/// Mean color level over a window, using the unscaled thresholds.
pub fn avg_color_level(window: &[&DailyHistorySnapshot]) -> f64 {
    if window.is_empty() {
        return BASELINE_COLOR_LEVEL;
    }
    let sum: usize = window.iter().map(|d| color_index_of(d.total_energy)).sum();
    sum as f64 / window.len() as f64
}

/// Next tier for an average color level. Moves at most one step.
pub fn next_tier(tier: DifficultyTier, avg_color_level: f64) -> DifficultyTier {
    if avg_color_level >= PROMOTE_LEVEL && tier != DifficultyTier::Expert {
        tier.promote()
    } else if avg_color_level >= EASY_PROMOTE_LEVEL && tier == DifficultyTier::Easy {
        DifficultyTier::Normal
    } else if avg_color_level <= DEMOTE_LEVEL && tier != DifficultyTier::Easy {
        tier.demote()
    } else {
        tier
    }
}

/// Decides when to evaluate and applies the tier transition rule.
#[derive(Debug, Clone, Default)]
pub struct DifficultyController {
    config: DifficultyConfig,
}

impl DifficultyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    /// Enough time has passed and enough days of history exist.
    pub fn is_due<Tz: TimeZone>(
        &self,
        state: &DifficultyState,
        history: &[DailyHistorySnapshot],
        now: &DateTime<Tz>,
    ) -> bool {
        let elapsed = now.with_timezone(&Utc) - state.last_evaluation;
        if elapsed.num_days() < self.config.evaluation_days {
            return false;
        }
        let window = trailing_window(history, now.date_naive(), self.config.evaluation_days);
        window.len() >= self.config.adjustment_threshold
    }

    /// Evaluate if due. Once an evaluation fires, `last_evaluation` moves to
    /// `now` whether or not the tier changed.
    pub fn evaluate<Tz: TimeZone>(
        &self,
        mut state: DifficultyState,
        history: &[DailyHistorySnapshot],
        now: &DateTime<Tz>,
    ) -> (DifficultyState, Option<TierChange>) {
        if !self.is_due(&state, history, now) {
            return (state, None);
        }

        let window = trailing_window(history, now.date_naive(), self.config.evaluation_days);
        let avg = avg_color_level(&window);
        let next = next_tier(state.tier, avg);
        state.last_evaluation = now.with_timezone(&Utc);

        if next == state.tier {
            debug!(tier = state.tier.label(), avg, "difficulty unchanged");
            return (state, None);
        }

        info!(
            from = state.tier.label(),
            to = next.label(),
            avg,
            "difficulty tier changed"
        );
        let change = TierChange {
            from: state.tier,
            to: next,
            avg_color_level: avg,
        };
        state.tier = next;
        (state, Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap()
    }

    fn history(totals: &[i64]) -> Vec<DailyHistorySnapshot> {
        let today = now().date_naive();
        let n = totals.len() as i64;
        totals
            .iter()
            .enumerate()
            .map(|(i, &total)| DailyHistorySnapshot {
                date: today - Duration::days(n - i as i64),
                total_energy: total,
                completed_count: 5,
                average_resonance: None,
            })
            .collect()
    }

    fn due_state(tier: DifficultyTier) -> DifficultyState {
        DifficultyState {
            tier,
            last_evaluation: now() - Duration::days(7),
        }
    }

    #[test]
    fn test_scaled_thresholds() {
        assert_eq!(DifficultyTier::Easy.thresholds(), [0, 70, 140, 210, 280, 350, 420]);
        assert_eq!(DifficultyTier::Normal.thresholds(), COLOR_THRESHOLDS);
        assert_eq!(DifficultyTier::Hard.thresholds(), [0, 120, 240, 360, 480, 600, 720]);
        assert_eq!(DifficultyTier::Expert.thresholds(), [0, 150, 300, 450, 600, 750, 900]);
        assert_eq!(color_index_for(450, DifficultyTier::Easy), 6);
        assert_eq!(color_index_for(450, DifficultyTier::Expert), 3);
    }

    #[test]
    fn test_next_tier_rules() {
        use DifficultyTier::*;
        assert_eq!(next_tier(Normal, 4.5), Hard);
        assert_eq!(next_tier(Expert, 6.0), Expert);
        assert_eq!(next_tier(Easy, 3.5), Normal);
        assert_eq!(next_tier(Easy, 5.0), Normal);
        assert_eq!(next_tier(Normal, 4.0), Normal);
        assert_eq!(next_tier(Hard, 1.5), Normal);
        assert_eq!(next_tier(Easy, 0.0), Easy);
        assert_eq!(next_tier(Normal, 1.6), Normal);
    }

    #[test]
    fn test_avg_color_level_baseline() {
        assert_eq!(avg_color_level(&[]), BASELINE_COLOR_LEVEL);
    }

    #[test]
    fn test_promotes_after_strong_week() {
        let controller = DifficultyController::new();
        let history = history(&[450, 500, 520, 610, 480, 470, 505]);
        let (state, change) =
            controller.evaluate(due_state(DifficultyTier::Normal), &history, &now());
        assert_eq!(state.tier, DifficultyTier::Hard);
        assert_eq!(state.last_evaluation, now());
        let change = change.unwrap();
        assert_eq!(change.from, DifficultyTier::Normal);
        assert!(change.avg_color_level >= 4.5);
    }

    #[test]
    fn test_not_due_before_evaluation_period() {
        let controller = DifficultyController::new();
        let history = history(&[600; 7]);
        let state = DifficultyState {
            tier: DifficultyTier::Normal,
            last_evaluation: now() - Duration::days(6),
        };
        let (after, change) = controller.evaluate(state.clone(), &history, &now());
        assert_eq!(after, state);
        assert!(change.is_none());
    }

    #[test]
    fn test_not_due_without_enough_history() {
        let controller = DifficultyController::new();
        let history = history(&[600, 600, 600, 600]);
        let state = due_state(DifficultyTier::Normal);
        let (after, change) = controller.evaluate(state.clone(), &history, &now());
        assert_eq!(after, state);
        assert!(change.is_none());
    }

    #[test]
    fn test_unchanged_evaluation_still_resets_clock() {
        let controller = DifficultyController::new();
        let history = history(&[300; 7]);
        let (state, change) =
            controller.evaluate(due_state(DifficultyTier::Normal), &history, &now());
        assert!(change.is_none());
        assert_eq!(state.tier, DifficultyTier::Normal);
        assert_eq!(state.last_evaluation, now());
        assert!(!controller.is_due(&state, &history, &now()));
    }

    #[test]
    fn test_hysteresis_prevents_flapping() {
        let controller = DifficultyController::new();
        let mut state = due_state(DifficultyTier::Normal);
        let mut clock = now();
        for week in 0..6 {
            // alternate weeks averaging level 3 and level 4
            let total = if week % 2 == 0 { 350 } else { 450 };
            let today = clock.date_naive();
            let history: Vec<_> = (1..=7)
                .map(|d| DailyHistorySnapshot {
                    date: today - Duration::days(d),
                    total_energy: total,
                    completed_count: 5,
                    average_resonance: None,
                })
                .rev()
                .collect();
            let (next, change) = controller.evaluate(state, &history, &clock);
            assert!(change.is_none());
            assert_eq!(next.tier, DifficultyTier::Normal);
            state = next;
            clock = clock + Duration::days(7);
        }
    }

    #[test]
    fn test_demotes_one_step_only() {
        let controller = DifficultyController::new();
        let history = history(&[0, 50, 120, 20, 10, 0, 90]);
        let (state, change) =
            controller.evaluate(due_state(DifficultyTier::Expert), &history, &now());
        assert_eq!(state.tier, DifficultyTier::Hard);
        assert_eq!(change.unwrap().to, DifficultyTier::Hard);
    }
}
