//! End-of-day energy forecasting.
//!
//! The forecast is the current total plus the expected yield of today's
//! still-open scheduled items, discounted by an assumed completion rate.
//! Confidence grows with history, with the number of scheduled items and as
//! the day progresses.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::energy::{
    color_index_with, DailyHistorySnapshot, EnergyColor, EnergyState, TaskPriority,
    EVENT_BASE_ENERGY,
};

/// Forecast settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Share of scheduled-but-open items assumed to get done.
    #[serde(default = "default_completion_rate")]
    pub completion_rate: f64,
    /// Used when there is no history to average.
    #[serde(default = "default_historical_average")]
    pub default_historical_average: f64,
    /// Above this many extra tasks the goal is considered out of reach.
    #[serde(default = "default_max_tasks_for_goal")]
    pub max_tasks_for_goal: u32,
}

fn default_completion_rate() -> f64 {
    0.7
}
fn default_historical_average() -> f64 {
    300.0
}
fn default_max_tasks_for_goal() -> u32 {
    5
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            completion_rate: default_completion_rate(),
            default_historical_average: default_historical_average(),
            max_tasks_for_goal: default_max_tasks_for_goal(),
        }
    }
}

/// What a scheduled item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledKind {
    Task { priority: TaskPriority },
    Event,
}

/// Read-only view of an item on today's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub kind: ScheduledKind,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
}

impl ScheduledItem {
    /// Energy this item is expected to yield when done.
    pub fn expected_yield(&self) -> i64 {
        match self.kind {
            ScheduledKind::Task { priority } => priority.base_energy(),
            ScheduledKind::Event => EVENT_BASE_ENERGY,
        }
    }

    fn is_open_on<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        !self.completed
            && self.start.with_timezone(&now.timezone()).date_naive() == now.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(confidence: f64) -> Self {
        if confidence >= 0.7 {
            ConfidenceLevel::High
        } else if confidence > 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Advice derived from the gap between forecast and goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recommendation {
    OnTrack { surplus: i64 },
    AchievableWith { tasks: u32, gap: i64 },
    LowerGoal { suggested: EnergyColor, gap: i64 },
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Recommendation::OnTrack { surplus } => {
                format!("On track to reach your goal ({surplus} energy to spare).")
            }
            Recommendation::AchievableWith { tasks, gap } => {
                let plural = if *tasks == 1 { "" } else { "s" };
                format!("Goal is within reach: complete {tasks} more task{plural} (+{gap} energy).")
            }
            Recommendation::LowerGoal { suggested, gap } => format!(
                "Goal is {gap} energy away. Consider aiming for {} today.",
                suggested.name()
            ),
        }
    }
}

/// Forecast for the end of the current day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub current_energy: i64,
    pub remaining_potential: i64,
    pub scheduled_remaining: usize,
    pub predicted_energy: i64,
    pub predicted_color_index: usize,
    pub predicted_color: EnergyColor,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub historical_average: f64,
    /// Forecast minus the historical average.
    pub vs_average: i64,
    pub goal_threshold: i64,
    pub recommendation: Recommendation,
    pub message: String,
}

/// Mean closing total over the recorded history.
pub fn historical_average(history: &[DailyHistorySnapshot]) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let sum: f64 = history.iter().map(|d| d.total_energy as f64).sum();
    Some(sum / history.len() as f64)
}

/// Expected yield and count of today's open scheduled items.
pub fn remaining_potential<Tz: TimeZone>(
    items: &[ScheduledItem],
    now: &DateTime<Tz>,
) -> (i64, usize) {
    items
        .iter()
        .filter(|item| item.is_open_on(now))
        .fold((0, 0), |(sum, count), item| (sum + item.expected_yield(), count + 1))
}

/// Additive confidence score in tenths, capped at 1.0.
pub fn confidence_score(has_history: bool, scheduled_remaining: usize, local_hour: u32) -> f64 {
    let mut tenths: u32 = 5;
    if has_history {
        tenths += 2;
    }
    if scheduled_remaining >= 3 {
        tenths += 2;
    }
    if scheduled_remaining >= 5 {
        tenths += 1;
    }
    if local_hour >= 12 {
        tenths += 1;
    }
    if local_hour >= 18 {
        tenths += 1;
    }
    f64::from(tenths.min(10)) / 10.0
}

/// Produces end-of-day forecasts.
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PredictionConfig) -> Self {
        Self { config }
    }

    /// Forecast today's closing total.
    ///
    /// `historical_average` is `None` when no history exists; the configured
    /// default stands in and confidence gets no history bonus. Colors are
    /// read against `thresholds`, the table of the active difficulty tier.
    pub fn predict<Tz: TimeZone>(
        &self,
        state: &EnergyState,
        scheduled: &[ScheduledItem],
        historical_average: Option<f64>,
        thresholds: &[i64; 7],
        goal: EnergyColor,
        now: &DateTime<Tz>,
    ) -> Prediction {
        let (remaining, scheduled_remaining) = remaining_potential(scheduled, now);
        let expected = self.config.completion_rate * remaining as f64;
        let predicted_energy = (state.total_energy as f64 + expected).round() as i64;
        let predicted_color_index = color_index_with(predicted_energy, thresholds);
        let goal_threshold = thresholds[goal.index()];

        let average = historical_average
            .filter(|avg| avg.is_finite())
            .unwrap_or(self.config.default_historical_average);
        let confidence =
            confidence_score(historical_average.is_some(), scheduled_remaining, now.hour());
        let recommendation = self.recommend(predicted_energy, goal, thresholds);

        Prediction {
            current_energy: state.total_energy,
            remaining_potential: remaining,
            scheduled_remaining,
            predicted_energy,
            predicted_color_index,
            predicted_color: EnergyColor::from_index(predicted_color_index),
            confidence,
            confidence_level: ConfidenceLevel::from_score(confidence),
            historical_average: average,
            vs_average: predicted_energy - average.round() as i64,
            goal_threshold,
            message: recommendation.message(),
            recommendation,
        }
    }

    /// Recommendation for a forecast against a goal color.
    ///
    /// A suggested lower goal is always a color below `goal`.
    pub fn recommend(
        &self,
        predicted_energy: i64,
        goal: EnergyColor,
        thresholds: &[i64; 7],
    ) -> Recommendation {
        let gap = thresholds[goal.index()] - predicted_energy;
        if gap <= 0 {
            return Recommendation::OnTrack { surplus: -gap };
        }
        let per_task = TaskPriority::Medium.base_energy();
        let tasks = ((gap + per_task - 1) / per_task) as u32;
        if tasks <= self.config.max_tasks_for_goal {
            Recommendation::AchievableWith { tasks, gap }
        } else {
            let reached = color_index_with(predicted_energy, thresholds);
            Recommendation::LowerGoal {
                suggested: EnergyColor::from_index(reached.min(goal.index().saturating_sub(1))),
                gap,
            }
        }
    }
}
