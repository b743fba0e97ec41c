//! Energy sources and the base-amount lookup for completed actions.

use serde::{Deserialize, Serialize};

/// Flat expected yield of a scheduled calendar event.
pub const EVENT_BASE_ENERGY: i64 = 15;

/// Where a ledger entry's energy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergySource {
    Tasks,
    Goals,
    Milestones,
    Steps,
    Achievements,
    Health,
}

impl EnergySource {
    pub const ALL: [EnergySource; 6] = [
        EnergySource::Tasks,
        EnergySource::Goals,
        EnergySource::Milestones,
        EnergySource::Steps,
        EnergySource::Achievements,
        EnergySource::Health,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EnergySource::Tasks => "tasks",
            EnergySource::Goals => "goals",
            EnergySource::Milestones => "milestones",
            EnergySource::Steps => "steps",
            EnergySource::Achievements => "achievements",
            EnergySource::Health => "health",
        }
    }

    /// Parse a source from its lowercase label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.label().eq_ignore_ascii_case(s.trim()))
    }
}

/// Task priority, used to look up a task's base energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Base energy granted for completing a task of this priority.
    pub fn base_energy(&self) -> i64 {
        match self {
            TaskPriority::Low => 10,
            TaskPriority::Medium => 20,
            TaskPriority::High => 30,
            TaskPriority::Urgent => 40,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "medium" | "normal" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            "urgent" | "critical" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

/// Kind of completed action, when the caller reports a kind rather than a raw amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionKind {
    Task { priority: TaskPriority },
    Goal,
    Milestone,
    Step,
    Achievement,
    HealthLog,
}

impl CompletionKind {
    pub fn source(&self) -> EnergySource {
        match self {
            CompletionKind::Task { .. } => EnergySource::Tasks,
            CompletionKind::Goal => EnergySource::Goals,
            CompletionKind::Milestone => EnergySource::Milestones,
            CompletionKind::Step => EnergySource::Steps,
            CompletionKind::Achievement => EnergySource::Achievements,
            CompletionKind::HealthLog => EnergySource::Health,
        }
    }

    pub fn base_amount(&self) -> i64 {
        match self {
            CompletionKind::Task { priority } => priority.base_energy(),
            CompletionKind::Goal => 50,
            CompletionKind::Milestone => 40,
            CompletionKind::Step => 15,
            CompletionKind::Achievement => 25,
            CompletionKind::HealthLog => 10,
        }
    }
}

/// A completed user action reported by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub source: EnergySource,
    pub base_amount: i64,
    pub title: String,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Alignment score (0-100) of the action against the user's rhythm.
    #[serde(default)]
    pub resonance: Option<f64>,
}

impl Completion {
    pub fn new(source: EnergySource, base_amount: i64, title: impl Into<String>) -> Self {
        Self {
            source,
            base_amount,
            title: title.into(),
            item_id: None,
            resonance: None,
        }
    }

    /// Build a completion whose amount comes from the base-amount lookup.
    pub fn from_kind(kind: CompletionKind, title: impl Into<String>) -> Self {
        Self::new(kind.source(), kind.base_amount(), title)
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_resonance(mut self, resonance: f64) -> Self {
        self.resonance = Some(resonance);
        self
    }
}
