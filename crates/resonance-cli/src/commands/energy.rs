//! Energy ledger commands.

use chrono::{DateTime, TimeZone};
use clap::Subcommand;
use serde_json::json;

use resonance_core::{Completion, CompletionKind, DisplayMode, EnergySource, TaskPriority};

use super::{print_json, Session};

const SOURCE_NAMES: &str = "tasks/goals/milestones/steps/achievements/health";

#[derive(Subcommand)]
pub enum EnergyAction {
    /// Show today's energy
    Show,
    /// Record a completed action
    Add {
        /// Source: tasks, goals, milestones, steps, achievements, health
        source: String,
        /// What was completed
        #[arg(long, default_value = "Completed")]
        title: String,
        /// Raw base amount (defaults to the source's standard amount)
        #[arg(long)]
        amount: Option<i64>,
        /// Task priority: low, medium, high, urgent (tasks only)
        #[arg(long)]
        priority: Option<String>,
        /// Resonance score (0-100)
        #[arg(long)]
        resonance: Option<f64>,
        /// Id of the completed item
        #[arg(long)]
        item: Option<String>,
    },
    /// Show closed days, most recent last
    History {
        /// Number of days to show
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Set the display mode: points or aura
    Mode { mode: String },
}

pub fn run<Tz: TimeZone>(
    action: EnergyAction,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(&now)?;
    session.engine.roll_over(&now);

    match action {
        EnergyAction::Show => {
            print_json(&session.engine.energy().snapshot(&now))?;
        }
        EnergyAction::Add {
            source,
            title,
            amount,
            priority,
            resonance,
            item,
        } => {
            let source = EnergySource::parse(&source).ok_or_else(|| {
                format!("Invalid source: '{source}'. Use {SOURCE_NAMES}")
            })?;
            let mut completion = match amount {
                Some(amount) => Completion::new(source, amount, title),
                None => Completion::from_kind(completion_kind(source, priority.as_deref())?, title),
            };
            completion.resonance = resonance;
            completion.item_id = item;

            let signals = session.engine.record_completion(&completion, &now);
            let energy = session.engine.energy();
            print_json(&json!({
                "entry": energy.entries.last(),
                "total_energy": energy.total_energy,
                "color": energy.color(),
                "signals": signals,
            }))?;
        }
        EnergyAction::History { days } => {
            let history = &session.engine.energy().daily_history;
            let start = history.len().saturating_sub(days);
            print_json(&history[start..])?;
        }
        EnergyAction::Mode { mode } => {
            let mode = match mode.to_lowercase().as_str() {
                "points" => DisplayMode::Points,
                "aura" => DisplayMode::Aura,
                _ => return Err(format!("Invalid mode: '{mode}'. Use points or aura").into()),
            };
            session.engine.set_display_mode(mode);
            print_json(&json!({ "display_mode": mode }))?;
        }
    }

    session.save()
}

fn completion_kind(
    source: EnergySource,
    priority: Option<&str>,
) -> Result<CompletionKind, Box<dyn std::error::Error>> {
    if priority.is_some() && source != EnergySource::Tasks {
        return Err("--priority only applies to tasks".into());
    }
    Ok(match source {
        EnergySource::Tasks => {
            let priority = match priority {
                Some(p) => TaskPriority::parse(p)
                    .ok_or_else(|| format!("Invalid priority: '{p}'. Use low/medium/high/urgent"))?,
                None => TaskPriority::Medium,
            };
            CompletionKind::Task { priority }
        }
        EnergySource::Goals => CompletionKind::Goal,
        EnergySource::Milestones => CompletionKind::Milestone,
        EnergySource::Steps => CompletionKind::Step,
        EnergySource::Achievements => CompletionKind::Achievement,
        EnergySource::Health => CompletionKind::HealthLog,
    })
}
