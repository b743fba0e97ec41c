use std::path::PathBuf;

use chrono::{DateTime, TimeZone};
use clap::Args;

use resonance_core::{EnergyColor, ScheduledItem};

use super::{print_json, Session};

#[derive(Args)]
pub struct PredictArgs {
    /// Goal color: a name (red..violet) or index 0-6
    #[arg(long)]
    goal: String,
    /// JSON file holding an array of today's scheduled items
    #[arg(long)]
    items: Option<PathBuf>,
}

pub fn run<Tz: TimeZone>(
    args: PredictArgs,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    let goal = EnergyColor::parse(&args.goal)
        .ok_or_else(|| format!("Invalid goal color: '{}'. Use red..violet or 0-6", args.goal))?;
    let scheduled: Vec<ScheduledItem> = match &args.items {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            serde_json::from_str(&content)?
        }
        None => Vec::new(),
    };

    let mut session = Session::open(&now)?;
    session.engine.roll_over(&now);
    print_json(&session.engine.predict(&scheduled, goal, &now))?;
    session.save()
}
