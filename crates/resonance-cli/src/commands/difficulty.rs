use chrono::{DateTime, TimeZone};
use clap::Subcommand;
use serde_json::json;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum DifficultyAction {
    /// Show the current tier and its thresholds
    Show,
    /// Run the evaluation if it is due
    Evaluate,
}

pub fn run<Tz: TimeZone>(
    action: DifficultyAction,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(&now)?;

    match action {
        DifficultyAction::Show => {
            session.engine.roll_over(&now);
            print_json(&session.engine.snapshot(&now).difficulty)?;
        }
        DifficultyAction::Evaluate => {
            // roll_over already runs a due evaluation
            let signals = session.engine.roll_over(&now);
            let difficulty = &session.engine.state().difficulty;
            print_json(&json!({
                "tier": difficulty.tier,
                "last_evaluation": difficulty.last_evaluation,
                "signals": signals,
            }))?;
        }
    }

    session.save()
}
