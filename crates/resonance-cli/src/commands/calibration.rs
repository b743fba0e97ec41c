use chrono::{DateTime, TimeZone};
use clap::Subcommand;
use serde_json::json;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum CalibrationAction {
    /// Record a work sample at the current time
    Add {
        /// Task duration in minutes
        #[arg(long)]
        duration: u32,
        /// Resonance outcome (0-100)
        #[arg(long)]
        outcome: f64,
    },
    /// Show the calibrated curve
    Show,
}

pub fn run<Tz: TimeZone>(
    action: CalibrationAction,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(&now)?;

    match action {
        CalibrationAction::Add { duration, outcome } => {
            let signals = session.engine.record_sample(duration, outcome, &now);
            print_json(&json!({
                "samples": session.engine.state().calibration.sample_count(),
                "signals": signals,
            }))?;
        }
        CalibrationAction::Show => {
            print_json(&session.engine.snapshot(&now).calibration)?;
        }
    }

    session.save()
}
