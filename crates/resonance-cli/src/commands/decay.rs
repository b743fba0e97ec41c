use chrono::{DateTime, TimeZone, Timelike};
use clap::Subcommand;
use serde_json::json;

use resonance_core::decay::hours_since_activity;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum DecayAction {
    /// Run one decay evaluation now
    Tick,
    /// Show inactivity and today's decay so far
    Status,
}

pub fn run<Tz: TimeZone>(
    action: DecayAction,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(&now)?;

    match action {
        DecayAction::Tick => {
            let signals = session.engine.tick_decay(&now);
            print_json(&json!({
                "total_energy": session.engine.energy().total_energy,
                "signals": signals,
            }))?;
        }
        DecayAction::Status => {
            session.engine.roll_over(&now);
            let config = &session.config.decay;
            let energy = session.engine.energy();
            let hours = hours_since_activity(energy, &now);
            print_json(&json!({
                "enabled": config.enabled,
                "hours_inactive": hours,
                "in_sleep_window": config.in_sleep_window(now.hour()),
                "warning_after_hours": config.warning_hours,
                "decay_after_hours": config.decay_start_hours,
                "decay_applied_today": energy.decay_applied_on(now.date_naive(), &now.timezone()),
                "max_decay_per_day": config.max_decay_per_day,
                "last_activity": energy.last_activity,
            }))?;
        }
    }

    session.save()
}
