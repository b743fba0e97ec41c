use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::difficulty::DifficultyTier;
use crate::energy::{EnergyColor, EnergySource};

/// Every notable engine transition produces a Signal.
/// Renderers subscribe to them; none of them require a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signal {
    EnergyAdded {
        entry_id: String,
        source: EnergySource,
        amount: i64,
        total_energy: i64,
        at: DateTime<Utc>,
    },
    /// Total crossed into a higher color tier.
    ColorAdvanced {
        from: EnergyColor,
        to: EnergyColor,
        at: DateTime<Utc>,
    },
    /// Final tier reached for the first time today.
    AuraEarned {
        aura_count: u64,
        at: DateTime<Utc>,
    },
    /// Previous day closed into history.
    DailyReset {
        date: NaiveDate,
        total_energy: i64,
        at: DateTime<Utc>,
    },
    DecayWarning {
        hours_inactive: f64,
        minutes_until_decay: i64,
        at: DateTime<Utc>,
    },
    DecayApplied {
        amount: i64,
        total_energy: i64,
        at: DateTime<Utc>,
    },
    /// User returned after a long absence. UI only.
    Recovery {
        hours_away: f64,
        at: DateTime<Utc>,
    },
    /// Harmony condition became true.
    HarmonyEntered {
        completed_count: usize,
        average_resonance: f64,
        at: DateTime<Utc>,
    },
    DifficultyChanged {
        from: DifficultyTier,
        to: DifficultyTier,
        avg_color_level: f64,
        at: DateTime<Utc>,
    },
    /// Enough samples collected for the personal circadian curve.
    CalibrationActivated {
        samples: usize,
        phase_shift: f64,
        at: DateTime<Utc>,
    },
}

impl Signal {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Signal::EnergyAdded { at, .. }
            | Signal::ColorAdvanced { at, .. }
            | Signal::AuraEarned { at, .. }
            | Signal::DailyReset { at, .. }
            | Signal::DecayWarning { at, .. }
            | Signal::DecayApplied { at, .. }
            | Signal::Recovery { at, .. }
            | Signal::HarmonyEntered { at, .. }
            | Signal::DifficultyChanged { at, .. }
            | Signal::CalibrationActivated { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signal_is_tagged_by_type() {
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let signal = Signal::AuraEarned { aura_count: 3, at };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "AuraEarned");
        assert_eq!(json["aura_count"], 3);
        assert_eq!(signal.at(), at);
    }
}
