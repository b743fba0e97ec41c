//! Color tiers ("ROYGBIV") derived from an energy total.

use serde::{Deserialize, Serialize};

/// Ascending lower bounds of the seven color tiers. Tier 6 is open-ended.
pub const COLOR_THRESHOLDS: [i64; 7] = [0, 100, 200, 300, 400, 500, 600];

/// Index of the final ("mastery") tier.
pub const MAX_COLOR_INDEX: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Indigo,
    Violet,
}

impl EnergyColor {
    pub const ALL: [EnergyColor; 7] = [
        EnergyColor::Red,
        EnergyColor::Orange,
        EnergyColor::Yellow,
        EnergyColor::Green,
        EnergyColor::Blue,
        EnergyColor::Indigo,
        EnergyColor::Violet,
    ];

    /// Color for a tier index; indices past the last tier saturate at Violet.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(MAX_COLOR_INDEX)]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnergyColor::Red => "Red",
            EnergyColor::Orange => "Orange",
            EnergyColor::Yellow => "Yellow",
            EnergyColor::Green => "Green",
            EnergyColor::Blue => "Blue",
            EnergyColor::Indigo => "Indigo",
            EnergyColor::Violet => "Violet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(index) = s.trim().parse::<usize>() {
            return (index <= MAX_COLOR_INDEX).then(|| Self::from_index(index));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Base threshold at which this color is reached.
    pub fn threshold(&self) -> i64 {
        COLOR_THRESHOLDS[self.index()]
    }
}

/// Color tier index (0-6) for an energy total using the base thresholds.
pub fn color_index_of(energy: i64) -> usize {
    color_index_with(energy, &COLOR_THRESHOLDS)
}

/// Color tier index for an energy total against arbitrary ascending thresholds.
pub fn color_index_with(energy: i64, thresholds: &[i64; 7]) -> usize {
    thresholds
        .iter()
        .rposition(|&t| energy >= t)
        .unwrap_or(0)
}

/// Percentage (0-100) of the way from the current tier to the next one.
pub fn progress_to_next_color(energy: i64) -> f64 {
    progress_with(energy, &COLOR_THRESHOLDS)
}

pub fn progress_with(energy: i64, thresholds: &[i64; 7]) -> f64 {
    let index = color_index_with(energy, thresholds);
    if index >= MAX_COLOR_INDEX {
        return 100.0;
    }
    let floor = thresholds[index];
    let span = thresholds[index + 1] - floor;
    if span <= 0 {
        return 100.0;
    }
    ((energy - floor) as f64 / span as f64 * 100.0).clamp(0.0, 100.0)
}
