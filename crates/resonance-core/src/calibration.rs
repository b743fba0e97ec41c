//! Personal circadian calibration.
//!
//! Samples of (time of day, task duration, resonance outcome) are collected
//! as work gets done. Once enough exist, their weighted circular mean gives
//! the hour at which this user performs best (the acrophase), which shifts
//! the default sinusoidal alertness curve. Recorded entries are never
//! rescored; only future alignment scoring sees the shift.

use std::f64::consts::TAU;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Samples required before the personal curve replaces the default.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Oldest samples are dropped past this count.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Peak hour of the default curve.
    #[serde(default = "default_acrophase_hour")]
    pub default_acrophase_hour: f64,
}

fn default_min_samples() -> usize {
    10
}
fn default_max_samples() -> usize {
    500
}
fn default_acrophase_hour() -> f64 {
    14.0
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            default_acrophase_hour: default_acrophase_hour(),
        }
    }
}

/// One observed piece of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub timestamp: DateTime<Utc>,
    /// Local hour of day (fractional) at which the work happened.
    pub hour_of_day: f64,
    pub task_duration_minutes: u32,
    /// Resonance outcome, 0-100.
    pub resonance_outcome: f64,
}

impl CalibrationSample {
    pub fn new<Tz: TimeZone>(
        at: &DateTime<Tz>,
        task_duration_minutes: u32,
        resonance_outcome: f64,
    ) -> Self {
        let outcome = if resonance_outcome.is_finite() {
            resonance_outcome.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            timestamp: at.with_timezone(&Utc),
            hour_of_day: f64::from(at.hour()) + f64::from(at.minute()) / 60.0,
            task_duration_minutes,
            resonance_outcome: outcome,
        }
    }

    fn weight(&self) -> f64 {
        self.resonance_outcome / 100.0 * f64::from(self.task_duration_minutes.max(1))
    }
}

/// Sinusoidal alertness over the day, peaking at `acrophase_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircadianCurve {
    pub acrophase_hour: f64,
}

impl CircadianCurve {
    pub fn new(acrophase_hour: f64) -> Self {
        Self {
            acrophase_hour: normalize_hour(acrophase_hour),
        }
    }

    /// Alertness (0.0-1.0) at a local hour.
    pub fn alertness_at(&self, hour: f64) -> f64 {
        0.5 + 0.5 * (TAU * (hour - self.acrophase_hour) / 24.0).cos()
    }
}

/// Collected samples. Persisted with the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    #[serde(default)]
    pub samples: Vec<CalibrationSample>,
}

impl CalibrationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_active(&self, config: &CalibrationConfig) -> bool {
        self.samples.len() >= config.min_samples
    }

    /// Add a sample, dropping the oldest ones past the configured bound.
    pub fn record(mut self, sample: CalibrationSample, config: &CalibrationConfig) -> Self {
        let was_active = self.is_active(config);
        self.samples.push(sample);
        if self.samples.len() > config.max_samples {
            let excess = self.samples.len() - config.max_samples;
            self.samples.drain(..excess);
        }
        if !was_active && self.is_active(config) {
            debug!(samples = self.samples.len(), "calibration activated");
        }
        self
    }

    /// Personal peak hour, or `None` while inactive or without usable weight.
    pub fn acrophase(&self, config: &CalibrationConfig) -> Option<f64> {
        if !self.is_active(config) {
            return None;
        }
        let (sin, cos, total) = self.samples.iter().fold((0.0, 0.0, 0.0), |(s, c, w), sample| {
            let weight = sample.weight();
            let angle = TAU * sample.hour_of_day / 24.0;
            (s + weight * angle.sin(), c + weight * angle.cos(), w + weight)
        });
        if total <= 0.0 || (sin * sin + cos * cos).sqrt() / total < 1e-9 {
            return None;
        }
        Some(normalize_hour(sin.atan2(cos) * 24.0 / TAU))
    }

    /// Hours to shift the default curve by, in [-12, 12).
    pub fn phase_shift(&self, config: &CalibrationConfig) -> f64 {
        match self.acrophase(config) {
            Some(peak) => {
                let shift = normalize_hour(peak - config.default_acrophase_hour + 12.0) - 12.0;
                if shift.abs() < 1e-9 {
                    0.0
                } else {
                    shift
                }
            }
            None => 0.0,
        }
    }

    /// The curve callers should score alignment against.
    pub fn curve(&self, config: &CalibrationConfig) -> CircadianCurve {
        CircadianCurve::new(config.default_acrophase_hour + self.phase_shift(config))
    }
}

fn normalize_hour(hour: f64) -> f64 {
    hour.rem_euclid(24.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_at(day: u32, hour: u32, outcome: f64) -> CalibrationSample {
        let at = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
        CalibrationSample::new(&at, 30, outcome)
    }

    fn model_with(samples: Vec<CalibrationSample>) -> CalibrationModel {
        let config = CalibrationConfig::default();
        samples
            .into_iter()
            .fold(CalibrationModel::new(), |m, s| m.record(s, &config))
    }

    #[test]
    fn test_inactive_until_min_samples() {
        let config = CalibrationConfig::default();
        let model = model_with((1..=9).map(|d| sample_at(d, 9, 90.0)).collect());
        assert!(!model.is_active(&config));
        assert_eq!(model.acrophase(&config), None);
        assert_eq!(model.phase_shift(&config), 0.0);
        assert_eq!(model.curve(&config).acrophase_hour, 14.0);
    }

    #[test]
    fn test_morning_person_shifts_curve_earlier() {
        let config = CalibrationConfig::default();
        let model = model_with((1..=12).map(|d| sample_at(d, 9, 90.0)).collect());
        assert!(model.is_active(&config));
        let peak = model.acrophase(&config).unwrap();
        assert!((peak - 9.0).abs() < 1e-6);
        assert!((model.phase_shift(&config) + 5.0).abs() < 1e-6);
        let curve = model.curve(&config);
        assert!(curve.alertness_at(9.0) > curve.alertness_at(14.0));
    }

    #[test]
    fn test_weighting_pulls_toward_better_outcomes() {
        let config = CalibrationConfig::default();
        let mut samples: Vec<_> = (1..=6).map(|d| sample_at(d, 10, 95.0)).collect();
        samples.extend((7..=12).map(|d| sample_at(d, 16, 20.0)));
        let peak = model_with(samples).acrophase(&config).unwrap();
        assert!(peak > 10.0 && peak < 13.0, "peak was {peak}");
    }

    #[test]
    fn test_shift_wraps_across_midnight() {
        let config = CalibrationConfig::default();
        let model = model_with((1..=10).map(|d| sample_at(d, 1, 80.0)).collect());
        // peak at 01:00 is 11 hours after the default 14:00
        assert!((model.phase_shift(&config) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_weight_falls_back_to_default() {
        let config = CalibrationConfig::default();
        let model = model_with((1..=10).map(|d| sample_at(d, 9, 0.0)).collect());
        assert_eq!(model.acrophase(&config), None);
        assert_eq!(model.curve(&config).acrophase_hour, 14.0);
    }

    #[test]
    fn test_samples_are_bounded() {
        let config = CalibrationConfig {
            max_samples: 5,
            ..Default::default()
        };
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let model = (0..8).fold(CalibrationModel::new(), |m, i| {
            m.record(CalibrationSample::new(&(start + Duration::days(i)), 25, 70.0), &config)
        });
        assert_eq!(model.sample_count(), 5);
        assert_eq!(model.samples[0].timestamp, start + Duration::days(3));
    }

    #[test]
    fn test_shift_is_deterministic() {
        let config = CalibrationConfig::default();
        let samples: Vec<_> = (1..=15).map(|d| sample_at(d, 8 + d % 5, 60.0 + d as f64)).collect();
        let a = model_with(samples.clone()).phase_shift(&config);
        let b = model_with(samples).phase_shift(&config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_curve_peaks_at_acrophase() {
        let curve = CircadianCurve::new(14.0);
        assert!((curve.alertness_at(14.0) - 1.0).abs() < 1e-12);
        assert!(curve.alertness_at(2.0) < 1e-12);
    }
}
