//! TOML-based engine configuration.
//!
//! One section per concern:
//! - `[ledger]` history retention
//! - `[decay]` inactivity thresholds, rates and the sleep window
//! - `[prediction]` forecast tuning
//! - `[difficulty]` evaluation window
//! - `[calibration]` circadian sample bounds
//! - `[engine]` background timer cadence
//!
//! Configuration is stored at `~/.config/resonance/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::calibration::CalibrationConfig;
use crate::decay::DecayConfig;
use crate::difficulty::DifficultyConfig;
use crate::energy::LedgerConfig;
use crate::engine::TimerConfig;
use crate::error::{ConfigError, CoreError, ValidationError};
use crate::prediction::PredictionConfig;

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/resonance/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub decay: DecayConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub difficulty: DifficultyConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub engine: TimerConfig,
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults there if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key.
    ///
    /// The change only takes effect if the resulting config still validates.
    /// Call [`Config::save`] to persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.decay.validate()?;

        let rate = self.prediction.completion_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ValidationError::InvalidValue {
                field: "prediction.completion_rate".to_string(),
                message: format!("must be within 0-1, got {rate}"),
            });
        }
        if self.difficulty.evaluation_days <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "difficulty.evaluation_days".to_string(),
                message: "must be positive".to_string(),
            });
        }
        let calibration = &self.calibration;
        if calibration.min_samples > calibration.max_samples {
            return Err(ValidationError::InvalidRange {
                field: "calibration.min_samples..max_samples".to_string(),
                min: calibration.min_samples as f64,
                max: calibration.max_samples as f64,
            });
        }
        if !(0.0..24.0).contains(&calibration.default_acrophase_hour) {
            return Err(ValidationError::InvalidValue {
                field: "calibration.default_acrophase_hour".to_string(),
                message: "must be within 0-24".to_string(),
            });
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[decay]\nbase_rate = -3\n").unwrap();
        assert_eq!(parsed.decay.base_rate, -3);
        assert_eq!(parsed.decay.decay_start_hours, 4.0);
        assert_eq!(parsed.ledger.history_retention_days, 90);
        assert_eq!(parsed.engine.decay_tick_secs, 3600);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("decay.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("decay.max_decay_per_day").as_deref(), Some("50"));
        assert_eq!(cfg.get("prediction.completion_rate").as_deref(), Some("0.7"));
        assert!(cfg.get("decay.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("decay.enabled", "false").unwrap();
        cfg.set("decay.base_rate", "-3").unwrap();
        cfg.set("prediction.completion_rate", "0.5").unwrap();
        cfg.set("engine.warning_check_secs", "30").unwrap();
        assert!(!cfg.decay.enabled);
        assert_eq!(cfg.decay.base_rate, -3);
        assert_eq!(cfg.prediction.completion_rate, 0.5);
        assert_eq!(cfg.engine.warning_check_secs, 30);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set("decay.nonexistent_key", "1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "decay.enabled", "not_a_bool");
        assert!(result.is_err());
    }

    #[test]
    fn set_rejects_values_that_fail_validation() {
        let mut cfg = Config::default();
        let err = cfg.set("decay.sleep_start_hour", "25").unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidHour { .. })));
        assert_eq!(cfg.decay.sleep_start_hour, 22);
    }

    #[test]
    fn set_rejects_out_of_range_completion_rate() {
        let mut cfg = Config::default();
        assert!(cfg.set("prediction.completion_rate", "1.5").is_err());
        assert_eq!(cfg.prediction.completion_rate, 0.7);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set("difficulty.evaluation_days", "14").unwrap();
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.difficulty.evaluation_days, 14);
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "decay = 12").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::LoadFailed { .. })));
    }
}
