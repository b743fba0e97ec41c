//! The energy ledger: the only persisted, mutable aggregate of the engine.
//!
//! Every transition consumes the current state and returns the next one, so
//! callers always write `state = state.add_energy(..)` and never patch a
//! stale copy. Derived views (color tier, progress) are computed on demand
//! and never stored.
//!
//! ## Daily cycle
//!
//! ```text
//! new -> add_energy* / apply_decay* -> reset_energy_if_needed (next day) -> ...
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::color::{color_index_of, progress_to_next_color, EnergyColor, MAX_COLOR_INDEX};
use super::source::{Completion, EnergySource};
use crate::decay::{self, DecayConfig};
use crate::error::ValidationError;
use crate::resonance::{self, ResonanceSummary};

/// Largest base amount a single completion may carry; larger inputs are clamped.
pub const MAX_BASE_AMOUNT: i64 = 1_000_000;

/// Default number of trailing days kept in `daily_history`.
pub const DEFAULT_HISTORY_RETENTION_DAYS: usize = 90;

fn default_history_retention_days() -> usize {
    DEFAULT_HISTORY_RETENTION_DAYS
}

/// Ledger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Completion,
    Decay,
}

/// One immutable record of a scored action (or of applied decay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEntry {
    pub id: String,
    pub source: EnergySource,
    #[serde(default)]
    pub kind: EntryKind,
    /// Signed amount; negative for decay.
    pub amount: i64,
    pub title: String,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Resonance used to compute the multiplier when the entry was written.
    #[serde(default)]
    pub resonance: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl EnergyEntry {
    pub fn is_decay(&self) -> bool {
        self.kind == EntryKind::Decay
    }
}

/// Closing totals of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHistorySnapshot {
    pub date: NaiveDate,
    pub total_energy: i64,
    #[serde(default)]
    pub completed_count: u32,
    #[serde(default)]
    pub average_resonance: Option<f64>,
}

/// Rendering hint only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Points,
    Aura,
}

/// Ledger state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyState {
    /// Current-day accumulator, never negative.
    pub total_energy: i64,
    /// Permanent counter, never reset.
    pub aura_count: u64,
    #[serde(default)]
    pub by_source: BTreeMap<EnergySource, i64>,
    #[serde(default)]
    pub entries: Vec<EnergyEntry>,
    #[serde(default)]
    pub daily_history: Vec<DailyHistorySnapshot>,
    pub last_reset: DateTime<Utc>,
    /// Instant of the most recent completion (decay entries do not count).
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Set once the final tier has paid out an aura since the last reset.
    #[serde(default)]
    pub aura_claimed_today: bool,
}

impl EnergyState {
    /// Fresh ledger anchored at `now`.
    pub fn new<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let now = now.with_timezone(&Utc);
        Self {
            total_energy: 0,
            aura_count: 0,
            by_source: BTreeMap::new(),
            entries: Vec::new(),
            daily_history: Vec::new(),
            last_reset: now,
            last_activity: now,
            display_mode: DisplayMode::Points,
            aura_claimed_today: false,
        }
    }

    // ── Derived views ────────────────────────────────────────────────

    pub fn color_index(&self) -> usize {
        color_index_of(self.total_energy)
    }

    pub fn color(&self) -> EnergyColor {
        EnergyColor::from_index(self.color_index())
    }

    pub fn progress_to_next_color(&self) -> f64 {
        progress_to_next_color(self.total_energy)
    }

    pub fn completions(&self) -> impl Iterator<Item = &EnergyEntry> {
        self.entries.iter().filter(|e| !e.is_decay())
    }

    pub fn completed_count(&self) -> usize {
        self.completions().count()
    }

    /// Mean resonance over today's completions that carry one.
    pub fn average_resonance(&self) -> Option<f64> {
        let (sum, count) = self
            .completions()
            .filter_map(|e| e.resonance)
            .fold((0.0, 0usize), |(sum, count), r| (sum + r, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Source of the most recent completion in the current day.
    pub fn last_completion_source(&self) -> Option<EnergySource> {
        self.completions().last().map(|e| e.source)
    }

    /// Magnitude of decay recorded on `date` in the zone `tz`.
    pub fn decay_applied_on<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.is_decay() && e.timestamp.with_timezone(tz).date_naive() == date)
            .map(|e| -e.amount)
            .sum()
    }

    /// Whether `now` falls on a different local calendar day than the last reset.
    pub fn needs_reset<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let last_day = self.last_reset.with_timezone(&now.timezone()).date_naive();
        now.date_naive() != last_day
    }

    /// Read-only view for rendering.
    pub fn snapshot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> EnergySnapshot {
        let index = self.color_index();
        EnergySnapshot {
            total_energy: self.total_energy,
            color_index: index,
            color: EnergyColor::from_index(index),
            progress_to_next_color: self.progress_to_next_color(),
            aura_count: self.aura_count,
            by_source: self.by_source.clone(),
            resonance: resonance::summarize(self, now),
            display_mode: self.display_mode,
            last_activity: self.last_activity,
            last_reset: self.last_reset,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Record a completed action.
    ///
    /// The base amount is clamped to `0..=MAX_BASE_AMOUNT`, scaled by the
    /// resonance multiplier and floored. Reaching the final tier pays out one aura per daily cycle.
    pub fn add_energy<Tz: TimeZone>(mut self, completion: &Completion, now: &DateTime<Tz>) -> Self {
        let multiplier = resonance::multiplier_for(completion.resonance);
        let base = completion.base_amount.clamp(0, MAX_BASE_AMOUNT);
        let actual = (base as f64 * multiplier).floor() as i64;
        let timestamp = self.entry_timestamp(now);

        self.entries.push(EnergyEntry {
            id: Uuid::new_v4().to_string(),
            source: completion.source,
            kind: EntryKind::Completion,
            amount: actual,
            title: completion.title.clone(),
            item_id: completion.item_id.clone(),
            resonance: resonance::clamp_resonance(completion.resonance),
            timestamp,
        });
        self.total_energy = self.total_energy.saturating_add(actual).max(0);
        let by_source = self.by_source.entry(completion.source).or_insert(0);
        *by_source = by_source.saturating_add(actual);
        self.last_activity = timestamp;

        debug!(
            source = completion.source.label(),
            base,
            multiplier,
            actual,
            total = self.total_energy,
            "energy added"
        );

        if self.color_index() >= MAX_COLOR_INDEX && !self.aura_claimed_today {
            self.aura_count += 1;
            self.aura_claimed_today = true;
            info!(aura_count = self.aura_count, "final tier reached, aura earned");
        }

        self
    }

    /// Roll the ledger over to a new day using the default retention window.
    pub fn reset_energy_if_needed<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Self {
        self.roll_over(now, &LedgerConfig::default())
    }

    /// Close out the previous day if `now` is on a different local calendar day.
    ///
    /// Calling this again on the same day is a no-op.
    pub fn roll_over<Tz: TimeZone>(mut self, now: &DateTime<Tz>, config: &LedgerConfig) -> Self {
        if !self.needs_reset(now) {
            return self;
        }

        let closed_day = self.last_reset.with_timezone(&now.timezone()).date_naive();
        let snapshot = DailyHistorySnapshot {
            date: closed_day,
            total_energy: self.total_energy,
            completed_count: self.completed_count() as u32,
            average_resonance: self.average_resonance(),
        };
        info!(
            date = %closed_day,
            total_energy = self.total_energy,
            "daily energy reset"
        );

        self.daily_history.push(snapshot);
        trim_front(&mut self.daily_history, config.history_retention_days);

        self.total_energy = 0;
        self.entries.clear();
        self.by_source.clear();
        self.aura_claimed_today = false;
        self.last_reset = now.with_timezone(&Utc);
        self
    }

    /// Apply inactivity decay for `hours_elapsed` hours without activity.
    pub fn apply_decay<Tz: TimeZone>(
        self,
        hours_elapsed: f64,
        now: &DateTime<Tz>,
        config: &DecayConfig,
    ) -> Self {
        decay::apply_decay(self, hours_elapsed, now, config)
    }

    /// Append a decay entry reducing the total by `magnitude` (already capped).
    pub(crate) fn record_decay<Tz: TimeZone>(mut self, magnitude: i64, now: &DateTime<Tz>) -> Self {
        let applied = magnitude.min(self.total_energy).max(0);
        if applied == 0 {
            return self;
        }
        let timestamp = self.entry_timestamp(now);
        let source = self.last_completion_source().unwrap_or(EnergySource::Tasks);
        self.entries.push(EnergyEntry {
            id: Uuid::new_v4().to_string(),
            source,
            kind: EntryKind::Decay,
            amount: -applied,
            title: "Inactivity decay".to_string(),
            item_id: None,
            resonance: None,
            timestamp,
        });
        self.total_energy -= applied;
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    // ── Rehydration ──────────────────────────────────────────────────

    /// Rebuild a ledger from a persisted JSON value.
    ///
    /// Anything that does not parse or validate yields a fresh ledger at `now`.
    pub fn rehydrate<Tz: TimeZone>(value: serde_json::Value, now: &DateTime<Tz>) -> Self {
        match serde_json::from_value::<EnergyState>(value) {
            Ok(state) => match state.validate() {
                Ok(()) => state,
                Err(e) => {
                    warn!("discarding invalid energy state: {e}");
                    Self::new(now)
                }
            },
            Err(e) => {
                warn!("discarding unparsable energy state: {e}");
                Self::new(now)
            }
        }
    }

    /// Check structural invariants of a persisted ledger.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.total_energy < 0 {
            return Err(invalid("total_energy", "must not be negative"));
        }
        if self
            .entries
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(invalid("entries", "timestamps are out of order"));
        }
        if self
            .entries
            .iter()
            .any(|e| e.resonance.is_some_and(|r| !(0.0..=100.0).contains(&r)))
        {
            return Err(invalid("entries", "resonance outside 0-100"));
        }
        if self
            .daily_history
            .windows(2)
            .any(|pair| pair[1].date <= pair[0].date)
        {
            return Err(invalid("daily_history", "dates are not strictly ascending"));
        }
        Ok(())
    }

    /// Timestamp for a new entry, never earlier than the last one logged.
    fn entry_timestamp<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let now = now.with_timezone(&Utc);
        match self.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn trim_front<T>(items: &mut Vec<T>, keep: usize) {
    if items.len() > keep {
        let excess = items.len() - keep;
        items.drain(..excess);
    }
}

/// Read-only view of the ledger handed to renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergySnapshot {
    pub total_energy: i64,
    pub color_index: usize,
    pub color: EnergyColor,
    pub progress_to_next_color: f64,
    pub aura_count: u64,
    pub by_source: BTreeMap<EnergySource, i64>,
    pub resonance: ResonanceSummary,
    pub display_mode: DisplayMode,
    pub last_activity: DateTime<Utc>,
    pub last_reset: DateTime<Utc>,
}
