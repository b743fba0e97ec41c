//! Energy ledger module.
//!
//! The ledger converts completed user actions into a daily, decaying,
//! tier-progressing energy score plus a permanent aura counter.

mod color;
mod ledger;
mod source;

pub use color::{
    color_index_of, color_index_with, progress_to_next_color, progress_with, EnergyColor,
    COLOR_THRESHOLDS, MAX_COLOR_INDEX,
};
pub use ledger::{
    DailyHistorySnapshot, DisplayMode, EnergyEntry, EnergySnapshot, EnergyState, EntryKind,
    LedgerConfig, DEFAULT_HISTORY_RETENTION_DAYS, MAX_BASE_AMOUNT,
};
pub use source::{Completion, CompletionKind, EnergySource, TaskPriority, EVENT_BASE_ENERGY};
