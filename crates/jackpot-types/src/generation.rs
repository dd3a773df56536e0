//! Generation records and the persisted store state.
//!
//! A [`GenerationRecord`] is one drawn value together with the wall-clock
//! millisecond at which it was produced. [`GenerationState`] is the whole
//! of the engine's durable state and is exactly what the snapshot file
//! contains.
//!
//! # Snapshot compatibility
//!
//! Field aliases accept snapshots written by the earlier service, which
//! stored `{completed, currentGeneration: {time, generation}, generations}`.
//! Snapshots are always written back using the canonical names below.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single produced value and the moment it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(deny_unknown_fields)]
#[ts(export, export_to = "bindings/")]
pub struct GenerationRecord {
    /// Milliseconds since the Unix epoch at creation time.
    #[serde(alias = "time")]
    #[ts(type = "number")]
    pub timestamp: u64,
    /// The drawn value.
    #[serde(alias = "generation")]
    pub value: u32,
}

impl GenerationRecord {
    /// The zero-value record reported as `current` before the first tick.
    pub const SENTINEL: Self = Self {
        timestamp: 0,
        value: 0,
    };

    /// Create a new record.
    pub const fn new(timestamp: u64, value: u32) -> Self {
        Self { timestamp, value }
    }

    /// Whether this record is the pre-first-tick sentinel.
    pub const fn is_sentinel(&self) -> bool {
        self.timestamp == 0 && self.value == 0
    }
}

/// The engine's complete durable state.
///
/// `history` is append-only and `current` mirrors its last element (or
/// [`GenerationRecord::SENTINEL`] while it is empty). `completed` is a
/// one-way flag that is only ever raised by the generator.
///
/// Every field is required and unknown fields are rejected, so a partial
/// or mislabelled snapshot fails to parse instead of loading as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationState {
    /// Whether the target value has ever been produced.
    pub completed: bool,
    /// The most recently appended record.
    #[serde(alias = "currentGeneration")]
    pub current: GenerationRecord,
    /// Every record ever appended, oldest first.
    #[serde(alias = "generations")]
    pub history: Vec<GenerationRecord>,
}

impl GenerationState {
    /// Whether `current` agrees with the tail of `history`.
    ///
    /// An empty history must pair with the sentinel; otherwise `current`
    /// must equal the last record.
    pub fn is_consistent(&self) -> bool {
        self.history
            .last()
            .map_or(self.current.is_sentinel(), |last| *last == self.current)
    }

    /// Whether timestamps in `history` never decrease.
    pub fn is_chronological(&self) -> bool {
        self.history
            .windows(2)
            .all(|pair| matches!(pair, [a, b] if a.timestamp <= b.timestamp))
    }

    /// Return at most the `limit` most recent records, oldest first.
    ///
    /// `None` returns the full history.
    pub fn recent(&self, limit: Option<usize>) -> &[GenerationRecord] {
        let skip = limit.map_or(0, |n| self.history.len().saturating_sub(n));
        self.history.get(skip..).unwrap_or_default()
    }
}
