//! The generator loop's per-tick step and completion rule.
//!
//! Each tick draws one value, stamps it, and commits it to the store. If
//! the value equals the configured target, the store's completion flag is
//! raised in the same step.
//!
//! # Halt policy
//!
//! By default completion is a milestone: ticking continues and history
//! keeps growing. With `halt_on_completion` the generator moves to
//! [`GeneratorState::Stopped`] as soon as it observes the flag (including
//! a flag restored from a snapshot) and never draws again.

use std::sync::Arc;

use jackpot_types::GenerationRecord;

use crate::clock::Clock;
use crate::config::{GeneratorConfig, ValueRange};
use crate::random::RandomSource;
use crate::store::GenerationStore;

/// Lifecycle of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Producing one record per tick.
    Running,
    /// Terminal; only reachable with `halt_on_completion`.
    Stopped,
}

/// Outcome of a tick that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// The record appended to the store.
    pub record: GenerationRecord,
    /// Whether the record's value is the target.
    pub target_hit: bool,
    /// Whether this tick raised the completion flag.
    pub newly_completed: bool,
}

/// Draws values and applies the completion rule.
pub struct Generator {
    source: Box<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    range: ValueRange,
    target: u32,
    halt_on_completion: bool,
    state: GeneratorState,
}

impl core::fmt::Debug for Generator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Generator")
            .field("range", &self.range)
            .field("target", &self.target)
            .field("halt_on_completion", &self.halt_on_completion)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Generator {
    /// Create a running generator.
    pub fn new(
        config: &GeneratorConfig,
        source: Box<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            clock,
            range: config.range(),
            target: config.target_value,
            halt_on_completion: config.halt_on_completion,
            state: GeneratorState::Running,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> GeneratorState {
        self.state
    }

    /// The value that completes the run.
    pub const fn target(&self) -> u32 {
        self.target
    }

    /// Run one tick against `store`.
    ///
    /// Returns `None` once the generator is stopped.
    pub fn tick(&mut self, store: &GenerationStore) -> Option<TickReport> {
        if self.halt_on_completion && store.is_completed() {
            self.state = GeneratorState::Stopped;
        }
        if self.state == GeneratorState::Stopped {
            return None;
        }

        let value = self.source.draw(self.range);
        // Never stamp earlier than the previous record, even if the wall
        // clock steps backwards.
        let timestamp = self.clock.now_millis().max(store.current().timestamp);
        let record = GenerationRecord::new(timestamp, value);
        let target_hit = value == self.target;

        let newly_completed = store.commit(record, target_hit);

        Some(TickReport {
            record,
            target_hit,
            newly_completed,
        })
    }
}
