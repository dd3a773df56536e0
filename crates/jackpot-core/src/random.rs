//! Random value sources.
//!
//! Draws are uniform over a [`ValueRange`] and are not cryptographically
//! secure. [`source_for_seed`] picks the implementation from configuration:
//! a seeded [`SmallRng`] for reproducible runs, otherwise the thread-local
//! generator.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::ValueRange;

/// A source of uniformly distributed values.
pub trait RandomSource: Send {
    /// Draw one value from `range`.
    ///
    /// Callers guarantee the range is non-empty; an empty range yields
    /// `range.min`.
    fn draw(&mut self, range: ValueRange) -> u32;
}

/// Draws from `rand`'s thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn draw(&mut self, range: ValueRange) -> u32 {
        if range.min >= range.max {
            return range.min;
        }
        rand::rng().random_range(range.min..range.max)
    }
}

/// Deterministic generator seeded once at construction.
#[derive(Debug, Clone)]
pub struct SeededRandomSource {
    rng: SmallRng,
}

impl SeededRandomSource {
    /// Create a source whose stream is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn draw(&mut self, range: ValueRange) -> u32 {
        if range.min >= range.max {
            return range.min;
        }
        self.rng.random_range(range.min..range.max)
    }
}

/// Replays a fixed list of values, then falls back to `range.min`.
///
/// Values are returned verbatim, even if they fall outside the range.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandomSource {
    values: VecDeque<u32>,
}

impl ScriptedRandomSource {
    /// Create a source that yields `values` in order.
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Queue another value behind the remaining script.
    pub fn push(&mut self, value: u32) {
        self.values.push_back(value);
    }
}

impl RandomSource for ScriptedRandomSource {
    fn draw(&mut self, range: ValueRange) -> u32 {
        self.values.pop_front().unwrap_or(range.min)
    }
}

/// Build the configured random source.
pub fn source_for_seed(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandomSource::new(seed)),
        None => Box::new(ThreadRandomSource),
    }
}
