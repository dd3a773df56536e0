//! Generation-and-broadcast engine for the Jackpot service.
//!
//! The engine draws a random value on a fixed cadence, records it in an
//! append-only history, watches for the target value, persists the whole
//! state to a snapshot file on its own schedule, and pushes each new
//! record to every connected subscriber.
//!
//! # Modules
//!
//! - [`config`] -- Typed YAML configuration with env overrides
//! - [`clock`] -- Wall-clock abstraction for record timestamps
//! - [`random`] -- Random source abstraction and implementations
//! - [`generator`] -- The per-tick draw and completion rule
//! - [`snapshot`] -- Snapshot file load and atomic write
//! - [`store`] -- Single-writer owner of the generation state
//! - [`registry`] -- Identity-keyed subscriber set and fan-out
//! - [`feed`] -- Cloneable query and subscription facade
//! - [`engine`] -- Tick and snapshot scheduling, startup and shutdown
//!
//! # Concurrency
//!
//! Exactly one task, the tick task, mutates the store. Queries take a
//! short read lock and return copies. The snapshot task copies the state
//! under a read lock and writes the file without holding it.

pub mod clock;
pub mod config;
pub mod engine;
pub mod feed;
pub mod generator;
pub mod random;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use engine::{Engine, EngineError, EngineHandle, TickCycle};
pub use feed::Feed;
pub use store::{GenerationStore, StoreError};
