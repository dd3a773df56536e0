//! Shared type definitions for the Jackpot generation engine.
//!
//! This crate is the single source of truth for the data that flows
//! between the engine, its snapshot file, and live subscribers. Types
//! that reach a browser are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Stable subscriber identifiers
//! - [`generation`] -- Generation records and the persisted store state
//! - [`events`] -- Events pushed to live subscribers

pub mod events;
pub mod generation;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use events::SubscriberEvent;
pub use generation::{GenerationRecord, GenerationState};
pub use ids::SubscriberId;
