//! Shared type definitions for the Regrowth restoration scheduler.
//!
//! This crate is the single source of truth for the vocabulary passed
//! between the scheduler core, the world collaborators, and the engine
//! binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for destruction event identifiers
//! - [`enums`] -- Cell classification and per-cell resolution outcomes
//! - [`structs`] -- Coordinates, snapshots, destruction events, regions,
//!   and completion reports

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CellOutcome, Classification};
pub use ids::EventId;
pub use structs::{
    CapturedCell, CellPos, DestructionEvent, EventCompletion, Region, Snapshot, WorldId,
};
