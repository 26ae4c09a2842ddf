//! In-memory voxel world for the regrowth scheduler.
//!
//! This crate gives the scheduler something to restore into: worlds of
//! cells keyed by integer position, blasts that carve spheres and report
//! what they destroyed, and a region clear used for post-restoration
//! hazard cleanup.
//!
//! # Modules
//!
//! - [`error`] -- Error types for world operations.
//! - [`hooks`] -- [`CompletionLog`], a recording completion hook.
//! - [`memory_world`] -- [`MemoryWorld`], implementing
//!   [`WorldAccess`](regrowth_core::host::WorldAccess).
//! - [`shape`] -- Sphere rasterisation for blasts.
//!
//! [`CompletionLog`]: hooks::CompletionLog
//! [`MemoryWorld`]: memory_world::MemoryWorld

pub mod error;
pub mod hooks;
pub mod memory_world;
pub mod shape;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use hooks::CompletionLog;
pub use memory_world::{AIR, Blast, FIRE, FeedbackSignal, MemoryWorld};
