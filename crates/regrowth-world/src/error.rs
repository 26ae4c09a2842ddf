//! Error types for the `regrowth-world` crate.

use regrowth_types::{CellPos, WorldId};

/// Errors that can occur during in-memory world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The named world has not been created.
    #[error("world not found: {0}")]
    WorldNotFound(WorldId),

    /// A world with the same id already exists.
    #[error("duplicate world id: {0}")]
    DuplicateWorld(WorldId),

    /// The cell lies in an unloaded region.
    #[error("cell {pos} in world {world_id} is not loaded")]
    Unloaded {
        /// World of the cell.
        world_id: WorldId,
        /// The unloaded cell.
        pos: CellPos,
    },

    /// A snapshot named no material.
    #[error("empty material at {0}")]
    EmptyMaterial(CellPos),
}
