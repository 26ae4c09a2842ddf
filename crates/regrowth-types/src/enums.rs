//! Enumeration types for the Regrowth restoration scheduler.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cell classification
// ---------------------------------------------------------------------------

/// How a destroyed cell came to exist before the destruction.
///
/// Decided once when the destruction is captured and carried on the cell;
/// downstream code never re-derives it from the cell's material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Naturally occurring terrain (generated stone, dirt, ore).
    Natural,
    /// Deliberately built by an actor.
    Placed,
}

impl Classification {
    /// Return the lowercase name used in configuration and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Placed => "placed",
        }
    }
}

impl core::fmt::Display for Classification {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cell outcome
// ---------------------------------------------------------------------------

/// How a single regeneration task resolved when it fired.
///
/// Every variant counts as "resolved" for completion tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOutcome {
    /// The snapshot was written back into the world.
    Restored,
    /// Something else had already filled the cell; nothing was written.
    Skipped,
    /// Writing the snapshot failed; the cell stays as it is.
    Failed,
}
