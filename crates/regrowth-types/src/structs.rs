//! Core data structs for the Regrowth restoration scheduler.
//!
//! Covers cell coordinates, restorable snapshots, the destruction event
//! handed to intake, the hazard region passed to the completion hook, and
//! the completion report itself.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Classification;
use crate::ids::EventId;

// ---------------------------------------------------------------------------
// World and coordinates
// ---------------------------------------------------------------------------

/// Name of the world (dimension) a cell lives in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    /// Create a world identifier from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Return the world name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for WorldId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer coordinate of one cell. `y` is the elevation axis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellPos {
    /// East-west coordinate.
    pub x: i32,
    /// Elevation.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl CellPos {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Return the coordinate shifted by the given deltas, saturating at the
    /// `i32` bounds.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }
}

impl core::fmt::Display for CellPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Pre-destruction state of a cell, sufficient to restore it exactly.
///
/// The scheduler never inspects a snapshot; only the world collaborator
/// interprets `material` and `properties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Material name (e.g. `"stone"`, `"oak_planks"`).
    pub material: String,
    /// Material-specific state such as orientation or growth stage.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create a snapshot of a plain material with no properties.
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Return the snapshot with an additional property set.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Destruction event
// ---------------------------------------------------------------------------

/// One destroyed cell as captured at the moment of destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedCell {
    /// Where the cell was.
    pub pos: CellPos,
    /// What the cell held before it was destroyed.
    pub snapshot: Snapshot,
    /// Whether the cell was natural terrain or built by an actor.
    pub classification: Classification,
}

impl CapturedCell {
    /// Capture a destroyed cell.
    pub const fn new(pos: CellPos, snapshot: Snapshot, classification: Classification) -> Self {
        Self {
            pos,
            snapshot,
            classification,
        }
    }
}

/// A single disruptive occurrence that destroyed a set of cells together.
///
/// Produced by a world-mutation detector outside the scheduler; the
/// scheduler assigns the [`EventId`] on intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructionEvent {
    /// World the destruction happened in.
    pub world_id: WorldId,
    /// Centre of the explosion.
    pub origin: CellPos,
    /// Explosive yield. Drives the size of the hazard region cleared on
    /// completion.
    pub intensity: u32,
    /// Destroyed cells with their captured snapshots, in any order.
    pub cells: Vec<CapturedCell>,
}

impl DestructionEvent {
    /// Create an event with no cells yet.
    pub const fn new(world_id: WorldId, origin: CellPos, intensity: u32) -> Self {
        Self {
            world_id,
            origin,
            intensity,
            cells: Vec::new(),
        }
    }

    /// Return the event with one more captured cell.
    #[must_use]
    pub fn with_cell(mut self, cell: CapturedCell) -> Self {
        self.cells.push(cell);
        self
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Inclusive axis-aligned box of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Lowest corner (inclusive).
    pub min: CellPos,
    /// Highest corner (inclusive).
    pub max: CellPos,
}

impl Region {
    /// The cube of half-width `radius` centred on `center`.
    pub fn around(center: CellPos, radius: u32) -> Self {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        Self {
            min: center.offset(r.saturating_neg(), r.saturating_neg(), r.saturating_neg()),
            max: center.offset(r, r, r),
        }
    }

    /// Whether `pos` lies inside the region.
    pub const fn contains(&self, pos: CellPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }
}

// ---------------------------------------------------------------------------
// Completion report
// ---------------------------------------------------------------------------

/// Everything the completion hook learns about a finished event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCompletion {
    /// The finished event.
    pub event_id: EventId,
    /// World the event happened in.
    pub world_id: WorldId,
    /// Centre of the explosion.
    pub origin: CellPos,
    /// Explosive yield the event was submitted with.
    pub intensity: u32,
    /// Hazard radius derived from the intensity.
    pub radius: u32,
    /// Hazard region (cube of `radius` around `origin`).
    pub region: Region,
    /// Cells whose snapshot was written back.
    pub restored: u32,
    /// Cells that had been rebuilt by something else before their task fired.
    pub skipped: u32,
    /// Cells whose restore failed.
    pub failed: u32,
    /// Tick on which the event was accepted.
    pub submitted_tick: u64,
    /// Tick on which the last cell resolved.
    pub completed_tick: u64,
    /// Wall-clock time the last cell resolved.
    pub completed_at: DateTime<Utc>,
}

impl EventCompletion {
    /// Total number of cells that belonged to the event.
    pub const fn total_cells(&self) -> u32 {
        self.restored
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }
}
