//! In-memory voxel world.
//!
//! [`MemoryWorld`] stores solid cells per world in a
//! `BTreeMap<CellPos, Snapshot>`; any position without an entry reads as
//! air. Which materials count as "absent" for restoration is chosen per
//! deployment, so one host can treat leftover fire as a hole to fill and
//! another can leave it for the completion hook to clear.
//!
//! For failure testing, regions can be marked unloaded and materials can be
//! marked unplaceable; restores into either fail with a [`RestoreError`].

use std::collections::{BTreeMap, BTreeSet};

use regrowth_core::host::{FeedbackError, RestoreError, WorldAccess};
use regrowth_types::{
    CapturedCell, CellPos, Classification, DestructionEvent, Region, Snapshot, WorldId,
};
use tracing::{debug, info};

use crate::error::WorldError;
use crate::shape;

/// Material every unset position reads as.
pub const AIR: &str = "air";

/// Material left behind by an incendiary blast.
pub const FIRE: &str = "fire";

/// A cosmetic restore signal recorded by the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSignal {
    /// World of the restored cell.
    pub world_id: WorldId,
    /// The restored cell.
    pub pos: CellPos,
    /// Material that was written back.
    pub material: String,
}

/// Parameters of one blast carved by [`MemoryWorld::explode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blast {
    /// Centre of the blast.
    pub origin: CellPos,
    /// Radius of the carved sphere.
    pub radius: u32,
    /// Explosive yield reported on the event.
    pub intensity: u32,
    /// Whether fire is left on carved cells that rest on solid ground.
    pub incendiary: bool,
}

/// Cells of one world.
#[derive(Debug, Clone, Default)]
struct WorldCells {
    /// Non-air cells.
    cells: BTreeMap<CellPos, Snapshot>,
    /// Cells built by an actor rather than generated.
    placed: BTreeSet<CellPos>,
    /// Regions that reject writes.
    unloaded: Vec<Region>,
}

impl WorldCells {
    fn is_loaded(&self, pos: CellPos) -> bool {
        !self.unloaded.iter().any(|r| r.contains(pos))
    }
}

/// In-memory world store implementing [`WorldAccess`].
#[derive(Debug, Clone)]
pub struct MemoryWorld {
    worlds: BTreeMap<WorldId, WorldCells>,
    absent_materials: BTreeSet<String>,
    unplaceable: BTreeSet<String>,
    feedback: Vec<FeedbackSignal>,
    feedback_fails: bool,
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new([AIR])
    }
}

impl MemoryWorld {
    /// Create a world store where the listed materials count as absent.
    /// Air always counts as absent.
    pub fn new<I, S>(absent_materials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut absent: BTreeSet<String> = absent_materials.into_iter().map(Into::into).collect();
        absent.insert(AIR.to_owned());
        Self {
            worlds: BTreeMap::new(),
            absent_materials: absent,
            unplaceable: BTreeSet::new(),
            feedback: Vec::new(),
            feedback_fails: false,
        }
    }

    // -------------------------------------------------------------------
    // Worlds
    // -------------------------------------------------------------------

    /// Create an empty world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateWorld`] if the id is taken.
    pub fn add_world(&mut self, world_id: WorldId) -> Result<(), WorldError> {
        if self.has_world(&world_id) {
            return Err(WorldError::DuplicateWorld(world_id));
        }
        self.worlds.insert(world_id, WorldCells::default());
        Ok(())
    }

    /// Builder form of [`add_world`](Self::add_world) that ignores
    /// duplicates.
    #[must_use]
    pub fn with_world(mut self, world_id: WorldId) -> Self {
        self.worlds.entry(world_id).or_default();
        self
    }

    /// Whether the world exists.
    pub fn has_world(&self, world_id: &WorldId) -> bool {
        self.worlds.contains_key(world_id)
    }

    fn world(&self, world_id: &WorldId) -> Result<&WorldCells, WorldError> {
        self.worlds
            .get(world_id)
            .ok_or_else(|| WorldError::WorldNotFound(world_id.clone()))
    }

    fn world_mut(&mut self, world_id: &WorldId) -> Result<&mut WorldCells, WorldError> {
        self.worlds
            .get_mut(world_id)
            .ok_or_else(|| WorldError::WorldNotFound(world_id.clone()))
    }

    // -------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------

    /// The snapshot at `pos`, or `None` for air and unknown worlds.
    pub fn cell(&self, world_id: &WorldId, pos: CellPos) -> Option<&Snapshot> {
        self.worlds.get(world_id).and_then(|w| w.cells.get(&pos))
    }

    /// Material name at `pos` (air when unset).
    pub fn material_at(&self, world_id: &WorldId, pos: CellPos) -> &str {
        self.cell(world_id, pos)
            .map_or(AIR, |snapshot| snapshot.material.as_str())
    }

    /// Whether `material` counts as absent in this deployment.
    pub fn is_absent_material(&self, material: &str) -> bool {
        self.absent_materials.contains(material)
    }

    /// Write a generated cell. Setting [`AIR`] removes the cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] or [`WorldError::EmptyMaterial`].
    pub fn set_natural(
        &mut self,
        world_id: &WorldId,
        pos: CellPos,
        snapshot: Snapshot,
    ) -> Result<Option<Snapshot>, WorldError> {
        let world = self.world_mut(world_id)?;
        world.placed.remove(&pos);
        write(world, pos, snapshot)
    }

    /// Write a cell as an actor would build it. It is captured as
    /// [`Classification::Placed`] when blown up.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] or [`WorldError::EmptyMaterial`].
    pub fn place(
        &mut self,
        world_id: &WorldId,
        pos: CellPos,
        snapshot: Snapshot,
    ) -> Result<Option<Snapshot>, WorldError> {
        let world = self.world_mut(world_id)?;
        world.placed.insert(pos);
        write(world, pos, snapshot)
    }

    /// Classification a cell would be captured with.
    pub fn classification_at(&self, world_id: &WorldId, pos: CellPos) -> Classification {
        match self.worlds.get(world_id) {
            Some(world) if world.placed.contains(&pos) => Classification::Placed,
            _ => Classification::Natural,
        }
    }

    /// Number of non-air cells in the world.
    pub fn solid_count(&self, world_id: &WorldId) -> usize {
        self.worlds.get(world_id).map_or(0, |w| w.cells.len())
    }

    /// Count cells of `material` anywhere in the world.
    pub fn count_material(&self, world_id: &WorldId, material: &str) -> usize {
        self.worlds.get(world_id).map_or(0, |w| {
            w.cells.values().filter(|snap| snap.material == material).count()
        })
    }

    /// Count cells of `material` inside `region`.
    pub fn count_in_region(&self, world_id: &WorldId, region: &Region, material: &str) -> usize {
        self.worlds.get(world_id).map_or(0, |w| {
            w.cells
                .iter()
                .filter(|(pos, snap)| region.contains(**pos) && snap.material == material)
                .count()
        })
    }

    // -------------------------------------------------------------------
    // Shapes and blasts
    // -------------------------------------------------------------------

    /// Fill a sphere with natural cells of `material`. Returns the number
    /// of cells written.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] or [`WorldError::EmptyMaterial`].
    pub fn fill_sphere(
        &mut self,
        world_id: &WorldId,
        center: CellPos,
        radius: u32,
        material: &str,
    ) -> Result<usize, WorldError> {
        let cells = shape::sphere(center, radius);
        let world = self.world_mut(world_id)?;
        for pos in &cells {
            world.placed.remove(pos);
            write(world, *pos, Snapshot::new(material))?;
        }
        Ok(cells.len())
    }

    /// Carve a sphere out of the world and return the destruction event
    /// describing what was removed.
    ///
    /// Every non-absent cell in the sphere is captured with its snapshot
    /// and classification, then cleared to air. An incendiary blast then
    /// sets fire on each carved cell that rests on a solid cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] if the world does not exist.
    pub fn explode(
        &mut self,
        world_id: &WorldId,
        blast: &Blast,
    ) -> Result<DestructionEvent, WorldError> {
        let absent = self.absent_materials.clone();
        let world = self.world_mut(world_id)?;
        let mut event = DestructionEvent::new(world_id.clone(), blast.origin, blast.intensity);

        for pos in shape::sphere(blast.origin, blast.radius) {
            let Some(snapshot) = world.cells.get(&pos) else {
                continue;
            };
            if absent.contains(&snapshot.material) {
                continue;
            }
            let classification = if world.placed.contains(&pos) {
                Classification::Placed
            } else {
                Classification::Natural
            };
            if let Some(snapshot) = world.cells.remove(&pos) {
                event.cells.push(CapturedCell::new(pos, snapshot, classification));
            }
        }

        let mut ignited: usize = 0;
        if blast.incendiary {
            let grounded: Vec<CellPos> = event
                .cells
                .iter()
                .map(|cell| cell.pos)
                .filter(|pos| {
                    world
                        .cells
                        .get(&pos.offset(0, -1, 0))
                        .is_some_and(|s| !absent.contains(&s.material))
                })
                .collect();
            for pos in grounded {
                world.cells.insert(pos, Snapshot::new(FIRE));
                ignited = ignited.saturating_add(1);
            }
        }

        info!(
            %world_id,
            origin = %blast.origin,
            radius = blast.radius,
            intensity = blast.intensity,
            carved = event.cells.len(),
            ignited,
            "Blast carved"
        );
        Ok(event)
    }

    /// Remove every cell of `material` inside `region`. Returns the number
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] if the world does not exist.
    pub fn clear_region(
        &mut self,
        world_id: &WorldId,
        region: &Region,
        material: &str,
    ) -> Result<usize, WorldError> {
        let world = self.world_mut(world_id)?;
        let before = world.cells.len();
        world
            .cells
            .retain(|pos, snap| !(region.contains(*pos) && snap.material == material));
        let cleared = before.saturating_sub(world.cells.len());
        debug!(%world_id, material, cleared, "Region cleared");
        Ok(cleared)
    }

    // -------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------

    /// Mark a region unloaded; restores into it fail.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] if the world does not exist.
    pub fn unload_region(&mut self, world_id: &WorldId, region: Region) -> Result<(), WorldError> {
        self.world_mut(world_id)?.unloaded.push(region);
        Ok(())
    }

    /// Load every unloaded region of the world again.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] if the world does not exist.
    pub fn load_all(&mut self, world_id: &WorldId) -> Result<(), WorldError> {
        self.world_mut(world_id)?.unloaded.clear();
        Ok(())
    }

    /// Whether `pos` is in a loaded part of the world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorldNotFound`] if the world does not exist.
    pub fn is_loaded(&self, world_id: &WorldId, pos: CellPos) -> Result<bool, WorldError> {
        Ok(self.world(world_id)?.is_loaded(pos))
    }

    /// Refuse restores of `material`.
    pub fn reject_material(&mut self, material: impl Into<String>) {
        self.unplaceable.insert(material.into());
    }

    /// Make every feedback signal fail.
    pub const fn set_feedback_fails(&mut self, fails: bool) {
        self.feedback_fails = fails;
    }

    /// Feedback signals emitted so far.
    pub fn feedback(&self) -> &[FeedbackSignal] {
        &self.feedback
    }
}

fn write(
    world: &mut WorldCells,
    pos: CellPos,
    snapshot: Snapshot,
) -> Result<Option<Snapshot>, WorldError> {
    if snapshot.material.is_empty() {
        return Err(WorldError::EmptyMaterial(pos));
    }
    if snapshot.material == AIR {
        world.placed.remove(&pos);
        return Ok(world.cells.remove(&pos));
    }
    Ok(world.cells.insert(pos, snapshot))
}

impl WorldAccess for MemoryWorld {
    fn is_absent(&self, world_id: &WorldId, pos: CellPos) -> bool {
        self.is_absent_material(self.material_at(world_id, pos))
    }

    fn restore_cell(
        &mut self,
        world_id: &WorldId,
        pos: CellPos,
        snapshot: &Snapshot,
    ) -> Result<(), RestoreError> {
        if self.unplaceable.contains(&snapshot.material) || snapshot.material.is_empty() {
            return Err(RestoreError::InvalidSnapshot {
                pos,
                material: snapshot.material.clone(),
                reason: "material cannot be placed".to_owned(),
            });
        }
        let world = self
            .worlds
            .get_mut(world_id)
            .ok_or_else(|| RestoreError::WorldUnavailable(world_id.clone()))?;
        if !world.is_loaded(pos) {
            return Err(RestoreError::Unloaded {
                world_id: world_id.clone(),
                pos,
            });
        }
        if snapshot.material == AIR {
            world.cells.remove(&pos);
        } else {
            world.cells.insert(pos, snapshot.clone());
        }
        Ok(())
    }

    fn emit_feedback(&mut self, world_id: &WorldId, pos: CellPos) -> Result<(), FeedbackError> {
        if self.feedback_fails {
            return Err(FeedbackError {
                pos,
                message: "feedback channel closed".to_owned(),
            });
        }
        let material = self.material_at(world_id, pos).to_owned();
        self.feedback.push(FeedbackSignal {
            world_id: world_id.clone(),
            pos,
            material,
        });
        Ok(())
    }
}
