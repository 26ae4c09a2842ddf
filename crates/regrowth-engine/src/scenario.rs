//! Scripted terrain and explosions for the engine binary.
//!
//! The `scenario` section of `regrowth-config.yaml` describes the terrain
//! to build before the run and the blasts to set off at given ticks. The
//! [`ScenarioDriver`] carves each blast out of the world when its tick
//! comes, submits the captured cells through an [`IntakeHandle`], and
//! clears leftover fire from each event's region once it completes.

use std::collections::VecDeque;

use regrowth_core::intake::IntakeHandle;
use regrowth_core::runner::TickObserver;
use regrowth_core::scheduler::TickReport;
use regrowth_types::{CellPos, Snapshot, WorldId};
use regrowth_world::{AIR, Blast, FIRE, MemoryWorld, shape};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Scenario section of `regrowth-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioConfig {
    /// World the scenario runs in.
    #[serde(default = "default_world")]
    pub world: String,

    /// Materials that count as absent for restoration. Air is always
    /// absent.
    #[serde(default = "default_absent_materials")]
    pub absent_materials: Vec<String>,

    /// Whether completed events have fire cleared from their region.
    #[serde(default = "default_clear_fire")]
    pub clear_fire: bool,

    /// Stop after this many ticks even if work remains (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Spheres filled before the run, in order.
    #[serde(default = "default_terrain")]
    pub terrain: Vec<TerrainSpec>,

    /// Blasts to set off.
    #[serde(default = "default_explosions")]
    pub explosions: Vec<ExplosionSpec>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            world: default_world(),
            absent_materials: default_absent_materials(),
            clear_fire: default_clear_fire(),
            max_ticks: default_max_ticks(),
            terrain: default_terrain(),
            explosions: default_explosions(),
        }
    }
}

/// A sphere of material filled before the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerrainSpec {
    /// Centre `[x, y, z]`.
    pub center: [i32; 3],
    /// Sphere radius.
    pub radius: u32,
    /// Material to fill with.
    pub material: String,
    /// Whether the cells count as built by an actor.
    #[serde(default)]
    pub placed: bool,
}

/// One scripted blast.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExplosionSpec {
    /// Tick on which the blast goes off (0 = before the first tick).
    #[serde(default)]
    pub at_tick: u64,
    /// Centre `[x, y, z]`.
    pub origin: [i32; 3],
    /// Radius of the carved sphere.
    pub radius: u32,
    /// Explosive yield.
    pub intensity: u32,
    /// Whether the blast leaves fire behind.
    #[serde(default)]
    pub incendiary: bool,
}

fn default_world() -> String {
    String::from("overworld")
}

fn default_absent_materials() -> Vec<String> {
    vec![String::from(AIR)]
}

const fn default_clear_fire() -> bool {
    true
}

const fn default_max_ticks() -> u64 {
    20_000
}

fn default_terrain() -> Vec<TerrainSpec> {
    vec![TerrainSpec {
        center: [0, 0, 0],
        radius: 8,
        material: String::from("stone"),
        placed: false,
    }]
}

fn default_explosions() -> Vec<ExplosionSpec> {
    vec![
        ExplosionSpec {
            at_tick: 0,
            origin: [0, 4, 0],
            radius: 3,
            intensity: 4,
            incendiary: false,
        },
        ExplosionSpec {
            at_tick: 20,
            origin: [3, 2, 0],
            radius: 3,
            intensity: 6,
            incendiary: true,
        },
    ]
}

const fn pos([x, y, z]: [i32; 3]) -> CellPos {
    CellPos::new(x, y, z)
}

/// Load the `scenario` section from `regrowth-config.yaml` contents.
///
/// A missing section yields [`ScenarioConfig::default`].
///
/// # Errors
///
/// Returns [`EngineError::Scenario`] if the YAML or the section is
/// malformed.
pub fn parse_scenario(contents: &str) -> Result<ScenarioConfig, EngineError> {
    let raw: serde_yml::Value = serde_yml::from_str(contents).map_err(|e| EngineError::Scenario {
        message: format!("failed to parse config YAML: {e}"),
    })?;

    let Some(section) = raw.get("scenario") else {
        return Ok(ScenarioConfig::default());
    };
    serde_yml::from_value(section.clone()).map_err(|e| EngineError::Scenario {
        message: format!("failed to parse scenario config: {e}"),
    })
}

// -----------------------------------------------------------------------
// World setup
// -----------------------------------------------------------------------

/// Build the world described by the scenario.
///
/// # Errors
///
/// Returns [`EngineError::World`] if a terrain write fails.
pub fn build_world(config: &ScenarioConfig) -> Result<MemoryWorld, EngineError> {
    let world_id = WorldId::new(config.world.as_str());
    let mut world = MemoryWorld::new(config.absent_materials.iter().cloned());
    world.add_world(world_id.clone())?;

    for spec in &config.terrain {
        if spec.placed {
            for cell in shape::sphere(pos(spec.center), spec.radius) {
                world.place(&world_id, cell, Snapshot::new(spec.material.as_str()))?;
            }
        } else {
            world.fill_sphere(&world_id, pos(spec.center), spec.radius, &spec.material)?;
        }
    }

    info!(
        world_id = %world_id,
        solid_cells = world.solid_count(&world_id),
        terrain_specs = config.terrain.len(),
        "Scenario world built"
    );
    Ok(world)
}

// -----------------------------------------------------------------------
// Driver
// -----------------------------------------------------------------------

/// Sets off scripted blasts and cleans up after completed events.
#[derive(Debug)]
pub struct ScenarioDriver {
    world_id: WorldId,
    intake: IntakeHandle,
    explosions: VecDeque<ExplosionSpec>,
    clear_fire: bool,
    blasts_fired: u32,
    fire_cleared: usize,
}

impl ScenarioDriver {
    /// Create a driver for the scenario's blasts, ordered by tick.
    pub fn new(config: &ScenarioConfig, intake: IntakeHandle) -> Self {
        let mut explosions = config.explosions.clone();
        explosions.sort_by_key(|e| e.at_tick);
        Self {
            world_id: WorldId::new(config.world.as_str()),
            intake,
            explosions: explosions.into(),
            clear_fire: config.clear_fire,
            blasts_fired: 0,
            fire_cleared: 0,
        }
    }

    /// Set off every blast scheduled at or before `tick`.
    pub fn detonate_due(&mut self, tick: u64, world: &mut MemoryWorld) {
        while self.explosions.front().is_some_and(|e| e.at_tick <= tick) {
            let Some(spec) = self.explosions.pop_front() else {
                break;
            };
            let blast = Blast {
                origin: pos(spec.origin),
                radius: spec.radius,
                intensity: spec.intensity,
                incendiary: spec.incendiary,
            };
            let event = match world.explode(&self.world_id, &blast) {
                Ok(event) => event,
                Err(err) => {
                    warn!(tick, error = %err, "Blast failed");
                    continue;
                }
            };
            match self.intake.submit(event) {
                Ok(event_id) => {
                    self.blasts_fired = self.blasts_fired.saturating_add(1);
                    info!(tick, %event_id, origin = %blast.origin, "Blast submitted");
                }
                Err(err) => warn!(tick, error = %err, "Blast submission failed"),
            }
        }
    }

    /// Blasts set off so far.
    pub const fn blasts_fired(&self) -> u32 {
        self.blasts_fired
    }

    /// Fire cells removed by post-completion cleanup.
    pub const fn fire_cleared(&self) -> usize {
        self.fire_cleared
    }
}

impl TickObserver<MemoryWorld> for ScenarioDriver {
    fn on_tick(&mut self, report: &TickReport, world: &mut MemoryWorld) {
        if self.clear_fire {
            for done in &report.completions {
                match world.clear_region(&done.world_id, &done.region, FIRE) {
                    Ok(cleared) => {
                        self.fire_cleared = self.fire_cleared.saturating_add(cleared);
                    }
                    Err(err) => {
                        warn!(event_id = %done.event_id, error = %err, "Fire cleanup failed");
                    }
                }
            }
        }
        self.detonate_due(report.tick, world);
    }

    fn has_pending_work(&self) -> bool {
        !self.explosions.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use regrowth_core::RegrowthScheduler;
    use regrowth_core::config::RegenerationConfig;
    use regrowth_core::operator::{OperatorState, RunEndReason};
    use regrowth_core::runner::{self, RunMode};
    use regrowth_world::CompletionLog;

    use super::*;

    const YAML: &str = r"
regeneration:
  speed: 9
scenario:
  world: arena
  absent_materials: [air, fire]
  max_ticks: 500
  terrain:
    - center: [0, 0, 0]
      radius: 2
      material: stone
    - center: [0, 3, 0]
      radius: 0
      material: planks
      placed: true
  explosions:
    - at_tick: 5
      origin: [0, 1, 0]
      radius: 2
      intensity: 3
    - origin: [0, 0, 0]
      radius: 1
      intensity: 1
      incendiary: true
";

    #[test]
    fn missing_section_uses_defaults() {
        let config = parse_scenario("regeneration:\n  speed: 3\n").unwrap();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn parses_scenario_section() {
        let config = parse_scenario(YAML).unwrap();
        assert_eq!(config.world, "arena");
        assert_eq!(config.absent_materials, vec!["air", "fire"]);
        assert_eq!(config.max_ticks, 500);
        assert_eq!(config.terrain.len(), 2);
        assert!(config.terrain.last().unwrap().placed);
        assert_eq!(config.explosions.first().unwrap().at_tick, 5);
        assert!(config.clear_fire);
    }

    #[test]
    fn malformed_section_is_an_error() {
        let result = parse_scenario("scenario:\n  explosions: 7\n");
        assert!(matches!(result, Err(EngineError::Scenario { .. })));
    }

    #[test]
    fn builds_terrain() {
        let config = parse_scenario(YAML).unwrap();
        let world = build_world(&config).unwrap();
        let arena = WorldId::new("arena");
        assert_eq!(world.solid_count(&arena), 34);
        assert_eq!(world.material_at(&arena, CellPos::new(0, 3, 0)), "planks");
    }

    #[test]
    fn driver_detonates_in_tick_order() {
        let config = parse_scenario(YAML).unwrap();
        let mut world = build_world(&config).unwrap();
        let scheduler = RegrowthScheduler::with_seed(&RegenerationConfig::default(), 1).unwrap();
        let mut driver = ScenarioDriver::new(&config, scheduler.intake_handle());

        driver.detonate_due(0, &mut world);
        assert_eq!(driver.blasts_fired(), 1);
        assert!(driver.has_pending_work());

        driver.detonate_due(4, &mut world);
        assert_eq!(driver.blasts_fired(), 1);

        driver.detonate_due(5, &mut world);
        assert_eq!(driver.blasts_fired(), 2);
        assert!(!driver.has_pending_work());
    }

    #[tokio::test]
    async fn late_lone_blast_is_restored_before_idle_exit() {
        let yaml = r"
scenario:
  world: arena
  terrain:
    - center: [0, 0, 0]
      radius: 2
      material: stone
  explosions:
    - at_tick: 5
      origin: [0, 0, 0]
      radius: 1
      intensity: 1
";
        let config = parse_scenario(yaml).unwrap();
        let mut world = build_world(&config).unwrap();
        let arena = WorldId::new("arena");
        let solid_before = world.solid_count(&arena);

        let regeneration = RegenerationConfig {
            speed: 10,
            max_jitter_ticks: 0,
            ..RegenerationConfig::default()
        };
        let mut scheduler = RegrowthScheduler::with_seed(&regeneration, 5).unwrap();
        let mut driver = ScenarioDriver::new(&config, scheduler.intake_handle());
        let mut hook = CompletionLog::new();
        let operator = Arc::new(OperatorState::new(0, 2_000));

        let result = runner::run(
            &mut scheduler,
            &mut world,
            &mut hook,
            &operator,
            &mut driver,
            RunMode::UntilIdle,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::Idle);
        assert_eq!(driver.blasts_fired(), 1);
        assert_eq!(hook.completions().len(), 1);
        assert_eq!(world.solid_count(&arena), solid_before);
        assert_eq!(scheduler.shutdown().unprocessed_events, 0);
    }
}
