//! Engine binary for the regrowth scheduler.
//!
//! Wires configuration, logging, an in-memory world and the tick runner,
//! replays the scripted blasts from `regrowth-config.yaml`, and runs until
//! every event has been restored.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `regrowth-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the scenario world
//! 4. Create the scheduler and operator state
//! 5. Set off blasts due before the first tick
//! 6. Run until idle (or the tick limit)
//! 7. Shut down and log the result

mod error;
mod scenario;

use std::path::Path;
use std::sync::Arc;

use regrowth_core::config::RegrowthConfig;
use regrowth_core::operator::OperatorState;
use regrowth_core::runner::{self, RunMode};
use regrowth_core::RegrowthScheduler;
use regrowth_types::WorldId;
use regrowth_world::{CompletionLog, FIRE};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::scenario::{ScenarioConfig, ScenarioDriver};

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "regrowth-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the run itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, scenario) = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str())),
        )
        .with_target(true)
        .init();

    info!(
        speed = config.regeneration.speed,
        tick_interval_ms = config.runner.tick_interval_ms,
        layer_interval_ticks = config.regeneration.layer_interval_ticks,
        explosions = scenario.explosions.len(),
        "regrowth-engine starting"
    );

    // 3. Build the scenario world.
    let mut world = scenario::build_world(&scenario)?;
    let world_id = WorldId::new(scenario.world.as_str());

    // 4. Create scheduler and operator state.
    let mut scheduler = RegrowthScheduler::new(&config.regeneration)?;
    let operator = Arc::new(OperatorState::new(
        config.runner.tick_interval_ms,
        scenario.max_ticks,
    ));
    let mut hook = CompletionLog::new();
    let mut driver = ScenarioDriver::new(&scenario, scheduler.intake_handle());

    // 5. Blasts due before the first tick.
    driver.detonate_due(0, &mut world);

    // 6. Run.
    let result = runner::run(
        &mut scheduler,
        &mut world,
        &mut hook,
        &operator,
        &mut driver,
        RunMode::UntilIdle,
    )
    .await?;
    runner::log_run_end(&result);

    // 7. Shut down and report.
    let shutdown = scheduler.shutdown();
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        blasts = driver.blasts_fired(),
        completed_events = hook.completions().len(),
        fire_cleared = driver.fire_cleared(),
        remaining_fire = world.count_material(&world_id, FIRE),
        abandoned_events = shutdown.abandoned_events,
        solid_cells = world.solid_count(&world_id),
        "regrowth-engine shutdown complete"
    );

    Ok(())
}

/// Load the scheduler configuration and the scenario section from
/// `regrowth-config.yaml`.
///
/// Falls back to defaults when the file does not exist.
fn load_config() -> Result<(RegrowthConfig, ScenarioConfig), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if !config_path.exists() {
        let mut config = RegrowthConfig::default();
        config.regeneration.apply_env_overrides();
        config.validate()?;
        return Ok((config, ScenarioConfig::default()));
    }

    let config = RegrowthConfig::from_file(config_path)?;
    let contents = std::fs::read_to_string(config_path).map_err(|e| EngineError::Scenario {
        message: format!("failed to read config file: {e}"),
    })?;
    let scenario = scenario::parse_scenario(&contents)?;
    Ok((config, scenario))
}
