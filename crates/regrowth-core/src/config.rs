//! Configuration loading and typed config structures for the restoration
//! scheduler.
//!
//! The canonical configuration lives in `regrowth-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Unknown top-level sections (such as the engine's `scenario`) are ignored
//! here and parsed by their owners.

use std::path::Path;

use serde::Deserialize;

/// Fastest supported regeneration speed.
pub const MAX_SPEED: u8 = 10;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `regrowth-config.yaml`. All fields have
/// defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegrowthConfig {
    /// Pacing and bookkeeping parameters for the scheduler.
    #[serde(default)]
    pub regeneration: RegenerationConfig,

    /// Host tick loop parameters.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RegrowthConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `REGROWTH_SPEED` environment variable overrides
    /// `regeneration.speed` when set to a valid number.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.regeneration.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regeneration.validate()?;
        if self.runner.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "runner.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Pacing and bookkeeping parameters.
///
/// All durations are in host ticks (20 ticks per second by default).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegenerationConfig {
    /// Global speed knob, 0 to 10. 0 disables regeneration, 10 is fastest.
    #[serde(default = "default_speed")]
    pub speed: u8,

    /// Base delay for naturally occurring cells.
    #[serde(default = "default_natural_base_delay_ticks")]
    pub natural_base_delay_ticks: u32,

    /// Base delay for cells built by an actor.
    #[serde(default = "default_placed_base_delay_ticks")]
    pub placed_base_delay_ticks: u32,

    /// Extra delay per level of height above the event's lowest cell.
    #[serde(default = "default_per_level_delay_ticks")]
    pub per_level_delay_ticks: u32,

    /// Upper bound (inclusive) of the uniform random jitter added per task.
    #[serde(default = "default_max_jitter_ticks")]
    pub max_jitter_ticks: u32,

    /// Floor for every computed restore delay. Values below 1 are treated
    /// as 1.
    #[serde(default = "default_min_delay_ticks")]
    pub min_delay_ticks: u32,

    /// Pause between dispatching two consecutive layers.
    #[serde(default = "default_layer_interval_ticks")]
    pub layer_interval_ticks: u32,

    /// Hazard radius passed to the completion hook per unit of intensity.
    #[serde(default = "default_hook_radius_per_intensity")]
    pub hook_radius_per_intensity: u32,

    /// Maximum number of cells pending restoration at once (0 = unlimited).
    #[serde(default)]
    pub max_pending_cells: u32,

    /// Seed for the jitter RNG. Drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RegenerationConfig {
    /// Override values with environment variables when set.
    ///
    /// - `REGROWTH_SPEED` overrides `speed`
    pub fn apply_env_overrides(&mut self) {
        if let Some(speed) = std::env::var("REGROWTH_SPEED")
            .ok()
            .and_then(|val| val.trim().parse::<u8>().ok())
        {
            self.speed = speed;
        }
    }

    /// Check for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `speed` exceeds [`MAX_SPEED`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed > MAX_SPEED {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "regeneration.speed must be between 0 and {MAX_SPEED}, got {}",
                    self.speed
                ),
            });
        }
        Ok(())
    }
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            natural_base_delay_ticks: default_natural_base_delay_ticks(),
            placed_base_delay_ticks: default_placed_base_delay_ticks(),
            per_level_delay_ticks: default_per_level_delay_ticks(),
            max_jitter_ticks: default_max_jitter_ticks(),
            min_delay_ticks: default_min_delay_ticks(),
            layer_interval_ticks: default_layer_interval_ticks(),
            hook_radius_per_intensity: default_hook_radius_per_intensity(),
            max_pending_cells: 0,
            seed: None,
        }
    }
}

/// Host tick loop parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_speed() -> u8 {
    5
}

const fn default_natural_base_delay_ticks() -> u32 {
    100
}

const fn default_placed_base_delay_ticks() -> u32 {
    200
}

const fn default_per_level_delay_ticks() -> u32 {
    2
}

const fn default_max_jitter_ticks() -> u32 {
    20
}

const fn default_min_delay_ticks() -> u32 {
    1
}

const fn default_layer_interval_ticks() -> u32 {
    2
}

const fn default_hook_radius_per_intensity() -> u32 {
    2
}

const fn default_tick_interval_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RegrowthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.regeneration.speed, 5);
        assert_eq!(config.regeneration.natural_base_delay_ticks, 100);
        assert_eq!(config.regeneration.placed_base_delay_ticks, 200);
        assert_eq!(config.runner.tick_interval_ms, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
regeneration:
  speed: 8
  natural_base_delay_ticks: 60
  placed_base_delay_ticks: 40
  per_level_delay_ticks: 3
  max_jitter_ticks: 10
  min_delay_ticks: 5
  layer_interval_ticks: 4
  hook_radius_per_intensity: 3
  max_pending_cells: 5000
  seed: 99

runner:
  tick_interval_ms: 25

logging:
  level: "debug"
"#;

        let config = RegrowthConfig::parse(yaml);
        assert!(config.is_ok(), "parse failed: {config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.regeneration.speed, 8);
        assert_eq!(config.regeneration.placed_base_delay_ticks, 40);
        assert_eq!(config.regeneration.max_pending_cells, 5000);
        assert_eq!(config.regeneration.seed, Some(99));
        assert_eq!(config.runner.tick_interval_ms, 25);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = RegrowthConfig::parse("regeneration:\n  speed: 2\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.regeneration.speed, 2);
        assert_eq!(config.regeneration.per_level_delay_ticks, 2);
        assert_eq!(config.runner.tick_interval_ms, 50);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(RegrowthConfig::parse("").is_ok());
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let yaml = "scenario:\n  explosions: []\nregeneration:\n  speed: 3\n";
        let config = RegrowthConfig::parse(yaml);
        assert_eq!(config.ok().map(|c| c.regeneration.speed), Some(3));
    }

    #[test]
    fn speed_above_ten_is_rejected() {
        let result = RegrowthConfig::parse("regeneration:\n  speed: 11\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let result = RegrowthConfig::parse("runner:\n  tick_interval_ms: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = RegrowthConfig::parse("regeneration: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("regrowth-config.yaml");
        if path.exists() {
            let config = RegrowthConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
