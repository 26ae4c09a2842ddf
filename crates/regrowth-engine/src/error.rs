//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: regrowth_core::config::ConfigError,
    },

    /// The scheduler could not be created.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: regrowth_core::scheduler::SchedulerError,
    },

    /// Building the scenario world failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: regrowth_world::WorldError,
    },

    /// The tick runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: regrowth_core::runner::RunnerError,
    },

    /// The scenario section could not be loaded.
    #[error("scenario error: {message}")]
    Scenario {
        /// Description of the scenario failure.
        message: String,
    },
}
