//! Delayed, layered, bottom-up restoration of cells destroyed by
//! explosions.
//!
//! A destruction event's cells are bucketed by elevation into layers. One
//! layer is released per pacing interval, lowest first, and each of its
//! cells is restored after a delay derived from its material
//! classification, its height within the event, the global speed knob, and
//! random jitter. Cells that something else has already refilled are left
//! alone. When an event's last cell resolves, a completion hook runs once.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter.
//! - [`config`] -- Configuration loading from `regrowth-config.yaml`.
//! - [`pacing`] -- [`PacingFunction`]: restore delay per task.
//! - [`intake`] -- Admission filtering, layer grouping, and the
//!   thread-safe [`IntakeHandle`] funnel.
//! - [`layers`] -- [`LayerQueue`] ordered by elevation.
//! - [`dispatcher`] -- Idle/draining state machine that pops layers.
//! - [`timers`] -- [`DeadlineQueue`] of tasks keyed by due tick.
//! - [`tracker`] -- Per-event remaining counts.
//! - [`host`] -- [`WorldAccess`] and [`CompletionHook`] collaborator traits.
//! - [`scheduler`] -- [`RegrowthScheduler`], the per-tick façade.
//! - [`operator`] -- Pause, stop, and speed controls for a run.
//! - [`runner`] -- Async real-time tick loop.
//!
//! [`PacingFunction`]: pacing::PacingFunction
//! [`IntakeHandle`]: intake::IntakeHandle
//! [`LayerQueue`]: layers::LayerQueue
//! [`DeadlineQueue`]: timers::DeadlineQueue
//! [`WorldAccess`]: host::WorldAccess
//! [`CompletionHook`]: host::CompletionHook
//! [`RegrowthScheduler`]: scheduler::RegrowthScheduler

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod host;
pub mod intake;
pub mod layers;
pub mod operator;
pub mod pacing;
pub mod runner;
pub mod scheduler;
pub mod timers;
pub mod tracker;

pub use config::RegrowthConfig;
pub use host::{CompletionHook, NoOpHook, WorldAccess};
pub use intake::{IntakeHandle, IntakeOutcome};
pub use scheduler::{RegrowthScheduler, SchedulerError, TickReport};
