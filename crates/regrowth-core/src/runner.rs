//! Real-time tick loop around [`RegrowthScheduler`].
//!
//! [`run`] drives the scheduler at the configured tick interval with
//! support for:
//!
//! - **Pause/resume**: ticking halts; deadlines are in ticks so nothing
//!   comes due while paused
//! - **Speed changes**: applied between ticks
//! - **Bounded runs**: stop after `max_ticks`
//! - **Idle exit**: in [`RunMode::UntilIdle`], stop once all work is done
//! - **Operator stop**: clean stop before the next tick
//!
//! The scheduler itself never sleeps or spawns; this module is the only
//! place that touches the tokio timer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::host::{CompletionHook, WorldAccess};
use crate::operator::{OperatorState, RunEndReason};
use crate::scheduler::{RegrowthScheduler, SchedulerError, SchedulerStats, TickReport};

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },
}

/// When [`run`] should return on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Return once the scheduler is idle and the observer has nothing more
    /// to submit.
    UntilIdle,
    /// Keep ticking until stopped or the tick limit is reached.
    UntilStopped,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Ticks executed during this run.
    pub total_ticks: u64,
    /// Scheduler stats after the last tick.
    pub final_stats: SchedulerStats,
    /// Cells restored during the run.
    pub restored: u64,
    /// Cells skipped during the run.
    pub skipped: u64,
    /// Cell restores that failed during the run.
    pub failed: u64,
    /// Events completed during the run.
    pub completed_events: u64,
    /// When the operator state for this run was created.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

/// Called after every tick with the report and the world the tick ran
/// against.
pub trait TickObserver<W: ?Sized> {
    /// Called after a tick completes.
    fn on_tick(&mut self, report: &TickReport, world: &mut W);

    /// Whether the observer still has work to submit. An idle scheduler
    /// only ends a [`RunMode::UntilIdle`] run when this is `false`.
    fn has_pending_work(&self) -> bool {
        false
    }
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl<W: ?Sized> TickObserver<W> for NoOpObserver {
    fn on_tick(&mut self, _report: &TickReport, _world: &mut W) {}
}

/// Drive `scheduler` until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run<W: WorldAccess>(
    scheduler: &mut RegrowthScheduler,
    world: &mut W,
    hook: &mut dyn CompletionHook,
    operator: &Arc<OperatorState>,
    observer: &mut dyn TickObserver<W>,
    mode: RunMode,
) -> Result<RunResult, RunnerError> {
    let mut total_ticks: u64 = 0;
    let mut restored: u64 = 0;
    let mut skipped: u64 = 0;
    let mut failed: u64 = 0;
    let mut completed_events: u64 = 0;

    info!(
        ?mode,
        max_ticks = operator.max_ticks(),
        tick_interval_ms = operator.tick_interval_ms(),
        speed = scheduler.speed(),
        "Runner starting"
    );

    let end_reason = loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!("Runner paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!("Runner resumed");
        }

        // --- Check stop request (before tick) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            break RunEndReason::OperatorStop;
        }

        // --- Apply speed change ---
        if let Some(speed) = operator.take_speed_request() {
            scheduler.set_speed(speed);
        }

        // --- Execute tick ---
        let report = scheduler.tick(world, hook)?;
        total_ticks = total_ticks.saturating_add(1);
        restored = restored.saturating_add(u64::from(report.restored));
        skipped = skipped.saturating_add(u64::from(report.skipped));
        failed = failed.saturating_add(u64::from(report.failed));
        completed_events = completed_events
            .saturating_add(u64::try_from(report.completions.len()).unwrap_or(u64::MAX));

        // --- Notify observer ---
        observer.on_tick(&report, world);

        // --- Check idle ---
        if mode == RunMode::UntilIdle && scheduler.is_idle() && !observer.has_pending_work() {
            info!(tick = report.tick, "Scheduler idle");
            break RunEndReason::Idle;
        }

        // --- Check tick limit (after tick) ---
        if operator.tick_limit_reached(total_ticks) {
            info!(
                tick = report.tick,
                max_ticks = operator.max_ticks(),
                "Tick limit reached"
            );
            break RunEndReason::MaxTicksReached;
        }

        // --- Sleep for tick interval ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    };

    Ok(RunResult {
        end_reason,
        total_ticks,
        final_stats: scheduler.stats(),
        restored,
        skipped,
        failed,
        completed_events,
        started_at: operator.started_at(),
        ended_at: Utc::now(),
    })
}

/// Log the end of a run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_stats.tick,
        restored = result.restored,
        skipped = result.skipped,
        failed = result.failed,
        completed_events = result.completed_events,
        started_at = %result.started_at,
        elapsed_ms = result
            .ended_at
            .signed_duration_since(result.started_at)
            .num_milliseconds(),
        "Run ended"
    );

    let stats = &result.final_stats;
    if stats.active_events > 0 {
        warn!(
            active_events = stats.active_events,
            pending_cells = stats.pending_cells,
            queued_layers = stats.queued_layers,
            scheduled_tasks = stats.scheduled_tasks,
            "Run ended with restoration still in flight"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use regrowth_types::{
        CapturedCell, CellPos, Classification, DestructionEvent, Snapshot, WorldId,
    };

    use super::*;
    use crate::config::RegenerationConfig;
    use crate::host::{FeedbackError, NoOpHook, RestoreError};
    use crate::intake::IntakeHandle;

    #[derive(Default)]
    struct HoleWorld {
        filled: BTreeSet<CellPos>,
    }

    impl WorldAccess for HoleWorld {
        fn is_absent(&self, _world_id: &WorldId, pos: CellPos) -> bool {
            !self.filled.contains(&pos)
        }

        fn restore_cell(
            &mut self,
            _world_id: &WorldId,
            pos: CellPos,
            _snapshot: &Snapshot,
        ) -> Result<(), RestoreError> {
            self.filled.insert(pos);
            Ok(())
        }

        fn emit_feedback(
            &mut self,
            _world_id: &WorldId,
            _pos: CellPos,
        ) -> Result<(), FeedbackError> {
            Ok(())
        }
    }

    struct CountingObserver {
        ticks: u64,
        stop_after: Option<(u64, Arc<OperatorState>)>,
    }

    impl TickObserver<HoleWorld> for CountingObserver {
        fn on_tick(&mut self, _report: &TickReport, _world: &mut HoleWorld) {
            self.ticks = self.ticks.saturating_add(1);
            if let Some((limit, operator)) = &self.stop_after {
                if self.ticks >= *limit {
                    operator.request_stop();
                }
            }
        }
    }

    /// Sends one event through the funnel once the given tick has run.
    struct DelayedSubmitter {
        handle: IntakeHandle,
        at_tick: u64,
        event: Option<DestructionEvent>,
    }

    impl TickObserver<HoleWorld> for DelayedSubmitter {
        fn on_tick(&mut self, report: &TickReport, _world: &mut HoleWorld) {
            if report.tick < self.at_tick {
                return;
            }
            if let Some(event) = self.event.take() {
                self.handle.submit(event).unwrap();
            }
        }

        fn has_pending_work(&self) -> bool {
            self.event.is_some()
        }
    }

    fn scheduler() -> RegrowthScheduler {
        let config = RegenerationConfig {
            speed: 10,
            max_jitter_ticks: 0,
            ..RegenerationConfig::default()
        };
        RegrowthScheduler::with_seed(&config, 11).unwrap()
    }

    fn event() -> DestructionEvent {
        (0..3).fold(
            DestructionEvent::new(WorldId::new("overworld"), CellPos::new(0, 0, 0), 1),
            |event, y| {
                event.with_cell(CapturedCell::new(
                    CellPos::new(0, y, 0),
                    Snapshot::new("stone"),
                    Classification::Natural,
                ))
            },
        )
    }

    #[tokio::test]
    async fn runs_until_idle() {
        let mut scheduler = scheduler();
        scheduler.submit(event());
        let mut world = HoleWorld::default();
        let operator = Arc::new(OperatorState::new(0, 1_000));

        let result = run(
            &mut scheduler,
            &mut world,
            &mut NoOpHook,
            &operator,
            &mut NoOpObserver,
            RunMode::UntilIdle,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::Idle);
        assert_eq!(result.restored, 3);
        assert_eq!(result.completed_events, 1);
        assert_eq!(world.filled.len(), 3);
        assert_eq!(result.started_at, operator.started_at());
        assert!(result.ended_at >= result.started_at);
    }

    #[tokio::test]
    async fn event_sent_by_observer_on_last_tick_is_not_dropped() {
        let mut scheduler = scheduler();
        let mut observer = DelayedSubmitter {
            handle: scheduler.intake_handle(),
            at_tick: 5,
            event: Some(event()),
        };
        let mut world = HoleWorld::default();
        let operator = Arc::new(OperatorState::new(0, 1_000));

        let result = run(
            &mut scheduler,
            &mut world,
            &mut NoOpHook,
            &operator,
            &mut observer,
            RunMode::UntilIdle,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::Idle);
        assert!(result.total_ticks > 5);
        assert_eq!(result.completed_events, 1);
        assert_eq!(world.filled.len(), 3);
        assert_eq!(scheduler.shutdown().unprocessed_events, 0);
    }

    #[tokio::test]
    async fn tick_limit_ends_run() {
        let mut scheduler = scheduler();
        scheduler.submit(event());
        let operator = Arc::new(OperatorState::new(0, 2));

        let result = run(
            &mut scheduler,
            &mut HoleWorld::default(),
            &mut NoOpHook,
            &operator,
            &mut NoOpObserver,
            RunMode::UntilIdle,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 2);
        assert_eq!(result.final_stats.active_events, 1);
    }

    #[tokio::test]
    async fn operator_stop_ends_unbounded_run() {
        let mut scheduler = scheduler();
        let operator = Arc::new(OperatorState::new(1, 0));
        let mut observer = CountingObserver {
            ticks: 0,
            stop_after: Some((4, Arc::clone(&operator))),
        };

        let result = run(
            &mut scheduler,
            &mut HoleWorld::default(),
            &mut NoOpHook,
            &operator,
            &mut observer,
            RunMode::UntilStopped,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 4);
    }

    #[tokio::test]
    async fn speed_request_applies_before_tick() {
        let mut scheduler = scheduler();
        let operator = Arc::new(OperatorState::new(0, 1));
        operator.request_speed(0);

        run(
            &mut scheduler,
            &mut HoleWorld::default(),
            &mut NoOpHook,
            &operator,
            &mut NoOpObserver,
            RunMode::UntilStopped,
        )
        .await
        .unwrap();

        assert_eq!(scheduler.speed(), 0);
        assert!(!scheduler.submit(event()).is_accepted());
    }
}
