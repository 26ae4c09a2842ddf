//! The restoration scheduler: intake, layered dispatch, delayed restore,
//! and completion tracking driven by one host tick at a time.
//!
//! Each call to [`RegrowthScheduler::tick`] runs four phases in order:
//!
//! 1. **Clock** -- advance the tick counter.
//! 2. **Intake** -- drain events submitted through [`IntakeHandle`]s,
//!    filter their cells against the pending set, bucket them into
//!    layers, and wake the dispatcher.
//! 3. **Dispatch** -- if the dispatcher's pacing deadline has passed, pop
//!    the lowest queued layer and schedule one delayed task per cell.
//! 4. **Fire** -- run every task whose deadline is due: restore the cell
//!    if it is still absent, clear its pending flag, resolve it against its
//!    event, and call the completion hook when the event's last cell
//!    resolves.
//!
//! The scheduler is single-threaded. Producers on other threads use an
//! [`IntakeHandle`]; everything else happens inside `tick`.

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use regrowth_types::{
    CellOutcome, CellPos, DestructionEvent, EventCompletion, EventId, Region, WorldId,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::{ClockError, TickClock};
use crate::config::{ConfigError, RegenerationConfig};
use crate::dispatcher::{Dispatcher, DispatcherState};
use crate::host::{CompletionHook, WorldAccess};
use crate::intake::{
    self, AcceptedEvent, DiscardReason, IntakeHandle, IntakeOutcome, PendingCells, QueuedEvent,
};
use crate::layers::{Layer, LayerQueue, TaskDescriptor};
use crate::pacing::PacingFunction;
use crate::timers::DeadlineQueue;
use crate::tracker::{CompletionTracker, EventRecord};

/// Errors that stop the scheduler from running a tick.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The tick counter could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The configuration was rejected at construction.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },
}

/// A cell waiting for its restore deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationTask {
    /// What to restore and where.
    pub descriptor: TaskDescriptor,
    /// Speed-scaled base delay that went into the deadline.
    pub base_delay: u64,
    /// Jitter drawn for this task.
    pub jitter: u64,
    /// Tick on which the task fires.
    pub deadline: u64,
}

/// A layer popped during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchedLayer {
    /// Elevation of the layer.
    pub elevation: i32,
    /// Number of tasks scheduled from it.
    pub tasks: usize,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that ran.
    pub tick: u64,
    /// Outcomes of events drained from the intake funnel.
    pub intake: Vec<IntakeOutcome>,
    /// The layer popped this tick, if any.
    pub dispatched: Option<DispatchedLayer>,
    /// Cells restored this tick.
    pub restored: u32,
    /// Cells skipped because they were already filled.
    pub skipped: u32,
    /// Cells whose restore failed.
    pub failed: u32,
    /// Events whose last cell resolved this tick.
    pub completions: Vec<EventCompletion>,
}

impl TickReport {
    const fn new(tick: u64) -> Self {
        Self {
            tick,
            intake: Vec::new(),
            dispatched: None,
            restored: 0,
            skipped: 0,
            failed: 0,
            completions: Vec::new(),
        }
    }

    fn record(&mut self, outcome: CellOutcome) {
        match outcome {
            CellOutcome::Restored => self.restored = self.restored.saturating_add(1),
            CellOutcome::Skipped => self.skipped = self.skipped.saturating_add(1),
            CellOutcome::Failed => self.failed = self.failed.saturating_add(1),
        }
    }

    /// Number of tasks that fired this tick.
    pub const fn fired(&self) -> u32 {
        self.restored
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }
}

/// Point-in-time view of the scheduler's queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Current tick.
    pub tick: u64,
    /// Current speed.
    pub speed: u8,
    /// Events submitted through the funnel and not yet taken in.
    pub queued_events: usize,
    /// Cells with a live task.
    pub pending_cells: usize,
    /// Layers waiting for dispatch.
    pub queued_layers: usize,
    /// Tasks inside those layers.
    pub queued_tasks: usize,
    /// Tasks waiting for their deadline.
    pub scheduled_tasks: usize,
    /// Events not yet complete.
    pub active_events: usize,
    /// Dispatcher phase.
    pub dispatcher: DispatcherState,
}

/// What was abandoned by [`RegrowthScheduler::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tick at shutdown.
    pub tick: u64,
    /// Submitted events never drained from the funnel.
    pub unprocessed_events: usize,
    /// Layers never dispatched.
    pub abandoned_layers: usize,
    /// Tasks cancelled before firing (queued and scheduled).
    pub cancelled_tasks: usize,
    /// Events whose completion hook will never run.
    pub abandoned_events: usize,
    /// Pending flags cleared.
    pub cleared_cells: usize,
}

/// Delayed, layered, bottom-up restoration scheduler.
#[derive(Debug)]
pub struct RegrowthScheduler {
    clock: TickClock,
    pacing: PacingFunction,
    hook_radius_per_intensity: u32,
    max_pending_cells: Option<usize>,
    pending: PendingCells,
    layers: LayerQueue,
    dispatcher: Dispatcher,
    timers: DeadlineQueue<RegenerationTask>,
    tracker: CompletionTracker,
    intake_handle: IntakeHandle,
    intake_rx: mpsc::UnboundedReceiver<QueuedEvent>,
    rng: SmallRng,
}

impl RegrowthScheduler {
    /// Create a scheduler. Jitter is seeded from `config.seed`, or from the
    /// OS when no seed is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if the configuration is invalid.
    pub fn new(config: &RegenerationConfig) -> Result<Self, SchedulerError> {
        let rng = config
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self::build(config, rng)
    }

    /// Create a scheduler with a fixed jitter seed, ignoring `config.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if the configuration is invalid.
    pub fn with_seed(config: &RegenerationConfig, seed: u64) -> Result<Self, SchedulerError> {
        Self::build(config, SmallRng::seed_from_u64(seed))
    }

    fn build(config: &RegenerationConfig, rng: SmallRng) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (intake_handle, intake_rx) = intake::funnel();
        let max_pending_cells = match config.max_pending_cells {
            0 => None,
            cap => Some(usize::try_from(cap).unwrap_or(usize::MAX)),
        };

        info!(
            speed = config.speed,
            layer_interval_ticks = config.layer_interval_ticks,
            max_pending_cells = config.max_pending_cells,
            "Regrowth scheduler created"
        );

        Ok(Self {
            clock: TickClock::new(),
            pacing: PacingFunction::from_config(config),
            hook_radius_per_intensity: config.hook_radius_per_intensity,
            max_pending_cells,
            pending: PendingCells::new(),
            layers: LayerQueue::new(),
            dispatcher: Dispatcher::new(u64::from(config.layer_interval_ticks)),
            timers: DeadlineQueue::new(),
            tracker: CompletionTracker::new(),
            intake_handle,
            intake_rx,
            rng,
        })
    }

    /// A handle for submitting events from other threads. Events sent
    /// through it are taken in at the start of the next tick.
    pub fn intake_handle(&self) -> IntakeHandle {
        self.intake_handle.clone()
    }

    /// Take in an event immediately, on the scheduler thread.
    pub fn submit(&mut self, event: DestructionEvent) -> IntakeOutcome {
        self.accept(EventId::new(), event)
    }

    fn accept(&mut self, event_id: EventId, event: DestructionEvent) -> IntakeOutcome {
        let now = self.clock.tick();
        let DestructionEvent {
            world_id,
            origin,
            intensity,
            cells,
        } = event;

        if self.pacing.is_disabled() {
            debug!(
                %event_id,
                %world_id,
                cells = cells.len(),
                "Regeneration disabled, event discarded"
            );
            return IntakeOutcome::Discarded {
                event_id,
                reason: DiscardReason::Disabled,
            };
        }

        let admission = intake::admit(&world_id, cells, &mut self.pending, self.max_pending_cells);
        if admission.over_cap > 0 {
            warn!(
                %event_id,
                dropped = admission.over_cap,
                pending = self.pending.len(),
                "Pending-cell cap reached, cells dropped"
            );
        }

        let accepted = u32::try_from(admission.accepted.len()).unwrap_or(u32::MAX);
        let (layers, min_elevation) =
            intake::group_into_layers(event_id, &world_id, admission.accepted);
        let Some(min_elevation) = min_elevation else {
            debug!(
                %event_id,
                %world_id,
                already_pending = admission.already_pending,
                over_cap = admission.over_cap,
                "No eligible cells, event discarded"
            );
            return IntakeOutcome::Discarded {
                event_id,
                reason: DiscardReason::NoEligibleCells,
            };
        };

        let layer_count = layers.len();
        self.tracker.register(EventRecord::new(
            event_id,
            world_id.clone(),
            origin,
            intensity,
            accepted,
            now,
        ));
        for layer in layers {
            self.layers.merge(layer);
        }
        self.dispatcher.wake(now);

        info!(
            tick = now,
            %event_id,
            %world_id,
            %origin,
            intensity,
            cells = accepted,
            layers = layer_count,
            min_elevation,
            "Event accepted"
        );

        IntakeOutcome::Accepted(AcceptedEvent {
            event_id,
            cells: accepted,
            layers: layer_count,
            min_elevation,
            already_pending: admission.already_pending,
            over_cap: admission.over_cap,
        })
    }

    /// Run one host tick.
    ///
    /// `world` is consulted and written for every task that fires; `hook`
    /// is called once per event whose last cell resolves.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Clock`] if the tick counter overflows.
    pub fn tick(
        &mut self,
        world: &mut dyn WorldAccess,
        hook: &mut dyn CompletionHook,
    ) -> Result<TickReport, SchedulerError> {
        let now = self.clock.advance()?;
        let mut report = TickReport::new(now);

        // --- Intake ---
        while let Ok(queued) = self.intake_rx.try_recv() {
            let outcome = self.accept(queued.event_id, queued.event);
            report.intake.push(outcome);
        }

        // --- Dispatch ---
        if let Some(layer) = self.dispatcher.poll(now, &mut self.layers) {
            report.dispatched = Some(DispatchedLayer {
                elevation: layer.elevation,
                tasks: layer.len(),
            });
            self.schedule_layer(now, layer);
        }

        // --- Fire ---
        for task in self.timers.drain_due(now) {
            let outcome = self.fire(&task, world);
            report.record(outcome);

            let Some(record) = self.tracker.resolve(task.descriptor.event_id, outcome) else {
                continue;
            };
            let completion = self.completion(record, now);
            match hook.on_event_complete(&completion) {
                Ok(()) => info!(
                    tick = now,
                    event_id = %completion.event_id,
                    cells = completion.total_cells(),
                    restored = completion.restored,
                    skipped = completion.skipped,
                    failed = completion.failed,
                    radius = completion.radius,
                    "Event restoration complete"
                ),
                Err(err) => warn!(
                    tick = now,
                    event_id = %completion.event_id,
                    error = %err,
                    "Completion hook failed"
                ),
            }
            report.completions.push(completion);
        }

        if report.fired() > 0 {
            debug!(
                tick = now,
                restored = report.restored,
                skipped = report.skipped,
                failed = report.failed,
                "Tasks fired"
            );
        }

        Ok(report)
    }

    fn schedule_layer(&mut self, now: u64, layer: Layer) {
        let elevation = layer.elevation;
        let tasks = layer.len();
        for descriptor in layer.tasks {
            let base_delay = self.pacing.scaled_base_delay(descriptor.classification);
            let jitter = self.pacing.draw_jitter(&mut self.rng);
            let delay = self
                .pacing
                .delay_ticks(descriptor.classification, descriptor.height, jitter);
            let deadline = self.clock.deadline_after(delay);
            self.timers.schedule(
                deadline,
                RegenerationTask {
                    descriptor,
                    base_delay,
                    jitter,
                    deadline,
                },
            );
        }
        debug!(
            tick = now,
            elevation,
            tasks,
            remaining_layers = self.layers.len(),
            "Layer dispatched"
        );
    }

    fn fire(&mut self, task: &RegenerationTask, world: &mut dyn WorldAccess) -> CellOutcome {
        let TaskDescriptor {
            event_id,
            world_id,
            pos,
            snapshot,
            ..
        } = &task.descriptor;

        let outcome = if world.is_absent(world_id, *pos) {
            match world.restore_cell(world_id, *pos, snapshot) {
                Ok(()) => {
                    if let Err(err) = world.emit_feedback(world_id, *pos) {
                        debug!(%event_id, %pos, error = %err, "Restore feedback failed");
                    }
                    CellOutcome::Restored
                }
                Err(err) => {
                    warn!(%event_id, %world_id, %pos, error = %err, "Cell restore failed");
                    CellOutcome::Failed
                }
            }
        } else {
            CellOutcome::Skipped
        };

        self.pending.remove(world_id, *pos);
        outcome
    }

    fn completion(&self, record: EventRecord, now: u64) -> EventCompletion {
        let radius = record
            .intensity
            .saturating_mul(self.hook_radius_per_intensity);
        EventCompletion {
            event_id: record.event_id,
            world_id: record.world_id,
            origin: record.origin,
            intensity: record.intensity,
            radius,
            region: Region::around(record.origin, radius),
            restored: record.restored,
            skipped: record.skipped,
            failed: record.failed,
            submitted_tick: record.submitted_tick,
            completed_tick: now,
            completed_at: Utc::now(),
        }
    }

    /// Change the regeneration speed (clamped to 0..=10).
    ///
    /// Layers not yet dispatched use the new speed; tasks already scheduled
    /// keep their deadlines. Speed 0 stops intake only: new events are
    /// discarded, while queued layers still dispatch at the slowest pacing
    /// and their events still complete and reach the hook.
    pub fn set_speed(&mut self, speed: u8) {
        let previous = self.pacing.speed();
        self.pacing.set_speed(speed);
        info!(
            tick = self.clock.tick(),
            previous,
            speed = self.pacing.speed(),
            "Regeneration speed changed"
        );
    }

    /// Current speed.
    pub const fn speed(&self) -> u8 {
        self.pacing.speed()
    }

    /// Current tick.
    pub const fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    /// Whether the cell has a live task.
    pub fn is_pending(&self, world_id: &WorldId, pos: CellPos) -> bool {
        self.pending.contains(world_id, pos)
    }

    /// Snapshot of queue sizes.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            tick: self.clock.tick(),
            speed: self.pacing.speed(),
            queued_events: self.intake_rx.len(),
            pending_cells: self.pending.len(),
            queued_layers: self.layers.len(),
            queued_tasks: self.layers.task_count(),
            scheduled_tasks: self.timers.len(),
            active_events: self.tracker.len(),
            dispatcher: self.dispatcher.state(),
        }
    }

    /// Whether nothing is waiting in the funnel, queued, scheduled, or
    /// awaiting completion.
    pub fn is_idle(&self) -> bool {
        self.intake_rx.is_empty()
            && self.layers.is_empty()
            && self.timers.is_empty()
            && self.tracker.is_empty()
    }

    /// Stop the scheduler, abandoning all outstanding work. No hooks run for
    /// abandoned events.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.intake_rx.close();
        let mut unprocessed_events: usize = 0;
        while self.intake_rx.try_recv().is_ok() {
            unprocessed_events = unprocessed_events.saturating_add(1);
        }

        let queued_tasks = self.layers.task_count();
        let report = ShutdownReport {
            tick: self.clock.tick(),
            unprocessed_events,
            abandoned_layers: self.layers.clear(),
            cancelled_tasks: queued_tasks.saturating_add(self.timers.clear()),
            abandoned_events: self.tracker.clear(),
            cleared_cells: self.pending.clear(),
        };
        self.dispatcher.reset();

        info!(
            tick = report.tick,
            unprocessed_events = report.unprocessed_events,
            abandoned_layers = report.abandoned_layers,
            cancelled_tasks = report.cancelled_tasks,
            abandoned_events = report.abandoned_events,
            "Regrowth scheduler shut down"
        );
        report
    }
}
