//! TargetMonitor - watches a single target and recovers it
//!
//! Each target gets its own monitor actor ticking at the target's interval.
//!
//! ## Tick State Machine
//!
//! ```text
//! Idle → Probing ─┬─ Running                     → Healthy      → Idle
//!                 ├─ unhealthy, inside debounce  → DebounceSkip → Idle
//!                 └─ unhealthy, outside debounce → Recovering   → record attempt → Idle
//! ```
//!
//! A busy flag guards the whole tick: a tick that fires while the previous
//! one is still probing or recovering is skipped, never queued.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → spawn tick task → StatusProbe → (native restart | BoundedExecutor) → LastActionStore
//!     ↑
//!     └─── Commands (CheckNow, Shutdown)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::Target;
use crate::context::MonitorContext;
use crate::error::{GuardError, GuardResult};
use crate::probes::native::restart_service;
use crate::probes::{Recovery, StatusProbe};

use super::messages::{MonitorCommand, MonitorState, RecoveryAction, TickOutcome};

/// How long shutdown waits for an in-flight tick
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Whether a recovery at `now` would come too soon after one at `last_action`
pub fn within_debounce(last_action: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match TimeDelta::from_std(window) {
        Ok(window) => now.signed_duration_since(last_action) < window,
        // a window too large to represent never expires
        Err(_) => true,
    }
}

/// Tick logic for one target
///
/// Shared between the actor loop and its tick tasks.
pub struct TargetMonitor {
    target: Target,
    probe: StatusProbe,
    context: MonitorContext,
    busy: AtomicBool,
    state: AtomicU8,
}

impl TargetMonitor {
    /// Set up a monitor for `target`
    ///
    /// Fails with `GuardError::Configuration` when the target's probe cannot
    /// be configured.
    pub fn new(target: Target, context: MonitorContext) -> GuardResult<Self> {
        let probe = StatusProbe::for_target(&target, &context)?;

        Ok(Self {
            target,
            probe,
            context,
            busy: AtomicBool::new(false),
            state: AtomicU8::new(MonitorState::Idle as u8),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn probe(&self) -> &StatusProbe {
        &self.probe
    }

    pub fn state(&self) -> MonitorState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_state(&self, state: MonitorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as if the clock read `now` when it started
    #[instrument(skip(self, now), fields(target = %self.target.name))]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(_guard) = BusyGuard::acquire(self) else {
            trace!("previous tick still running, skipping");
            return TickOutcome::Busy;
        };

        self.set_state(MonitorState::Probing);
        let outcome = self.probe.probe().await;

        if outcome.health.is_running() {
            trace!("target is running");
            return TickOutcome::Healthy;
        }

        if let Some(last_action) = self.context.store.get(&self.target.name)
            && within_debounce(last_action, now, self.target.debounce)
        {
            debug!(
                "target is {:?}, but the last recovery was at {last_action}, skipping",
                outcome.health
            );
            return TickOutcome::DebounceSkip { last_action };
        }

        self.set_state(MonitorState::Recovering);
        match &outcome.rescue_cmd {
            Some(rescue_cmd) => info!(
                "{} is {:?}, attempting recovery with {}",
                self.target.name,
                outcome.health,
                rescue_cmd.display()
            ),
            None => info!(
                "{} is {:?}, attempting recovery",
                self.target.name, outcome.health
            ),
        }

        let started = Instant::now();
        let (action, result) = self.recover().await;

        // failed attempts count too, so a broken rescue command is not hammered
        let finished = now + TimeDelta::from_std(started.elapsed()).unwrap_or_default();
        self.context.store.upsert(&self.target.name, finished);

        match &result {
            Ok(()) => info!("recovery of {} completed ({action:?})", self.target.name),
            Err(e) => error!("recovery of {} failed ({action:?}): {e}", self.target.name),
        }

        TickOutcome::Recovered {
            action,
            succeeded: result.is_ok(),
        }
    }

    async fn recover(&self) -> (RecoveryAction, GuardResult<()>) {
        match self.probe.recovery() {
            Recovery::NativeRestart(probe) => {
                let result =
                    restart_service(probe.manager(), probe.service(), self.context.service_wait)
                        .await;
                (RecoveryAction::NativeRestart, result)
            }
            Recovery::RescueCommand(relative) => {
                let command = self.context.base_dir.join(relative);

                if !tokio::fs::metadata(&command)
                    .await
                    .is_ok_and(|meta| meta.is_file())
                {
                    warn!("rescue command {} does not exist", command.display());
                    return (
                        RecoveryAction::MissingRescueCommand,
                        Err(GuardError::RecoveryExecution(format!(
                            "rescue command {} does not exist",
                            command.display()
                        ))),
                    );
                }

                (RecoveryAction::RescueCommand, self.run_rescue(&command).await)
            }
        }
    }

    async fn run_rescue(&self, command: &Path) -> GuardResult<()> {
        let work_dir = command.parent().unwrap_or(self.context.base_dir.as_path());

        info!("running rescue command {}", command.display());
        let outcome = self
            .context
            .executor
            .run(command, work_dir, &[], Some(self.context.rescue_timeout))
            .await?;
        debug!(output = %outcome.output, "rescue command finished with {:?}", outcome.exit_code);

        if outcome.succeeded() {
            return Ok(());
        }

        if outcome.timed_out {
            return Err(GuardError::RecoveryExecution(format!(
                "{} timed out: {}",
                command.display(),
                outcome.output
            )));
        }

        Err(GuardError::RecoveryExecution(format!(
            "{} exited with {:?}",
            command.display(),
            outcome.exit_code
        )))
    }
}

impl std::fmt::Debug for TargetMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetMonitor")
            .field("target", &self.target)
            .field("probe", &self.probe)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Holds the busy flag for the duration of a tick
struct BusyGuard<'a> {
    monitor: &'a TargetMonitor,
}

impl<'a> BusyGuard<'a> {
    fn acquire(monitor: &'a TargetMonitor) -> Option<Self> {
        monitor
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { monitor })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.monitor.set_state(MonitorState::Idle);
        self.monitor.busy.store(false, Ordering::Release);
    }
}

/// Actor driving a `TargetMonitor` from its interval timer
pub struct MonitorActor {
    monitor: Arc<TargetMonitor>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<MonitorCommand>,

    /// How long shutdown waits for an in-flight tick
    shutdown_grace: Duration,
}

impl MonitorActor {
    pub fn new(
        monitor: Arc<TargetMonitor>,
        command_rx: mpsc::Receiver<MonitorCommand>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            monitor,
            command_rx,
            shutdown_grace,
        }
    }

    /// Run the actor's main loop
    ///
    /// Ticks run on their own tasks so a slow check never blocks commands.
    /// The loop runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed (every handle was dropped)
    ///
    /// Before returning it waits up to the shutdown grace period for the
    /// timer tick and any forced ticks still in progress.
    #[instrument(skip(self), fields(target = %self.monitor.target().name))]
    pub async fn run(mut self) {
        debug!(
            "starting target monitor with interval {:?}",
            self.monitor.target().interval
        );

        let mut ticker = interval(self.monitor.target().interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<JoinHandle<TickOutcome>> = None;
        let mut forced: Vec<JoinHandle<()>> = vec![];

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
                        trace!("previous tick still running, skipping");
                        continue;
                    }

                    if let Some(task) = in_flight.take() {
                        report(task.await);
                    }

                    let monitor = self.monitor.clone();
                    in_flight = Some(tokio::spawn(async move { monitor.tick().await }));
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::CheckNow { respond_to }) => {
                            debug!("received CheckNow command");
                            forced.retain(|task| !task.is_finished());

                            let monitor = self.monitor.clone();
                            forced.push(tokio::spawn(async move {
                                let _ = respond_to.send(monitor.tick().await);
                            }));
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        forced.retain(|task| !task.is_finished());
        if in_flight.as_ref().is_some_and(|task| !task.is_finished()) || !forced.is_empty() {
            debug!("waiting for ticks in progress");
        }

        let pending = async {
            if let Some(task) = in_flight {
                report(task.await);
            }

            for result in join_all(forced).await {
                if let Err(e) = result {
                    error!("forced tick failed: {e}");
                }
            }
        };

        if tokio::time::timeout(self.shutdown_grace, pending).await.is_err() {
            warn!(
                "ticks did not finish within {:?}, leaving them behind",
                self.shutdown_grace
            );
        }

        debug!("target monitor stopped");
    }
}

fn report(result: std::result::Result<TickOutcome, JoinError>) {
    match result {
        Ok(outcome) => trace!("tick finished: {outcome:?}"),
        Err(e) => error!("tick failed: {e}"),
    }
}

/// Handle for controlling a monitor actor
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    monitor: Arc<TargetMonitor>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Spawn a new monitor actor
    pub fn spawn(monitor: TargetMonitor) -> Self {
        Self::spawn_with_grace(monitor, SHUTDOWN_GRACE)
    }

    /// Spawn a monitor actor that waits at most `shutdown_grace` for an in-flight tick on shutdown
    pub fn spawn_with_grace(monitor: TargetMonitor, shutdown_grace: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let monitor = Arc::new(monitor);

        let actor = MonitorActor::new(monitor.clone(), cmd_rx, shutdown_grace);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            monitor,
            task,
        }
    }

    /// Trigger an immediate tick and wait for its outcome
    pub async fn check_now(&self) -> Result<TickOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::CheckNow { respond_to: tx })
            .await
            .context("failed to send CheckNow command")?;

        rx.await.context("failed to receive tick outcome")
    }

    /// Stop the timer and wait for the actor to finish
    pub async fn shutdown(self) {
        let name = self.target_name().to_string();
        let _ = self.sender.send(MonitorCommand::Shutdown).await;

        if let Err(e) = self.task.await {
            error!("monitor for {name} ended abnormally: {e}");
        }
    }

    pub fn target_name(&self) -> &str {
        &self.monitor.target().name
    }

    pub fn monitor(&self) -> &TargetMonitor {
        &self.monitor
    }
}
