//! Update check scheduler.
//!
//! One worker task owns the timer, the jitter RNG and every status
//! mutation. The periodic timer and on-demand requests from the bus both
//! land in the same `select!`, so checks run strictly one at a time.
//!
//! ```text
//!  WaitingInitial ──timer/manual──► Checking ──always──► WaitingPeriodic
//!                                      ▲                       │
//!                                      └─────timer/manual──────┘
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use reqwest::Url;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use update1_common::{Status, UpdateError};

use crate::jitter::fuzz_duration;
use crate::sources::{SentinelMarker, StatusNotifier, VersionSource};
use crate::store::{Evaluation, StatusStore};

/// Requests waiting for the worker. One slot: a caller that finds it
/// taken blocks on send until the worker drains it.
const COMMAND_QUEUE_DEPTH: usize = 1;

/// Timing and source settings, fixed at startup
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_initial: Duration,
    pub interval_periodic: Duration,
    pub interval_fuzz: Duration,
    pub version_url: Url,
    /// Upper bound for each collaborator call within a check
    pub io_timeout: Duration,
}

/// Side-effecting collaborators of a check
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn VersionSource>,
    pub notifier: Arc<dyn StatusNotifier>,
    pub sentinel: Arc<dyn SentinelMarker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    WaitingInitial,
    Checking,
    WaitingPeriodic,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPhase::WaitingInitial => write!(f, "WAITING_INITIAL"),
            SchedulerPhase::Checking => write!(f, "CHECKING"),
            SchedulerPhase::WaitingPeriodic => write!(f, "WAITING_PERIODIC"),
        }
    }
}

enum Command {
    AttemptUpdate { accepted: oneshot::Sender<()> },
    ResetStatus { done: oneshot::Sender<()> },
}

/// What woke the worker up
enum Wake {
    Timer,
    Manual,
    Reset(oneshot::Sender<()>),
    HandlesDropped,
}

#[derive(Debug)]
enum CheckOutcome {
    NoUpdate,
    UpdateFound(Status),
}

/// Cloneable handle used by the control surface to reach the worker
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    completed: watch::Receiver<u64>,
}

impl SchedulerHandle {
    /// Queue an on-demand check.
    ///
    /// Returns once the worker has taken the request, not when the check
    /// finishes. While a check is running this waits for it to end.
    pub async fn attempt_update(&self) -> Result<(), UpdateError> {
        let (accepted, rx) = oneshot::channel();
        self.commands
            .send(Command::AttemptUpdate { accepted })
            .await
            .map_err(|_| UpdateError::WorkerStopped)?;
        rx.await.map_err(|_| UpdateError::WorkerStopped)
    }

    /// Reset the status to idle from inside the worker
    pub async fn reset_status(&self) -> Result<(), UpdateError> {
        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::ResetStatus { done })
            .await
            .map_err(|_| UpdateError::WorkerStopped)?;
        rx.await.map_err(|_| UpdateError::WorkerStopped)
    }

    /// Check rounds finished so far, failed ones included
    pub fn completed_checks(&self) -> u64 {
        *self.completed.borrow()
    }

    /// Wait until at least `n` check rounds have finished
    pub async fn wait_for_checks(&self, n: u64) -> Result<u64, UpdateError> {
        let mut rx = self.completed.clone();
        let count = rx
            .wait_for(|count| *count >= n)
            .await
            .map_err(|_| UpdateError::WorkerStopped)?;
        Ok(*count)
    }
}

/// The scheduler worker. Build with [`UpdateScheduler::new`], then
/// [`spawn`](UpdateScheduler::spawn) it.
pub struct UpdateScheduler {
    config: SchedulerConfig,
    store: StatusStore,
    deps: Collaborators,
    os_version: String,
    rng: StdRng,
    commands: mpsc::Receiver<Command>,
    completed: watch::Sender<u64>,
    phase: SchedulerPhase,
}

impl UpdateScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: StatusStore,
        deps: Collaborators,
        os_version: String,
        rng: StdRng,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (completed_tx, completed_rx) = watch::channel(0);

        let scheduler = Self {
            config,
            store,
            deps,
            os_version,
            rng,
            commands: rx,
            completed: completed_tx,
            phase: SchedulerPhase::WaitingInitial,
        };
        let handle = SchedulerHandle {
            commands: tx,
            completed: completed_rx,
        };

        (scheduler, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Worker loop. Never returns on its own.
    pub async fn run(mut self) {
        let initial = self.next_wait(self.config.interval_initial);
        info!(
            "Waiting {} before the initial update check",
            humantime::format_duration(initial)
        );

        let sleep = time::sleep(initial);
        tokio::pin!(sleep);
        let mut commands_open = true;

        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv(), if commands_open => match cmd {
                    Some(Command::AttemptUpdate { accepted }) => {
                        let _ = accepted.send(());
                        Wake::Manual
                    }
                    Some(Command::ResetStatus { done }) => Wake::Reset(done),
                    None => Wake::HandlesDropped,
                },
                () = &mut sleep => Wake::Timer,
            };

            match wake {
                Wake::Timer => self.round().await,
                Wake::Manual => {
                    info!("Update check requested");
                    self.round().await;
                    // A tick that came due before or during the requested
                    // check still gets its own round
                    if sleep.deadline() <= Instant::now() {
                        debug!("Timer came due around the requested check");
                        self.round().await;
                    }
                }
                Wake::Reset(done) => {
                    self.store.reset().await;
                    info!("The update status was reset");
                    let _ = done.send(());
                    continue;
                }
                Wake::HandlesDropped => {
                    warn!("Control surface gone, continuing on the periodic timer only");
                    commands_open = false;
                    continue;
                }
            }

            let wait = self.next_wait(self.config.interval_periodic);
            info!(
                "Waiting {} before next update check",
                humantime::format_duration(wait)
            );
            sleep.as_mut().reset(Instant::now() + wait);
        }
    }

    fn next_wait(&mut self, value: Duration) -> Duration {
        fuzz_duration(&mut self.rng, value, self.config.interval_fuzz)
    }

    fn set_phase(&mut self, phase: SchedulerPhase) {
        debug!("Scheduler phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// One check, with errors turned into log output
    async fn round(&mut self) {
        self.set_phase(SchedulerPhase::Checking);

        match self.check_for_update().await {
            Ok(CheckOutcome::NoUpdate) => info!("Didn't find a new version"),
            Ok(CheckOutcome::UpdateFound(status)) => {
                info!("New version {} announced", status.new_version)
            }
            Err(e) => error!("Error checking for update: {}", e),
        }

        self.completed.send_modify(|count| *count += 1);
        self.set_phase(SchedulerPhase::WaitingPeriodic);
    }

    async fn check_for_update(&self) -> Result<CheckOutcome, UpdateError> {
        let url = self.config.version_url.as_str();
        info!("Checking for new version at {}", url);

        let candidate = bounded(
            self.config.io_timeout,
            "version fetch",
            self.deps.source.fetch(url),
        )
        .await?;

        let checked_at = chrono::Utc::now().timestamp();
        let status = match self
            .store
            .evaluate(&candidate, &self.os_version, checked_at)
            .await
        {
            Evaluation::Unchanged(_) => return Ok(CheckOutcome::NoUpdate),
            Evaluation::Transitioned(status) => status,
        };

        info!("Updated status: {}", status);

        // The transition is committed; both side effects are attempted
        // regardless of each other and nothing is rolled back.
        let emitted = bounded(
            self.config.io_timeout,
            "status update emission",
            self.deps.notifier.emit(&status),
        )
        .await;
        let marked = bounded(
            self.config.io_timeout,
            "reboot sentinel",
            self.deps.sentinel.mark_reboot_required(),
        )
        .await;

        if let (Err(_), Err(e)) = (&emitted, &marked) {
            error!("Error marking reboot required: {}", e);
        }
        emitted.and(marked)?;

        Ok(CheckOutcome::UpdateFound(status))
    }
}

async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, UpdateError>
where
    F: Future<Output = Result<T, UpdateError>>,
{
    time::timeout(limit, fut)
        .await
        .map_err(|_| UpdateError::Timeout {
            operation,
            after: limit,
        })?
}
