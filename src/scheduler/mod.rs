//! Timer-driven runner for periodic tasks.
//!
//! Two disciplines are supported:
//!
//! - **fixed delay**: the next run starts `period` after the previous run
//!   finished, so runs of one task never overlap
//! - **fixed rate**: a run starts every `period` no matter how long the
//!   previous one takes; runs may overlap unless the task is wrapped with
//!   [`exclusive`]
//!
//! Every task gets its own timer and its own [`TaskHandle`]. A failing or
//! panicking run is logged and the schedule carries on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;

/// Cancel handle of one scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    name: Arc<str>,
    token: CancellationToken,
}

impl TaskHandle {
    /// Task name, as used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop future runs. A run already in progress is not interrupted.
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(task = %self.name, "cancelling schedule");
        }
        self.token.cancel();
    }

    /// Whether the task has been cancelled, directly or by shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owner of all scheduled tasks.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use comdirect_rs::scheduler::Scheduler;
///
/// # async fn example() {
/// let mut scheduler = Scheduler::new();
/// let handle = scheduler.schedule_fixed_delay(
///     "heartbeat",
///     Duration::from_secs(60),
///     Duration::ZERO,
///     || async { Ok(()) },
/// );
///
/// handle.cancel();
/// scheduler.shutdown(Duration::from_secs(5)).await;
/// # }
/// ```
pub struct Scheduler {
    root: CancellationToken,
    loops: JoinSet<()>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a scheduler with its own root token.
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a scheduler whose tasks stop when `root` is cancelled.
    pub fn with_token(root: CancellationToken) -> Self {
        Self {
            root,
            loops: JoinSet::new(),
        }
    }

    /// The token every task's handle derives from.
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Number of schedules that have not finished yet.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns `true` if no schedule is running.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Run `task` at `now + initial_delay`, then `period` after each run
    /// completes.
    pub fn schedule_fixed_delay<F, Fut>(
        &mut self,
        name: &str,
        period: Duration,
        initial_delay: Duration,
        task: F,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.handle(name);
        let token = handle.token.clone();
        let name = handle.name.clone();
        info!(task = %name, period_secs = period.as_secs_f64(), "scheduling with fixed delay");

        self.loops.spawn(async move {
            let mut runs = JoinSet::new();
            let mut wait = initial_delay;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                runs.spawn(task());
                if let Some(outcome) = runs.join_next().await {
                    report(&name, outcome);
                }
                wait = period;
            }
            debug!(task = %name, "schedule stopped");
        });

        handle
    }

    /// Run `task` at `now + initial_delay` and then every `period`,
    /// independent of how long each run takes.
    pub fn schedule_fixed_rate<F, Fut>(
        &mut self,
        name: &str,
        period: Duration,
        initial_delay: Duration,
        task: F,
    ) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.handle(name);
        let token = handle.token.clone();
        let name = handle.name.clone();
        info!(task = %name, period_secs = period.as_secs_f64(), "scheduling at fixed rate");

        self.loops.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut runs = JoinSet::new();

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    Some(outcome) = runs.join_next(), if !runs.is_empty() => report(&name, outcome),
                    _ = ticker.tick() => {
                        runs.spawn(task());
                    }
                }
            }

            // runs already started are allowed to finish
            while let Some(outcome) = runs.join_next().await {
                report(&name, outcome);
            }
            debug!(task = %name, "schedule stopped");
        });

        handle
    }

    /// Stop every schedule and wait up to `grace` for runs in progress.
    ///
    /// Whatever is still running after `grace` is aborted. Returns `true`
    /// if everything finished within the grace period.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        self.root.cancel();

        let loops = &mut self.loops;
        let drained = tokio::time::timeout(grace, async {
            while loops.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                remaining = self.loops.len(),
                grace_secs = grace.as_secs_f64(),
                "grace period elapsed; aborting remaining tasks"
            );
            self.loops.shutdown().await;
        }
        drained
    }

    fn handle(&self, name: &str) -> TaskHandle {
        TaskHandle {
            name: Arc::from(name),
            token: self.root.child_token(),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("schedules", &self.loops.len())
            .field("cancelled", &self.root.is_cancelled())
            .finish()
    }
}

/// Wrap `task` so that at most one run of it is active at any time.
///
/// A run that starts while the previous one is still busy waits for it.
pub fn exclusive<F, Fut>(task: F) -> impl Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let lock = Arc::new(Mutex::new(()));
    let task = Arc::new(task);
    move || {
        let lock = lock.clone();
        let task = task.clone();
        Box::pin(async move {
            let _running = lock.lock().await;
            task().await
        })
    }
}

fn report(name: &str, outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => debug!(task = %name, "run finished"),
        Ok(Err(err)) => warn!(task = %name, error = %err, "run failed; schedule continues"),
        Err(err) if err.is_panic() => error!(task = %name, "run panicked; schedule continues"),
        Err(_) => debug!(task = %name, "run aborted"),
    }
}
