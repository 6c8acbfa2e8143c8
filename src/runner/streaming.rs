//! Streaming runner over a growable work queue.
//!
//! The runner never finishes on its own. When the queue runs dry and every slot has
//! settled it goes idle; appending to the queue revives it. A failing item does not stop
//! the runner: the failure is delivered on the current [`ErrorHandle`], together with the
//! handle for the next failure and a [`Terminator`].

use super::slots::Slots;
use super::{RunnerControl, RunnerSnapshot};
use crate::config::RunnerConfig;
use crate::source::{QueueFeed, WorkQueue, WorkSource};
use crate::utils::lock;
use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

type Outcome<E> = std::result::Result<(), StreamFailure<E>>;

/// One-shot notification of the next failure of a streaming runner.
///
/// Resolves to `Err(StreamFailure)` when a work item fails, or to `Ok(())` once the runner
/// has been terminated or has shut down. Each failure carries the handle for the one
/// after it, so a caller observes the whole lifetime of the runner by following the chain.
pub struct ErrorHandle<E> {
    rx: oneshot::Receiver<Outcome<E>>,
}

impl<E> Future for ErrorHandle<E> {
    type Output = Outcome<E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Sender gone without a failure: the runner stopped.
            Poll::Ready(Err(_)) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> fmt::Debug for ErrorHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandle").finish_non_exhaustive()
    }
}

/// Capability to stop a streaming runner for good.
///
/// Terminating stops new work from being started and resolves the outstanding
/// [`ErrorHandle`] with `Ok(())`. Items already in flight are left to settle; their
/// outcomes are discarded.
#[derive(Clone)]
pub struct Terminator {
    runner: Weak<dyn RunnerControl>,
}

impl Terminator {
    pub fn terminate(&self) {
        if let Some(runner) = self.runner.upgrade() {
            runner.terminate();
        }
    }
}

impl fmt::Debug for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminator")
            .field("live", &(self.runner.strong_count() > 0))
            .finish()
    }
}

/// Structured failure delivered on an [`ErrorHandle`].
#[derive(Debug, thiserror::Error)]
#[error("work item {index} failed: {error}")]
pub struct StreamFailure<E> {
    /// Start index of the failed item.
    pub index: usize,
    pub error: E,
    /// Resolves on the next failure (or on termination).
    pub next_error: ErrorHandle<E>,
    pub terminate: Terminator,
}

struct State<E> {
    running: bool,
    idle: bool,
    cancelled: bool,
    generation: u64,
    in_flight: usize,
    started: usize,
    failed: usize,
    /// Sender behind the handle the caller is currently waiting on.
    current: Option<oneshot::Sender<Outcome<E>>>,
    /// Receiving end of `current`, until `run()` hands it out.
    first: Option<ErrorHandle<E>>,
}

struct Shared<E> {
    config: RunnerConfig,
    state: Mutex<State<E>>,
    signal: Notify,
    this: Weak<Shared<E>>,
}

impl<E> Shared<E>
where
    E: Send + 'static,
{
    fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }

    fn terminator(&self) -> Terminator {
        let runner: Weak<dyn RunnerControl> = self.this.clone();
        Terminator { runner }
    }

    fn record<T>(&self, slots: &Slots<T, E>)
    where
        T: Send + 'static,
    {
        let mut st = lock(&self.state);
        st.in_flight = slots.len();
        st.started = slots.started();
    }

    /// Go idle if the race armed at `token` is still the active one and nothing is queued.
    ///
    /// Returns false when a restart superseded that race or work arrived meanwhile; the
    /// caller then re-runs the scheduling loop instead of waiting. The driver loop is
    /// sequential, so this is the only point where a superseded race can be observed.
    fn try_park<T>(&self, token: u64, feed: &QueueFeed<T, E>) -> bool {
        let mut st = lock(&self.state);
        if st.generation != token {
            debug!(
                runner = %self.config.label,
                token,
                generation = st.generation,
                "discarding superseded race"
            );
            return false;
        }
        if !feed.is_empty() {
            return false;
        }
        if !st.idle {
            st.idle = true;
            debug!(runner = %self.config.label, "queue drained, runner idle");
        }
        true
    }

    fn dispatch_failure(&self, index: usize, error: E) {
        let mut st = lock(&self.state);
        st.failed += 1;
        let Some(current) = st.current.take() else {
            debug!(runner = %self.config.label, index, "failure after termination discarded");
            return;
        };
        let (tx, rx) = oneshot::channel();
        st.current = Some(tx);
        drop(st);

        let failure = StreamFailure {
            index,
            error,
            next_error: ErrorHandle { rx },
            terminate: self.terminator(),
        };
        if current.send(Err(failure)).is_err() {
            warn!(
                runner = %self.config.label,
                index,
                "work item failed with nobody awaiting the error handle"
            );
        } else {
            debug!(runner = %self.config.label, index, "work item failure dispatched");
        }
    }

    fn shutdown(&self) {
        let mut st = lock(&self.state);
        st.idle = true;
        st.in_flight = 0;
        // Dropping the sender resolves the outstanding handle with `Ok(())`.
        st.current.take();
        info!(
            runner = %self.config.label,
            started = st.started,
            failed = st.failed,
            cancelled = st.cancelled,
            "streaming runner stopped"
        );
    }
}

impl<E> RunnerControl for Shared<E>
where
    E: Send + 'static,
{
    fn restart(&self) {
        let mut st = lock(&self.state);
        if st.cancelled || !st.running {
            return;
        }
        if st.idle {
            st.idle = false;
            st.generation += 1;
            debug!(
                runner = %self.config.label,
                generation = st.generation,
                "reviving idle runner"
            );
        }
        drop(st);
        self.signal.notify_one();
    }

    fn wake(&self) {
        self.signal.notify_one();
    }

    fn terminate(&self) {
        let mut st = lock(&self.state);
        if st.cancelled {
            return;
        }
        st.cancelled = true;
        let current = st.current.take();
        drop(st);

        if let Some(tx) = current {
            let _ = tx.send(Ok(()));
        }
        info!(runner = %self.config.label, "streaming runner terminated");
        self.signal.notify_one();
    }
}

enum Wakeup<T, E> {
    Settled(Option<(usize, std::result::Result<T, E>)>),
    Poked,
}

async fn drive<T, E>(shared: Arc<Shared<E>>, mut feed: QueueFeed<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let label = shared.config.label.clone();
    let mut slots: Slots<T, E> = Slots::new(shared.config.capacity);
    let mut token = shared.generation();

    loop {
        if !shared.is_cancelled() {
            let started = slots.fill(&mut feed);
            if started > 0 {
                token = shared.generation();
                debug!(
                    runner = %label,
                    started,
                    in_flight = slots.len(),
                    generation = token,
                    "race armed"
                );
            }
        }
        shared.record(&slots);

        if slots.is_empty() {
            if shared.is_cancelled() || (feed.is_orphaned() && feed.is_empty()) {
                break;
            }
            if !shared.try_park(token, &feed) {
                token = shared.generation();
                continue;
            }
            shared.signal.notified().await;
            continue;
        }

        let wakeup = tokio::select! {
            settled = slots.race() => Wakeup::Settled(settled),
            _ = shared.signal.notified() => Wakeup::Poked,
        };

        match wakeup {
            Wakeup::Settled(Some((index, Ok(_)))) => {
                debug!(runner = %label, index, "work item settled");
            }
            Wakeup::Settled(Some((index, Err(error)))) => {
                shared.dispatch_failure(index, error);
            }
            Wakeup::Settled(None) => {}
            // A restart landed while racing; loop to top up free slots.
            Wakeup::Poked => {}
        }
    }

    shared.shutdown();
}

/// Runs work items from a [`WorkQueue`] with at most `capacity` in flight, indefinitely.
///
/// The driver is spawned on the ambient tokio runtime by [`run`](Self::run).
pub struct StreamingRunner<T, E> {
    shared: Arc<Shared<E>>,
    queue: WorkQueue<T, E>,
}

impl<T, E> StreamingRunner<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(capacity: usize, queue: WorkQueue<T, E>) -> Result<Self> {
        Self::with_config(RunnerConfig::new(capacity), queue)
    }

    /// Create a runner and attach `queue` to it.
    ///
    /// Fails if the config is invalid or the queue already feeds another live runner.
    pub fn with_config(config: RunnerConfig, queue: WorkQueue<T, E>) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = oneshot::channel();
        let shared = Arc::new_cyclic(|this| Shared {
            config,
            state: Mutex::new(State {
                running: false,
                idle: false,
                cancelled: false,
                generation: 0,
                in_flight: 0,
                started: 0,
                failed: 0,
                current: Some(tx),
                first: Some(ErrorHandle { rx }),
            }),
            signal: Notify::new(),
            this: this.clone(),
        });
        let weak = Arc::downgrade(&shared);
        let control: Weak<dyn RunnerControl> = weak;
        queue.attach(control)?;
        Ok(Self { shared, queue })
    }

    /// Start the runner.
    ///
    /// The first call spawns the driver and returns the first [`ErrorHandle`]. Later calls
    /// only restart an idle runner and return `None`. Must be called from within a tokio
    /// runtime.
    pub fn run(&self) -> Result<Option<ErrorHandle<E>>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "streaming runner must be started inside a tokio runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("streaming_runner"),
            )
        })?;

        let mut st = lock(&self.shared.state);
        if st.running {
            drop(st);
            self.shared.restart();
            return Ok(None);
        }
        st.running = true;
        st.generation += 1;
        let first = st.first.take();
        drop(st);

        info!(
            runner = %self.shared.config.label,
            capacity = self.shared.config.capacity,
            queued = self.queue.len(),
            "streaming runner started"
        );
        runtime.spawn(drive(Arc::clone(&self.shared), self.queue.feed()));
        Ok(first)
    }

    /// Revive the runner if it is idle. No-op while busy, cancelled, or not yet run.
    pub fn restart(&self) {
        self.shared.restart();
    }

    pub fn queue(&self) -> &WorkQueue<T, E> {
        &self.queue
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.shared.config
    }

    pub fn terminator(&self) -> Terminator {
        self.shared.terminator()
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        let pending = self.queue.len();
        let st = lock(&self.shared.state);
        RunnerSnapshot {
            capacity: self.shared.config.capacity,
            in_flight: st.in_flight,
            pending,
            started: st.started,
            failed: st.failed,
            idle: st.idle,
            cancelled: st.cancelled,
            generation: st.generation,
        }
    }
}

/// Attach `queue` to a new runner, start it, and return its first [`ErrorHandle`].
pub fn directly_streaming<T, E>(
    capacity: usize,
    queue: WorkQueue<T, E>,
) -> Result<ErrorHandle<E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let runner = StreamingRunner::new(capacity, queue)?;
    runner.run()?.ok_or_else(|| {
        Error::runtime_with_context(
            "fresh runner did not hand out its error handle",
            ErrorContext::new().with_source("streaming_runner"),
        )
    })
}
