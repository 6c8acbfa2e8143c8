//! Growable work queue for the streaming runner.

use super::{WorkItem, WorkSource};
use crate::runner::RunnerControl;
use crate::utils::lock;
use crate::{Error, ErrorContext, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

pub(crate) struct QueueShared<T, E> {
    items: Mutex<VecDeque<WorkItem<T, E>>>,
    /// Non-owning link to the runner this queue feeds.
    runner: Mutex<Option<Weak<dyn RunnerControl>>>,
    /// Number of live user-facing `WorkQueue` handles.
    handles: AtomicUsize,
}

impl<T, E> QueueShared<T, E> {
    fn runner(&self) -> Option<Arc<dyn RunnerControl>> {
        lock(&self.runner).as_ref().and_then(Weak::upgrade)
    }
}

/// Growable FIFO of work items feeding a [`StreamingRunner`](crate::StreamingRunner).
///
/// Cloning yields another handle to the same queue. Every `push`/`append` asks the
/// attached runner to restart, which is a no-op while it is already busy.
pub struct WorkQueue<T, E> {
    shared: Arc<QueueShared<T, E>>,
}

impl<T, E> WorkQueue<T, E> {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Create a queue holding `items` up front.
    pub fn with_items(items: Vec<WorkItem<T, E>>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                items: Mutex::new(items.into()),
                runner: Mutex::new(None),
                handles: AtomicUsize::new(1),
            }),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, item: WorkItem<T, E>) {
        self.append(std::iter::once(item));
    }

    /// Append items to the tail, then ask the attached runner to restart.
    pub fn append<I>(&self, items: I)
    where
        I: IntoIterator<Item = WorkItem<T, E>>,
    {
        let (added, queued) = {
            let mut queue = lock(&self.shared.items);
            let before = queue.len();
            queue.extend(items);
            (queue.len() - before, queue.len())
        };
        debug!(added, queued, "work queue appended");

        if let Some(runner) = self.shared.runner() {
            runner.restart();
        }
    }

    /// Link this queue to the runner it feeds.
    ///
    /// A queue feeds at most one live runner at a time.
    pub(crate) fn attach(&self, runner: Weak<dyn RunnerControl>) -> Result<()> {
        let mut slot = lock(&self.shared.runner);
        if slot.as_ref().and_then(Weak::upgrade).is_some() {
            return Err(Error::validation_with_context(
                "work queue is already attached to a runner",
                ErrorContext::new().with_source("work_queue"),
            ));
        }
        *slot = Some(runner);
        Ok(())
    }

    pub(crate) fn feed(&self) -> QueueFeed<T, E> {
        QueueFeed {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for WorkQueue<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for WorkQueue<T, E> {
    fn clone(&self) -> Self {
        self.shared.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Drop for WorkQueue<T, E> {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Nobody can push any more; let an idle runner notice and shut down.
            if let Some(runner) = self.shared.runner() {
                runner.wake();
            }
        }
    }
}

impl<T, E> WorkSource<T, E> for WorkQueue<T, E> {
    fn len(&self) -> usize {
        WorkQueue::len(self)
    }

    fn take_next(&mut self) -> Option<WorkItem<T, E>> {
        lock(&self.shared.items).pop_front()
    }
}

/// Runner-side view of a queue. Does not count as a user handle.
pub(crate) struct QueueFeed<T, E> {
    shared: Arc<QueueShared<T, E>>,
}

impl<T, E> QueueFeed<T, E> {
    /// True once every user-facing handle is gone, so the queue can no longer grow.
    pub(crate) fn is_orphaned(&self) -> bool {
        self.shared.handles.load(Ordering::Acquire) == 0
    }
}

impl<T, E> WorkSource<T, E> for QueueFeed<T, E> {
    fn len(&self) -> usize {
        lock(&self.shared.items).len()
    }

    fn take_next(&mut self) -> Option<WorkItem<T, E>> {
        lock(&self.shared.items).pop_front()
    }
}
