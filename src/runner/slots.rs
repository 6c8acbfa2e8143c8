//! In-flight slot set shared by both runners.

use crate::source::{WorkItem, WorkSource};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};

/// Outcome of one work item, tagged with its start index.
pub(crate) type Settled<T, E> = (usize, std::result::Result<T, E>);

/// Bounded set of racing work items.
pub(crate) struct Slots<T, E> {
    capacity: usize,
    started: usize,
    in_flight: FuturesUnordered<BoxFuture<'static, Settled<T, E>>>,
}

impl<T, E> Slots<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            started: 0,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.in_flight.len() >= self.capacity
    }

    /// Number of items started so far; also the index the next item will get.
    pub(crate) fn started(&self) -> usize {
        self.started
    }

    /// Invoke `item` and add its pending result to the race. Returns its start index.
    pub(crate) fn start(&mut self, item: WorkItem<T, E>) -> usize {
        let index = self.started;
        self.started += 1;
        let pending = item();
        self.in_flight
            .push(async move { (index, pending.await) }.boxed());
        index
    }

    /// Start items from `source` until every slot is taken or the source is drained.
    pub(crate) fn fill<S>(&mut self, source: &mut S) -> usize
    where
        S: WorkSource<T, E> + ?Sized,
    {
        let mut started = 0;
        while !self.is_full() {
            let Some(item) = source.take_next() else {
                break;
            };
            self.start(item);
            started += 1;
        }
        started
    }

    /// Wait for the first in-flight item to settle and retire it.
    ///
    /// Resolves to `None` immediately when nothing is in flight.
    pub(crate) async fn race(&mut self) -> Option<Settled<T, E>> {
        self.in_flight.next().await
    }
}
