//! 工作来源模块：待执行的异步工作项的有序集合。
//!
//! # Work Sources
//!
//! A work source is an ordered collection of pending [`WorkItem`]s that a runner drains
//! strictly from the front.
//!
//! | Source | Mode | Description |
//! |--------|------|-------------|
//! | [`FixedList`] | batch | Passive list whose length is fixed once handed to the runner |
//! | [`WorkQueue`] | streaming | Growable queue; appending wakes the attached runner |
//!
//! ```rust
//! use directly::{work_item, FixedList, WorkItem, WorkSource};
//!
//! let items: Vec<WorkItem<u32, String>> = vec![
//!     work_item(|| async { Ok(1) }),
//!     work_item(|| async { Ok(2) }),
//! ];
//! let mut list = FixedList::new(items);
//! assert_eq!(list.len(), 2);
//! assert!(list.take_next().is_some());
//! ```

mod queue;

pub use queue::WorkQueue;
pub(crate) use queue::QueueFeed;

use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::future::Future;

/// A zero-argument unit of asynchronous work.
///
/// Calling the closure starts the work; the returned future yields its outcome.
pub type WorkItem<T, E> =
    Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<T, E>> + Send + 'static>;

/// Box a closure returning a future into a [`WorkItem`].
pub fn work_item<T, E, F, Fut>(f: F) -> WorkItem<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: 'static,
    E: 'static,
{
    Box::new(move || f().boxed())
}

/// Ordered collection of pending work items.
pub trait WorkSource<T, E> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the front item, or `None` when the source is drained.
    fn take_next(&mut self) -> Option<WorkItem<T, E>>;
}

/// Fixed list of work items used by the batch runner.
pub struct FixedList<T, E> {
    items: VecDeque<WorkItem<T, E>>,
}

impl<T, E> FixedList<T, E> {
    pub fn new(items: Vec<WorkItem<T, E>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub(crate) fn into_items(self) -> Vec<WorkItem<T, E>> {
        self.items.into()
    }
}

impl<T, E> From<Vec<WorkItem<T, E>>> for FixedList<T, E> {
    fn from(items: Vec<WorkItem<T, E>>) -> Self {
        Self::new(items)
    }
}

impl<T, E> WorkSource<T, E> for FixedList<T, E> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn take_next(&mut self) -> Option<WorkItem<T, E>> {
        self.items.pop_front()
    }
}
