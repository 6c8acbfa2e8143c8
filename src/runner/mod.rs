//! 并发执行模块：在固定并发上限内调度异步工作项。
//!
//! # Concurrency Runners
//!
//! Both runners keep at most `capacity` work items in flight, start a replacement as soon
//! as any in-flight item settles, and index outcomes by **start order**, never by
//! completion order.
//!
//! | Runner | Source | Outcome |
//! |--------|--------|---------|
//! | [`Directly`] | [`FixedList`](crate::FixedList) | One `Result<Vec<T>, E>`; the first failure is fatal |
//! | [`StreamingRunner`] | [`WorkQueue`](crate::WorkQueue) | Never finishes on its own; failures arrive on a chain of [`ErrorHandle`]s |
//!
//! ## Batch
//!
//! ```rust
//! use directly::{directly, work_item, WorkItem};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> directly::Result<()> {
//! let items: Vec<WorkItem<u32, String>> = (0..10)
//!     .map(|i| work_item(move || async move { Ok(i * 2) }))
//!     .collect();
//!
//! let doubled = directly(3, items)?.await.unwrap();
//! assert_eq!(doubled, (0..10).map(|i| i * 2).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! ```rust
//! use directly::{work_item, StreamingRunner, WorkQueue};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> directly::Result<()> {
//! let queue: WorkQueue<(), String> = WorkQueue::new();
//! let runner = StreamingRunner::new(2, queue.clone())?;
//! let errors = runner.run()?.expect("first run hands out the error handle");
//!
//! queue.push(work_item(|| async { Err("boom".to_string()) }));
//!
//! let failure = errors.await.unwrap_err();
//! assert_eq!(failure.error, "boom");
//! failure.terminate.terminate();
//! assert!(failure.next_error.await.is_ok());
//! # Ok(())
//! # }
//! ```

mod batch;
mod slots;
mod streaming;

pub use batch::{directly, Directly};
pub use streaming::{directly_streaming, ErrorHandle, StreamFailure, StreamingRunner, Terminator};

/// Entry points a work queue (or a terminate capability) uses to reach its runner.
///
/// Holders keep only a `Weak` reference; the runner's lifetime is never extended by them.
pub(crate) trait RunnerControl: Send + Sync {
    /// Revive an idle runner, or let a busy one pick up newly queued work.
    fn restart(&self);
    /// Ask the driver to re-check its state without reviving it.
    fn wake(&self);
    /// Stop starting new work for good.
    fn terminate(&self);
}

/// A point-in-time view of a streaming runner (facts only).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerSnapshot {
    pub capacity: usize,
    /// Items currently racing.
    pub in_flight: usize,
    /// Items queued but not yet started.
    pub pending: usize,
    /// Items started since the runner was created.
    pub started: usize,
    /// Items whose outcome was a failure.
    pub failed: usize,
    pub idle: bool,
    pub cancelled: bool,
    /// Race generation; bumped every time a restart supersedes the active race.
    pub generation: u64,
}
