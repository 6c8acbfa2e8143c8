//! # directly
//!
//! 有界并发执行器：在固定并发上限内运行异步工作项，支持批处理与流式两种模式。
//!
//! Bounded-concurrency runner for asynchronous work items.
//!
//! ## Overview
//!
//! Given a source of zero-argument work items and a capacity `N`, a runner keeps at most
//! `N` items in flight, starts a replacement the moment any of them settles, and reports
//! results by **start order** rather than completion order.
//!
//! ## Modes
//!
//! - **Batch**: a fixed list of items produces one terminal result, `Ok(Vec<T>)` in
//!   original order or the first `Err(E)`.
//! - **Streaming**: a growable [`WorkQueue`] feeds a runner that never finishes on its
//!   own. It idles when drained, revives when items are appended, and reports each
//!   failure on a chain of [`ErrorHandle`]s instead of stopping.
//!
//! ## Quick Start
//!
//! ```rust
//! use directly::{directly, work_item, WorkItem};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> directly::Result<()> {
//! let urls = ["a", "b", "c", "d"];
//! let items: Vec<WorkItem<usize, String>> = urls
//!     .iter()
//!     .map(|url| {
//!         let url = url.to_string();
//!         work_item(move || async move { Ok(url.len()) })
//!     })
//!     .collect();
//!
//! // At most two fetches run at once.
//! let sizes = directly(2, items)?.await.expect("no fetch fails");
//! assert_eq!(sizes, vec![1, 1, 1, 1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`source`] | Work items, the fixed list and the growable queue |
//! | [`runner`] | Batch and streaming runners, error handles, snapshots |
//! | [`config`] | Runner configuration and environment overrides |
//! | [`error`] | Usage faults reported synchronously |

pub mod config;
pub mod runner;
pub mod source;

mod utils;

pub use config::RunnerConfig;
pub use runner::{
    directly, directly_streaming, Directly, ErrorHandle, RunnerSnapshot, StreamFailure,
    StreamingRunner, Terminator,
};
pub use source::{work_item, FixedList, WorkItem, WorkQueue, WorkSource};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
