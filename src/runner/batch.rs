//! Batch runner over a fixed list of work items.

use super::slots::Slots;
use crate::config::RunnerConfig;
use crate::source::{FixedList, WorkItem, WorkSource};
use crate::Result;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs a fixed list of work items with at most `capacity` in flight.
///
/// The run resolves once: either with every result in the original order, or with the
/// first error any item produced. After a failure nothing else is started; items still
/// in flight are dropped and their outcomes discarded.
pub struct Directly<T, E> {
    config: RunnerConfig,
    source: FixedList<T, E>,
}

impl<T, E> Directly<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(capacity: usize, items: Vec<WorkItem<T, E>>) -> Result<Self> {
        Self::with_config(RunnerConfig::new(capacity), items)
    }

    pub fn with_config(config: RunnerConfig, items: Vec<WorkItem<T, E>>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: FixedList::new(items),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of work items still to run.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub async fn run(self) -> std::result::Result<Vec<T>, E> {
        let Directly { config, mut source } = self;
        let total = source.len();
        let started_at = Instant::now();

        if total <= config.capacity {
            debug!(
                runner = %config.label,
                total,
                capacity = config.capacity,
                "all items fit, starting at once"
            );
            let pending = source.into_items().into_iter().map(|item| item());
            let results = futures::future::try_join_all(pending).await;
            match &results {
                Ok(_) => info!(
                    runner = %config.label,
                    total,
                    elapsed = ?started_at.elapsed(),
                    "batch complete"
                ),
                Err(_) => warn!(runner = %config.label, total, "batch aborted by failed work item"),
            }
            return results;
        }

        let mut slots = Slots::new(config.capacity);
        let mut collected: Vec<Option<T>> = Vec::with_capacity(total);
        collected.resize_with(total, || None);

        slots.fill(&mut source);
        debug!(
            runner = %config.label,
            in_flight = slots.len(),
            pending = source.len(),
            "initial slots filled"
        );

        while let Some((index, outcome)) = slots.race().await {
            match outcome {
                Ok(value) => {
                    debug!(runner = %config.label, index, "work item settled");
                    collected[index] = Some(value);
                }
                Err(error) => {
                    warn!(
                        runner = %config.label,
                        index,
                        abandoned = slots.len(),
                        "work item failed, aborting batch"
                    );
                    return Err(error);
                }
            }

            if slots.fill(&mut source) > 0 {
                debug!(
                    runner = %config.label,
                    index = slots.started() - 1,
                    in_flight = slots.len(),
                    "replacement started"
                );
            }
        }

        info!(
            runner = %config.label,
            total,
            elapsed = ?started_at.elapsed(),
            "batch complete"
        );
        // Every index below `total` was started and settled successfully.
        Ok(collected.into_iter().flatten().collect())
    }
}

/// Validate `capacity` and start running `items` in one call.
///
/// Usage faults surface here synchronously; the returned future carries only the
/// outcome of the work items.
pub fn directly<T, E>(
    capacity: usize,
    items: Vec<WorkItem<T, E>>,
) -> Result<impl Future<Output = std::result::Result<Vec<T>, E>>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    Ok(Directly::new(capacity, items)?.run())
}
