//! Periodic recomputation of denormalized memory counters.
//!
//! Writes keep the counters current inline; this job repairs drift by
//! recomputing them from the underlying rows in id-ordered batches.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument};

use crate::domain::MemoryRepository;
use crate::infrastructure::metrics::record_counter_backfill;
use crate::shared::error::AppError;

pub struct CounterBackfill<M: MemoryRepository> {
    memory_repo: Arc<M>,
    batch_size: i64,
}

impl<M: MemoryRepository + 'static> CounterBackfill<M> {
    pub fn new(memory_repo: Arc<M>, batch_size: i64) -> Self {
        Self {
            memory_repo,
            batch_size: batch_size.max(1),
        }
    }

    /// One full pass over every memory. Returns the number of rows recomputed.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<u64, AppError> {
        let mut after_id = 0;
        let mut total = 0;

        loop {
            let batch = self
                .memory_repo
                .recompute_counters(after_id, self.batch_size)
                .await?;
            total += batch.processed;

            match batch.last_id {
                Some(last_id) if batch.processed as i64 >= self.batch_size => after_id = last_id,
                _ => break,
            }
        }

        record_counter_backfill(total);
        Ok(total)
    }

    /// Run a pass every `interval` until the task is dropped.
    pub async fn run_forever(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(processed) => info!(processed, "Counter backfill finished"),
                Err(e) => error!(error = %e, "Counter backfill failed"),
            }
        }
    }
}
