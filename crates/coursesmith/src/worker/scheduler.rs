//! Poll, process, sleep.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, Instrument};

use super::processor::{AssetOutcome, AssetProcessor};
use crate::asset::StatusUpdate;
use crate::config::WorkerConfig;
use crate::db::{AssetStore, DatabaseError};
use crate::error::{ProcessError, SystemicError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Sleep after a poll that found nothing.
    pub idle_interval: Duration,
    /// Sleep after a systemic error.
    pub error_backoff: Duration,
    /// Assets processed at once within a batch.
    pub concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
            concurrency: 1,
        }
    }
}

impl From<&WorkerConfig> for SchedulerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            idle_interval: config.idle_interval(),
            error_backoff: config.error_backoff(),
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub fetched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Rows that left `processing` before their write landed.
    pub skipped: usize,
}

impl PollOutcome {
    fn add(&mut self, outcome: &AssetOutcome) {
        if outcome.is_completed() {
            self.completed += 1;
        } else if outcome.is_failed() {
            self.failed += 1;
        } else {
            self.skipped += 1;
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn AssetStore>,
    processor: Arc<AssetProcessor>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn AssetStore>,
        processor: Arc<AssetProcessor>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            processor,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Fetches the pending set and drives every asset in it to a terminal
    /// status.
    ///
    /// Assets run on separate tasks, at most `concurrency` at a time, so a
    /// panic in one generator fails only that asset. Status writes the store
    /// rejects are counted and reported as a systemic error once the whole
    /// batch has finished.
    pub async fn poll_once(&self) -> Result<PollOutcome, SystemicError> {
        let pending = self.store.fetch_pending().await?;
        let mut outcome = PollOutcome {
            fetched: pending.len(),
            ..PollOutcome::default()
        };
        if pending.is_empty() {
            return Ok(outcome);
        }
        debug!("Fetched {} pending asset(s)", pending.len());

        let results: Vec<Result<AssetOutcome, (String, DatabaseError)>> = stream::iter(pending)
            .map(|asset| {
                let processor = Arc::clone(&self.processor);
                async move {
                    let asset_id = asset.id.clone();
                    let task = tokio::spawn({
                        let processor = Arc::clone(&processor);
                        async move { processor.process(&asset).await }
                    });
                    let result = match task.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            error!(asset_id = %asset_id, "Processing task died: {}", join_error);
                            let reason = ProcessError::Aborted(join_error.to_string()).to_string();
                            processor
                                .record(&asset_id, StatusUpdate::Failed { reason })
                                .await
                        }
                    };
                    result.map_err(|e| (asset_id, e))
                }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut write_failures = 0;
        for result in results {
            match result {
                Ok(asset_outcome) => outcome.add(&asset_outcome),
                Err((asset_id, e)) => {
                    error!(asset_id = %asset_id, "Failed to record terminal status: {}", e);
                    write_failures += 1;
                }
            }
        }

        if write_failures > 0 {
            return Err(SystemicError::StatusWrites {
                count: write_failures,
            });
        }
        Ok(outcome)
    }

    /// Runs poll cycles until `shutdown` turns `true` (or its sender is
    /// dropped).
    ///
    /// A cycle that found work is followed immediately by the next; an empty
    /// cycle sleeps `idle_interval`; a systemic error sleeps `error_backoff`.
    /// Sleeps end early on shutdown, in-flight batches do not.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler started (idle {}s, backoff {}s, concurrency {})",
            self.settings.idle_interval.as_secs(),
            self.settings.error_backoff.as_secs(),
            self.settings.concurrency
        );

        let mut cycle: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            cycle += 1;

            let delay = match self.poll_once().instrument(info_span!("poll_cycle", cycle)).await {
                Ok(outcome) if outcome.fetched == 0 => {
                    debug!("No pending assets");
                    Some(self.settings.idle_interval)
                }
                Ok(outcome) => {
                    info!(
                        "Processed {} asset(s): {} completed, {} failed, {} skipped",
                        outcome.fetched, outcome.completed, outcome.failed, outcome.skipped
                    );
                    None
                }
                Err(e) => {
                    error!(
                        "Poll cycle failed: {}. Retrying in {}s",
                        e,
                        self.settings.error_backoff.as_secs()
                    );
                    Some(self.settings.error_backoff)
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!("Scheduler stopped after {} cycle(s)", cycle);
    }
}
