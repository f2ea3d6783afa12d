//! Schedule/caption reconciliation.
//!
//! One cycle fetches the schedule for every polled bucket, then for each
//! eligible item fetches its captions, selects the latest one and upserts the
//! schedule and caption rows.
//!
//! ```text
//! schedule buckets → eligible items → captions → latest → upsert schedule → upsert caption
//! ```
//!
//! A schedule failure aborts the cycle. Everything after it is isolated per
//! item: failures are logged, recorded in the [`CycleReport`] and the cycle
//! moves on. Re-running a cycle converges to the same rows.

mod feed;
mod latest;
mod report;

pub use feed::FeedClient;
pub use latest::{best_candidate, select_latest};
pub use report::{CycleReport, ItemOutcome};

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::Result;
use crate::config::ApiConfig;
use crate::domain::{CaptionEntry, CaptionRecord, ScheduleEntry, ScheduleRecord};
use crate::fetcher::Fetcher;
use crate::store::Store;

pub struct Reconciler {
    feed: FeedClient,
    store: Arc<dyn Store + Send + Sync>,
    workers: usize,
}

impl Reconciler {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<dyn Store + Send + Sync>,
        api: ApiConfig,
    ) -> Self {
        Self {
            feed: FeedClient::new(fetcher, api),
            store,
            workers: 1,
        }
    }

    /// Process up to `workers` items at once. Outcomes keep schedule order.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run one reconciliation cycle.
    pub async fn run(&self) -> Result<CycleReport> {
        let start = Instant::now();
        let entries = self.feed.fetch_schedule().await?;

        let outcomes: Vec<ItemOutcome> = stream::iter(entries)
            .map(|entry| async move { self.process_item(&entry).await })
            .buffered(self.workers)
            .collect()
            .await;

        let report = CycleReport {
            outcomes,
            elapsed: start.elapsed(),
        };
        info!("Cycle complete: {}", report.summary());
        Ok(report)
    }

    async fn process_item(&self, entry: &ScheduleEntry) -> ItemOutcome {
        let item_id = entry.item_id;

        let captions = match self.feed.fetch_captions(item_id).await {
            Ok(captions) => captions,
            Err(error) => {
                warn!(item_id, %error, "caption fetch failed");
                return ItemOutcome::CaptionFetchFailed { item_id, error };
            }
        };

        let Some(latest) = select_latest(&captions) else {
            debug!(item_id, captions = captions.len(), "no usable caption");
            return ItemOutcome::NoCaption { item_id };
        };

        let schedule_created = match self.upsert_schedule(entry, latest) {
            Ok(created) => created,
            Err(error) => {
                error!(item_id, %error, "schedule upsert failed");
                return ItemOutcome::ScheduleUpsertFailed { item_id, error };
            }
        };

        match self.upsert_caption(entry, latest) {
            Ok(caption_created) => {
                if caption_created {
                    info!(item_id, episode = %latest.episode, title = %entry.title, "new caption");
                }
                ItemOutcome::Persisted {
                    item_id,
                    episode: latest.episode.clone(),
                    schedule_created,
                    caption_created,
                }
            }
            Err(error) => {
                error!(item_id, episode = %latest.episode, %error, "caption upsert failed");
                ItemOutcome::CaptionUpsertFailed { item_id, error }
            }
        }
    }

    /// Returns whether the row was newly created.
    fn upsert_schedule(&self, entry: &ScheduleEntry, latest: &CaptionEntry) -> Result<bool> {
        let mut record = self
            .store
            .find_schedule(entry.item_id)?
            .unwrap_or_else(|| ScheduleRecord::new(entry.item_id));
        let created = record.is_new();

        record.apply(entry);
        record.recent_episode = Some(latest.episode.clone());
        self.store.upsert_schedule(&record)?;

        Ok(created)
    }

    /// Returns whether the row was newly created.
    fn upsert_caption(&self, entry: &ScheduleEntry, latest: &CaptionEntry) -> Result<bool> {
        let mut record = self
            .store
            .find_caption(entry.item_id, &latest.episode)?
            .unwrap_or_else(|| CaptionRecord::new(entry.item_id, &latest.episode));
        let created = record.is_new();

        record.apply(&entry.title, latest);
        self.store.upsert_caption(&record)?;

        Ok(created)
    }
}
