use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::app::{Result, SubfeedError};
use crate::config::ApiConfig;
use crate::domain::{CaptionEntry, ScheduleEntry, WeekBucket};
use crate::fetcher::Fetcher;

/// JSON wrapper `{code, data}` shared by the schedule and caption endpoints.
/// `code` is not inspected: a 200 with a decodable body is success.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<Vec<T>>,
}

fn decode_envelope<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<Vec<T>> {
    let envelope: Envelope<T> = serde_json::from_slice(body)
        .map_err(|e| SubfeedError::Decode(format!("{}: {}", url, e)))?;
    Ok(envelope.data.unwrap_or_default())
}

/// Client for the schedule and caption endpoints.
#[derive(Clone)]
pub struct FeedClient {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    api: ApiConfig,
}

impl FeedClient {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, api: ApiConfig) -> Self {
        Self { fetcher, api }
    }

    /// Every entry listed for one bucket, tagged with that bucket.
    pub async fn fetch_bucket(&self, bucket: WeekBucket) -> Result<Vec<ScheduleEntry>> {
        let url = self.api.schedule_url_for(bucket.index());
        let page = self.fetcher.fetch(&url).await?;
        let mut entries: Vec<ScheduleEntry> = decode_envelope(&url, &page.body)?;

        for entry in &mut entries {
            entry.week = bucket;
        }

        Ok(entries)
    }

    /// Eligible entries across all polled buckets, in bucket then feed order.
    ///
    /// Any bucket failing aborts the whole schedule.
    pub async fn fetch_schedule(&self) -> Result<Vec<ScheduleEntry>> {
        let mut eligible = Vec::new();
        let mut total = 0;

        for bucket in WeekBucket::POLLED {
            let entries = self.fetch_bucket(bucket).await?;
            total += entries.len();
            debug!(bucket = %bucket, entries = entries.len(), "fetched schedule bucket");
            eligible.extend(entries.into_iter().filter(ScheduleEntry::is_eligible));
        }

        info!(total, eligible = eligible.len(), "schedule fetched");
        Ok(eligible)
    }

    pub async fn fetch_captions(&self, item_id: i64) -> Result<Vec<CaptionEntry>> {
        let url = self.api.caption_url_for(item_id);
        let page = self.fetcher.fetch(&url).await?;
        decode_envelope(&url, &page.body)
    }
}
