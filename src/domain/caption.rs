use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Layout of `uploaded_at` in the caption feed, e.g. `2023-11-18T23:15:31`.
pub const UPLOADED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One caption release listed by the caption feed for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    /// Numeric string; fractional episodes such as `"12.5"` occur.
    #[serde(default)]
    pub episode: String,
    #[serde(rename = "updDt", default)]
    pub uploaded_at: String,
    #[serde(rename = "website", default)]
    pub source_site: String,
    #[serde(rename = "name", default)]
    pub author_name: String,
}

impl CaptionEntry {
    pub fn episode_number(&self) -> Option<f64> {
        self.episode
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }

    pub fn uploaded_at_parsed(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.uploaded_at, UPLOADED_AT_FORMAT).ok()
    }
}

/// Stored caption row, unique per `(item_id, episode)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    /// Row id; 0 until the record has been stored.
    pub id: i64,
    pub item_id: i64,
    pub title: String,
    pub episode: String,
    pub author_name: String,
    pub source_site: String,
    pub updated_at: DateTime<Utc>,
}

impl CaptionRecord {
    pub fn new(item_id: i64, episode: &str) -> Self {
        Self {
            id: 0,
            item_id,
            title: String::new(),
            episode: episode.to_string(),
            author_name: String::new(),
            source_site: String::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    pub fn apply(&mut self, title: &str, entry: &CaptionEntry) {
        self.title = title.to_string();
        self.episode = entry.episode.clone();
        self.author_name = entry.author_name.clone();
        self.source_site = entry.source_site.clone();
        self.updated_at = Utc::now();
    }
}
