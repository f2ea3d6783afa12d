use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value the schedule feed uses for titles that are currently airing.
pub const STATUS_ON_AIR: &str = "ON";

/// Weekday partition of the schedule feed.
///
/// The discriminant is the index the schedule endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeekBucket {
    Sun = 0,
    Mon = 1,
    Tue = 2,
    Wed = 3,
    Thu = 4,
    Fri = 5,
    Sat = 6,
    #[default]
    Other = 7,
    /// Newly announced titles. The feed defines it but it is never polled.
    New = 8,
}

impl WeekBucket {
    /// Buckets queried by every reconciliation cycle, in fetch order.
    pub const POLLED: [WeekBucket; 8] = [
        WeekBucket::Sun,
        WeekBucket::Mon,
        WeekBucket::Tue,
        WeekBucket::Wed,
        WeekBucket::Thu,
        WeekBucket::Fri,
        WeekBucket::Sat,
        WeekBucket::Other,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Sun),
            1 => Some(Self::Mon),
            2 => Some(Self::Tue),
            3 => Some(Self::Wed),
            4 => Some(Self::Thu),
            5 => Some(Self::Fri),
            6 => Some(Self::Sat),
            7 => Some(Self::Other),
            8 => Some(Self::New),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sun => "sun",
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Other => "other",
            Self::New => "new",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sun" => Some(Self::Sun),
            "mon" => Some(Self::Mon),
            "tue" => Some(Self::Tue),
            "wed" => Some(Self::Wed),
            "thu" => Some(Self::Thu),
            "fri" => Some(Self::Fri),
            "sat" => Some(Self::Sat),
            "other" => Some(Self::Other),
            "new" => Some(Self::New),
            _ => None,
        }
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One title as listed by the schedule feed for a single bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    #[serde(rename = "animeNo")]
    pub item_id: i64,
    /// Bucket the entry was fetched from; not part of the wire format.
    #[serde(skip)]
    pub week: WeekBucket,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "time", default)]
    pub air_time: String,
    #[serde(rename = "subject", default)]
    pub title: String,
    #[serde(default)]
    pub genres: String,
    #[serde(default)]
    pub caption_count: i64,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(rename = "website", default)]
    pub source_site: String,
}

impl ScheduleEntry {
    /// Only airing titles with at least one caption are worth a caption fetch.
    pub fn is_eligible(&self) -> bool {
        self.caption_count > 0 && self.status == STATUS_ON_AIR
    }
}

/// Stored schedule row, unique per `item_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Row id; 0 until the record has been stored.
    pub id: i64,
    pub item_id: i64,
    pub week: WeekBucket,
    pub status: String,
    pub air_time: String,
    pub title: String,
    pub genres: String,
    pub caption_count: i64,
    pub start_date: String,
    pub end_date: String,
    pub source_site: String,
    /// Episode of the caption selected during the last cycle.
    pub recent_episode: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleRecord {
    pub fn new(item_id: i64) -> Self {
        Self {
            id: 0,
            item_id,
            week: WeekBucket::default(),
            status: String::new(),
            air_time: String::new(),
            title: String::new(),
            genres: String::new(),
            caption_count: 0,
            start_date: String::new(),
            end_date: String::new(),
            source_site: String::new(),
            recent_episode: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Overwrite every feed-sourced field with the values from `entry`.
    pub fn apply(&mut self, entry: &ScheduleEntry) {
        self.item_id = entry.item_id;
        self.week = entry.week;
        self.status = entry.status.clone();
        self.air_time = entry.air_time.clone();
        self.title = entry.title.clone();
        self.genres = entry.genres.clone();
        self.caption_count = entry.caption_count;
        self.start_date = entry.start_date.clone();
        self.end_date = entry.end_date.clone();
        self.source_site = entry.source_site.clone();
        self.updated_at = Utc::now();
    }
}
