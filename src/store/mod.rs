pub mod sqlite;

use crate::app::Result;
use crate::domain::{CaptionRecord, ScheduleRecord};

pub use sqlite::SqliteStore;

/// Keyed record storage used by the reconciler.
///
/// Lookups return `Ok(None)` when no row matches. Upserts insert records whose
/// `id` is 0 and overwrite the stored row otherwise.
pub trait Store {
    // Schedule rows, keyed by item id
    fn find_schedule(&self, item_id: i64) -> Result<Option<ScheduleRecord>>;
    fn upsert_schedule(&self, record: &ScheduleRecord) -> Result<i64>;
    fn get_all_schedules(&self) -> Result<Vec<ScheduleRecord>>;
    fn count_schedules(&self) -> Result<i64>;

    // Caption rows, keyed by (item id, episode)
    fn find_caption(&self, item_id: i64, episode: &str) -> Result<Option<CaptionRecord>>;
    fn upsert_caption(&self, record: &CaptionRecord) -> Result<i64>;
    fn get_captions_by_item(&self, item_id: i64) -> Result<Vec<CaptionRecord>>;
    fn count_captions(&self) -> Result<i64>;
}
