pub mod caption;
pub mod schedule;

pub use caption::{CaptionEntry, CaptionRecord};
pub use schedule::{ScheduleEntry, ScheduleRecord, WeekBucket};
