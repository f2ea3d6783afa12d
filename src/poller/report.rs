use std::time::Duration;

use crate::app::SubfeedError;

/// What happened to one eligible item during a cycle.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Schedule and caption rows were written.
    Persisted {
        item_id: i64,
        episode: String,
        schedule_created: bool,
        caption_created: bool,
    },
    /// No caption qualified; nothing was written.
    NoCaption { item_id: i64 },
    CaptionFetchFailed { item_id: i64, error: SubfeedError },
    /// The caption row was not attempted.
    ScheduleUpsertFailed { item_id: i64, error: SubfeedError },
    /// The schedule row was already written.
    CaptionUpsertFailed { item_id: i64, error: SubfeedError },
}

impl ItemOutcome {
    pub fn item_id(&self) -> i64 {
        match self {
            Self::Persisted { item_id, .. }
            | Self::NoCaption { item_id }
            | Self::CaptionFetchFailed { item_id, .. }
            | Self::ScheduleUpsertFailed { item_id, .. }
            | Self::CaptionUpsertFailed { item_id, .. } => *item_id,
        }
    }

    pub fn error(&self) -> Option<&SubfeedError> {
        match self {
            Self::CaptionFetchFailed { error, .. }
            | Self::ScheduleUpsertFailed { error, .. }
            | Self::CaptionUpsertFailed { error, .. } => Some(error),
            Self::Persisted { .. } | Self::NoCaption { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }
}

/// Outcome of one reconciliation cycle, one entry per eligible item in
/// processing order.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<ItemOutcome>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn eligible(&self) -> usize {
        self.outcomes.len()
    }

    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Persisted { .. }))
    }

    pub fn new_captions(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                ItemOutcome::Persisted {
                    caption_created: true,
                    ..
                }
            )
        })
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::NoCaption { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(ItemOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} eligible, {} persisted ({} new captions), {} without caption, {} errors ({:.1}s)",
            self.eligible(),
            self.persisted(),
            self.new_captions(),
            self.skipped(),
            self.failed(),
            self.elapsed.as_secs_f64()
        )
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(*o)).count()
    }
}
