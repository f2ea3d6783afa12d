use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::CaptionEntry;

/// Pick the caption to persist for an item.
///
/// The running best starts at the first entry. A later entry replaces it when
/// its episode number is higher, or equal with an earlier upload time. Later
/// entries whose episode or upload time cannot be parsed are ignored; the
/// first entry counts as episode 0 when its episode does not parse.
///
/// Returns `None` for an empty input, when the first entry's upload time does
/// not parse, or when the winning entry has no source site.
pub fn select_latest(entries: &[CaptionEntry]) -> Option<&CaptionEntry> {
    best_candidate(entries).filter(|entry| !entry.source_site.is_empty())
}

/// The winning entry before the source-site check of [`select_latest`].
pub fn best_candidate(entries: &[CaptionEntry]) -> Option<&CaptionEntry> {
    let first = entries.first()?;
    let Some(first_uploaded_at) = first.uploaded_at_parsed() else {
        debug!(uploaded_at = %first.uploaded_at, "first caption has unparseable upload time");
        return None;
    };

    let mut best: (f64, NaiveDateTime, &CaptionEntry) =
        (first.episode_number().unwrap_or(0.0), first_uploaded_at, first);

    for entry in entries {
        let Some(episode) = entry.episode_number() else {
            debug!(episode = %entry.episode, "skipping caption with unparseable episode");
            continue;
        };
        let Some(uploaded_at) = entry.uploaded_at_parsed() else {
            debug!(uploaded_at = %entry.uploaded_at, "skipping caption with unparseable upload time");
            continue;
        };

        let (best_episode, best_uploaded_at, _) = best;
        if episode > best_episode || (episode == best_episode && uploaded_at < best_uploaded_at) {
            best = (episode, uploaded_at, entry);
        }
    }

    Some(best.2)
}
