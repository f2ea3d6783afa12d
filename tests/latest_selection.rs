// Property tests for caption selection: highest episode wins, ties go to the
// earliest upload, unparseable entries after the first are ignored, and an
// empty source site means nothing is selected.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use subfeed::domain::CaptionEntry;
use subfeed::domain::caption::UPLOADED_AT_FORMAT;
use subfeed::poller::{best_candidate, select_latest};

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 11, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

// Episodes in half steps so fractional specials show up and ties are common
fn arb_episode() -> impl Strategy<Value = String> {
    (0u32..24).prop_map(|half| {
        if half % 2 == 0 {
            (half / 2).to_string()
        } else {
            format!("{}.5", half / 2)
        }
    })
}

fn arb_uploaded_at() -> impl Strategy<Value = String> {
    (0i64..72).prop_map(|hours| {
        (base_time() + Duration::hours(hours))
            .format(UPLOADED_AT_FORMAT)
            .to_string()
    })
}

fn arb_site() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("https://a.example.com".to_string()),
        Just("https://b.example.com".to_string()),
        Just("https://c.example.com".to_string()),
    ]
}

fn arb_entry() -> impl Strategy<Value = CaptionEntry> {
    (arb_episode(), arb_uploaded_at(), arb_site(), "[a-z]{1,8}").prop_map(
        |(episode, uploaded_at, source_site, author_name)| CaptionEntry {
            episode,
            uploaded_at,
            source_site,
            author_name,
        },
    )
}

fn arb_invalid_entry() -> impl Strategy<Value = CaptionEntry> {
    prop_oneof![
        (Just("SP".to_string()), arb_uploaded_at()),
        (arb_episode(), Just("yesterday".to_string())),
        (Just(String::new()), Just(String::new())),
    ]
    .prop_map(|(episode, uploaded_at)| CaptionEntry {
        episode,
        uploaded_at,
        source_site: "https://invalid.example.com".to_string(),
        author_name: "x".to_string(),
    })
}

proptest! {
    #[test]
    fn selected_entry_dominates_all_others(entries in prop::collection::vec(arb_entry(), 1..40)) {
        let selected = select_latest(&entries).expect("valid non-empty input selects an entry");
        let episode = selected.episode_number().unwrap();
        let uploaded_at = selected.uploaded_at_parsed().unwrap();

        for entry in &entries {
            let other = entry.episode_number().unwrap();
            prop_assert!(episode >= other);
            if other == episode {
                prop_assert!(uploaded_at <= entry.uploaded_at_parsed().unwrap());
            }
        }
    }

    #[test]
    fn ties_keep_the_first_seen_entry(entries in prop::collection::vec(arb_entry(), 1..40)) {
        let selected = select_latest(&entries).unwrap();
        let first_equal = entries
            .iter()
            .find(|e| e.episode == selected.episode && e.uploaded_at == selected.uploaded_at)
            .unwrap();
        prop_assert!(std::ptr::eq(selected, first_equal));
    }

    #[test]
    fn invalid_entries_after_the_first_never_win(
        valid in prop::collection::vec(arb_entry(), 1..20),
        invalid in prop::collection::vec(arb_invalid_entry(), 0..20),
        seed in any::<u64>(),
    ) {
        let expected = select_latest(&valid).cloned();

        // The first entry seeds the running best, so keep a valid one in
        // front and interleave the rest deterministically from the seed
        let (mut v, mut i) = (valid.iter(), invalid.iter());
        let mut mixed: Vec<CaptionEntry> = v.next().cloned().into_iter().collect();
        let mut bits = seed;
        loop {
            let next = if bits & 1 == 0 { v.next().or_else(|| i.next()) } else { i.next().or_else(|| v.next()) };
            bits = bits.rotate_right(1);
            match next {
                Some(entry) => mixed.push(entry.clone()),
                None => break,
            }
        }

        prop_assert_eq!(select_latest(&mixed).cloned(), expected);
    }

    #[test]
    fn empty_site_on_winner_is_not_found(mut entries in prop::collection::vec(arb_entry(), 1..20)) {
        let winner = best_candidate(&entries).unwrap().clone();
        for entry in entries.iter_mut() {
            if entry.episode == winner.episode && entry.uploaded_at == winner.uploaded_at {
                entry.source_site.clear();
            }
        }

        prop_assert!(best_candidate(&entries).is_some());
        prop_assert!(select_latest(&entries).is_none());
    }
}

#[test]
fn empty_input_is_not_found() {
    assert!(select_latest(&[]).is_none());
    assert!(best_candidate(&[]).is_none());
}
