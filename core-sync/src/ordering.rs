//! # Ordering Rules
//!
//! Comparators shared by the merge phases:
//!
//! - [`finder_cmp`]: case-insensitive, numeric-aware string collation, so
//!   `"Track 2"` sorts before `"track 10"`.
//! - [`default_order_cmp`]: the order a machine assigns to an album's tracks,
//!   by disc, then track number, then title. Unknown numbers sort last.
//! - [`is_in_default_order`]: whether a sequence already follows that order.

use crate::snapshot::ExternalTrack;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two strings the way a file browser lists names.
///
/// Runs of ASCII digits compare by numeric value; everything else compares
/// case-insensitively. Strings equal under those rules fall back to a plain
/// comparison so the result is a total order.
pub fn finder_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = compare_numbers(&take_digits(&mut left), &take_digits(&mut right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                left.next();
                right.next();
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Known values ascending, unknown last.
fn known_first(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Disc ascending, track ascending, title by [`finder_cmp`].
pub fn default_order_cmp(a: &ExternalTrack, b: &ExternalTrack) -> Ordering {
    known_first(a.disc_number, b.disc_number)
        .then_with(|| known_first(a.track_number, b.track_number))
        .then_with(|| finder_cmp(&a.title, &b.title))
}

/// True when every adjacent pair is in default order. Empty and single-item
/// sequences qualify.
pub fn is_in_default_order(tracks: &[&ExternalTrack]) -> bool {
    tracks
        .windows(2)
        .all(|pair| default_order_cmp(pair[0], pair[1]) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn track(disc: Option<u32>, number: Option<u32>, title: &str) -> ExternalTrack {
        ExternalTrack {
            track_id: format!("{:?}-{:?}-{}", disc, number, title),
            album_id: "a1".to_string(),
            disc_number: disc,
            track_number: number,
            title: title.to_string(),
            artist: String::new(),
            album_artist: None,
            date_added: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            release_date: None,
        }
    }

    #[test]
    fn test_finder_cmp_numeric_runs() {
        assert_eq!(finder_cmp("Track 2", "Track 10"), Ordering::Less);
        assert_eq!(finder_cmp("Track 010", "Track 9"), Ordering::Greater);
        assert_eq!(finder_cmp("a1b2", "a1b10"), Ordering::Less);
    }

    #[test]
    fn test_finder_cmp_case_insensitive() {
        assert_eq!(finder_cmp("apple", "Banana"), Ordering::Less);
        assert_eq!(finder_cmp("Zebra", "apple"), Ordering::Greater);
        // Equal ignoring case still yields a total order.
        assert_ne!(finder_cmp("abc", "ABC"), Ordering::Equal);
        assert_eq!(finder_cmp("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn test_finder_cmp_prefix_sorts_first() {
        assert_eq!(finder_cmp("Intro", "Intro (Reprise)"), Ordering::Less);
        assert_eq!(finder_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn test_default_order_disc_then_track_then_title() {
        let d1t2 = track(Some(1), Some(2), "B");
        let d2t1 = track(Some(2), Some(1), "A");
        let d1t1 = track(Some(1), Some(1), "Z");
        let mut tracks = vec![&d2t1, &d1t2, &d1t1];
        tracks.sort_by(|a, b| default_order_cmp(a, b));
        assert_eq!(tracks, vec![&d1t1, &d1t2, &d2t1]);
    }

    #[test]
    fn test_unknown_numbers_sort_last() {
        let known = track(Some(1), Some(9), "A");
        let unknown_track = track(Some(1), None, "A");
        let unknown_disc = track(None, Some(1), "A");

        assert_eq!(default_order_cmp(&known, &unknown_track), Ordering::Less);
        assert_eq!(default_order_cmp(&unknown_track, &unknown_disc), Ordering::Less);
    }

    #[test]
    fn test_title_breaks_ties() {
        let a = track(Some(1), None, "Song 2");
        let b = track(Some(1), None, "song 10");
        assert_eq!(default_order_cmp(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_detects_default_order() {
        let t1 = track(Some(1), Some(1), "A");
        let t2 = track(Some(1), Some(2), "B");
        let t3 = track(Some(2), Some(1), "C");

        assert!(is_in_default_order(&[]));
        assert!(is_in_default_order(&[&t2]));
        assert!(is_in_default_order(&[&t1, &t2, &t3]));
    }

    #[test]
    fn test_every_other_permutation_is_rejected() {
        let t1 = track(Some(1), Some(1), "A");
        let t2 = track(Some(1), Some(2), "B");
        let t3 = track(Some(2), Some(1), "C");

        let permutations: [[&ExternalTrack; 3]; 5] = [
            [&t1, &t3, &t2],
            [&t2, &t1, &t3],
            [&t2, &t3, &t1],
            [&t3, &t1, &t2],
            [&t3, &t2, &t1],
        ];
        for permutation in permutations {
            assert!(!is_in_default_order(&permutation));
        }
    }
}
