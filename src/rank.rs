//! Chronological ranking of photo collections.
//!
//! Given the camera-format timestamps of one collection, computes a
//! zero-based rank per photo: rank 0 is the earliest capture, rank n-1
//! the latest. The rank vector is always a permutation of `0..n`, so the
//! manifest builder can use it directly as an index permutation. Ties are
//! broken by input order, with the earlier-indexed photo taking the lower
//! rank.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Fixed timestamp layout written by cameras into EXIF `DateTime`.
pub const EXIF_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum RankError {
    #[error("unparseable timestamp {value:?} at index {index}")]
    BadTimestamp { index: usize, value: String },
}

/// Parses a camera-format timestamp (`YYYY:MM:DD HH:MM:SS`).
pub fn parse_exif_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, EXIF_TIMESTAMP_FORMAT).ok()
}

/// Ranks a collection by capture time.
///
/// One malformed timestamp fails the whole collection; callers decide
/// whether that aborts the run or skips the collection.
pub fn rank_by_timestamp(timestamps: &[&str]) -> Result<Vec<usize>, RankError> {
    let parsed = timestamps
        .iter()
        .enumerate()
        .map(|(index, value)| {
            parse_exif_timestamp(value).ok_or_else(|| RankError::BadTimestamp {
                index,
                value: (*value).to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Asymmetric pairwise comparison: for each pair the strictly later
    // photo gains a point, and on a tie the later-indexed one does. Each
    // photo ends up with a distinct count, so the result is a permutation.
    let mut ranks = vec![0usize; parsed.len()];
    for i in 1..parsed.len() {
        for j in 0..i {
            if parsed[i] >= parsed[j] {
                ranks[i] += 1;
            } else {
                ranks[j] += 1;
            }
        }
    }

    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_ordering() {
        let ranks = rank_by_timestamp(&[
            "2023:05:01 10:00:00",
            "2023:05:01 09:00:00",
            "2023:05:01 11:00:00",
        ])
        .unwrap();

        assert_eq!(ranks, vec![1, 0, 2]);
    }

    #[test]
    fn test_ranks_are_a_permutation() {
        let ranks = rank_by_timestamp(&[
            "2023:05:03 08:00:00",
            "2023:05:01 08:00:00",
            "2023:05:04 08:00:00",
            "2023:05:02 08:00:00",
            "2023:05:05 08:00:00",
        ])
        .unwrap();

        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);

        // Earliest capture gets rank 0, latest gets n-1.
        assert_eq!(ranks[1], 0);
        assert_eq!(ranks[4], 4);
    }

    #[test]
    fn test_ties_preserve_input_order() {
        // The earlier-indexed of two tied photos takes the lower rank.
        let ranks =
            rank_by_timestamp(&["2023:05:01 10:00:00", "2023:05:01 10:00:00"]).unwrap();
        assert_eq!(ranks, vec![0, 1]);

        let ranks = rank_by_timestamp(&[
            "2023:05:01 10:00:00",
            "2023:05:01 10:00:00",
            "2023:05:01 09:00:00",
        ])
        .unwrap();

        assert_eq!(ranks, vec![1, 2, 0]);
    }

    #[test]
    fn test_all_identical_timestamps() {
        let ranks = rank_by_timestamp(&[
            "2023:05:01 10:00:00",
            "2023:05:01 10:00:00",
            "2023:05:01 10:00:00",
        ])
        .unwrap();

        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_item() {
        assert_eq!(rank_by_timestamp(&["2023:05:01 10:00:00"]).unwrap(), vec![0]);
    }

    #[test]
    fn test_empty_collection() {
        assert!(rank_by_timestamp(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_bad_timestamp_fails_whole_collection() {
        let result = rank_by_timestamp(&["2023:05:01 10:00:00", "2023-05-01T11:00:00"]);

        match result {
            Err(RankError::BadTimestamp { index, value }) => {
                assert_eq!(index, 1);
                assert_eq!(value, "2023-05-01T11:00:00");
            }
            other => panic!("expected BadTimestamp, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_exif_timestamp() {
        assert!(parse_exif_timestamp("2023:12:25 15:30:00").is_some());
        assert!(parse_exif_timestamp("2023-12-25 15:30:00").is_none());
        assert!(parse_exif_timestamp("").is_none());
    }
}
