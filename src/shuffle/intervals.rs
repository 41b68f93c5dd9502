//! Dialogue intervals and their validation.
//!
//! Boundary rule: an interval may not end at or past the timeline length. Callers
//! whose last interval touches the end must pull it in by one centisecond.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::error::ShuffleError;
use super::segment::SegmentId;
use super::srt::parse_srt;
use super::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Zero for inverted intervals; validation rejects those first.
    pub fn duration(&self) -> Timestamp {
        self.end.saturating_sub(self.start)
    }

    pub fn segment_id(&self) -> SegmentId {
        SegmentId::new(self.start, self.duration())
    }
}

/// Stored as a `[start, end]` pair, the timestamps file format.
impl Serialize for Interval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.start, self.end).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (start, end) = <(Timestamp, Timestamp)>::deserialize(deserializer)?;
        Ok(Self { start, end })
    }
}

/// True when the intervals can be shuffled onto a timeline of `timeline_length`.
pub fn validate(intervals: &[Interval], timeline_length: Option<Timestamp>) -> bool {
    check_intervals(intervals, timeline_length).is_ok()
}

/// Like [`validate`], but reports which interval broke which rule.
pub fn check_intervals(
    intervals: &[Interval],
    timeline_length: Option<Timestamp>,
) -> Result<(), ShuffleError> {
    let limit = timeline_length.filter(|length| !length.is_zero());
    let mut previous_end: Option<Timestamp> = None;

    for (index, interval) in intervals.iter().enumerate() {
        let invalid = |reason: String| ShuffleError::InvalidIntervals { index, reason };

        if interval.start >= interval.end {
            return Err(invalid(format!(
                "start {} is not before end {}",
                interval.start, interval.end
            )));
        }
        if let Some(previous_end) = previous_end
            && interval.start <= previous_end
        {
            return Err(invalid(format!(
                "start {} does not come after the previous end {}",
                interval.start, previous_end
            )));
        }
        if let Some(limit) = limit
            && interval.end >= limit
        {
            return Err(invalid(format!(
                "end {} is not before the timeline length {}",
                interval.end, limit
            )));
        }

        previous_end = Some(interval.end);
    }

    Ok(())
}

/// Load intervals from an SRT file or a JSON array of `[start, end]` pairs.
pub fn load_intervals(path: &Path) -> Result<Vec<Interval>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read intervals from {}", path.display()))?;

    let is_srt = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));

    if is_srt {
        let cues = parse_srt(&contents)
            .with_context(|| format!("Failed to parse subtitles in {}", path.display()))?;
        Ok(cues
            .into_iter()
            .map(|cue| Interval::new(cue.start, cue.end))
            .collect())
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse timestamps JSON in {}", path.display()))
    }
}

pub fn total_duration(intervals: &[Interval]) -> Timestamp {
    intervals
        .iter()
        .fold(Timestamp::ZERO, |total, interval| total + interval.duration())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: u64, end: u64) -> Interval {
        Interval::new(Timestamp::from_secs(start), Timestamp::from_secs(end))
    }

    #[test]
    fn accepts_sorted_disjoint_intervals() {
        let intervals = [iv(0, 2), iv(3, 5), iv(8, 10)];
        assert!(validate(&intervals, Some(Timestamp::from_secs(12))));
        assert!(validate(&intervals, None));
        assert!(validate(&[], Some(Timestamp::from_secs(1))));
    }

    #[test]
    fn rejects_overlap_and_inversion() {
        assert!(!validate(&[iv(0, 5), iv(4, 6)], None));
        assert!(!validate(&[iv(5, 2)], None));
        assert!(!validate(&[iv(3, 3)], None));
        assert!(!validate(&[iv(4, 6), iv(1, 2)], None));
    }

    #[test]
    fn touching_intervals_are_rejected() {
        assert!(!validate(&[iv(0, 2), iv(2, 4)], None));
    }

    #[test]
    fn end_must_be_strictly_inside_timeline() {
        assert!(!validate(&[iv(1, 10)], Some(Timestamp::from_secs(10))));
        assert!(validate(
            &[Interval::new(Timestamp::from_secs(1), Timestamp::from_centis(999))],
            Some(Timestamp::from_secs(10))
        ));
        // zero length disables the bound
        assert!(validate(&[iv(1, 10)], Some(Timestamp::ZERO)));
    }

    #[test]
    fn reports_offending_index() {
        let err = check_intervals(&[iv(0, 2), iv(5, 6), iv(5, 7)], None).unwrap_err();
        assert!(matches!(err, ShuffleError::InvalidIntervals { index: 2, .. }));
    }

    #[test]
    fn loads_json_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.json");
        fs::write(&path, "[[1.62, 2.4], [3.0, 4.25]]").unwrap();

        let intervals = load_intervals(&path).unwrap();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].segment_id().token(), "1.62d0.78");
        assert_eq!(intervals[1].duration(), Timestamp::from_centis(125));
    }

    #[test]
    fn loads_srt_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.ko.srt");
        fs::write(&path, "1\n00:00:01,000 --> 00:00:02,500\nhi\n").unwrap();

        let intervals = load_intervals(&path).unwrap();
        let expected = Interval::new(Timestamp::from_secs(1), Timestamp::from_centis(250));
        assert_eq!(intervals, vec![expected]);
    }

    #[test]
    fn total_duration_sums_exactly() {
        let intervals = [
            Interval::new(
                Timestamp::from_secs_f64(0.1).unwrap(),
                Timestamp::from_secs_f64(0.3).unwrap(),
            ),
            Interval::new(
                Timestamp::from_secs_f64(1.1).unwrap(),
                Timestamp::from_secs_f64(1.2).unwrap(),
            ),
        ];
        assert_eq!(total_duration(&intervals), Timestamp::from_centis(30));
    }
}
