//! Re-slicing shuffled dialogue back onto the original dialogue intervals.
//!
//! Shuffled segments are consumed left to right. Each output interval takes
//! exactly its own duration of material; whatever is left of a partially used
//! segment carries over to the next interval through the [`Cursor`].

use serde::Serialize;

use super::error::ShuffleError;
use super::intervals::Interval;
use super::segment::SegmentId;
use super::time::Timestamp;

/// Position in the permutation. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub segment_index: usize,
    pub offset: Timestamp,
}

/// A sub-range of one source segment. `trim` is `None` when the whole segment
/// is used, which lets the transcoder copy it without re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PieceSlice {
    pub segment: SegmentId,
    pub trim: Option<(Timestamp, Timestamp)>,
}

impl PieceSlice {
    pub fn whole(segment: SegmentId) -> Self {
        Self {
            segment,
            trim: None,
        }
    }

    pub fn trimmed(segment: SegmentId, start: Timestamp, end: Timestamp) -> Self {
        Self {
            segment,
            trim: Some((start, end)),
        }
    }

    /// Range within the segment, relative to the segment's own start.
    pub fn range(&self) -> (Timestamp, Timestamp) {
        self.trim
            .unwrap_or((Timestamp::ZERO, self.segment.duration))
    }

    pub fn duration(&self) -> Timestamp {
        let (start, end) = self.range();
        end.saturating_sub(start)
    }

    pub fn is_whole(&self) -> bool {
        self.trim.is_none()
    }
}

/// Recipe for one output interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPiece {
    pub interval: Interval,
    pub slices: Vec<PieceSlice>,
}

impl OutputPiece {
    pub fn duration(&self) -> Timestamp {
        self.slices
            .iter()
            .fold(Timestamp::ZERO, |total, slice| total + slice.duration())
    }

    pub fn output_id(&self) -> SegmentId {
        self.interval.segment_id()
    }

    /// A piece made of one untouched segment can reuse that segment's file.
    pub fn single_whole_segment(&self) -> Option<SegmentId> {
        match self.slices.as_slice() {
            [slice] if slice.is_whole() => Some(slice.segment),
            _ => None,
        }
    }
}

/// Step-wise reassembly over one permutation.
#[derive(Debug)]
pub struct Reassembler<'a> {
    permutation: &'a [SegmentId],
    cursor: Cursor,
    filled: usize,
}

impl<'a> Reassembler<'a> {
    pub fn new(permutation: &'a [SegmentId]) -> Self {
        Self {
            permutation,
            cursor: Cursor::default(),
            filled: 0,
        }
    }

    /// Build the piece for the next interval. On error the cursor is left where
    /// it was, so the interval can be retried as a whole.
    pub fn fill(&mut self, interval: Interval) -> Result<OutputPiece, ShuffleError> {
        let mut cursor = self.cursor;
        let mut needed = interval.duration();
        let mut slices = Vec::new();

        while !needed.is_zero() {
            let segment = *self.permutation.get(cursor.segment_index).ok_or(
                ShuffleError::PermutationExhausted {
                    interval_index: self.filled,
                    missing: needed,
                },
            )?;
            let available = segment.duration.saturating_sub(cursor.offset);

            if available > needed {
                let end = cursor.offset + needed;
                slices.push(PieceSlice::trimmed(segment, cursor.offset, end));
                cursor.offset = end;
                needed = Timestamp::ZERO;
            } else {
                if cursor.offset.is_zero() && !available.is_zero() {
                    slices.push(PieceSlice::whole(segment));
                } else if !available.is_zero() {
                    slices.push(PieceSlice::trimmed(segment, cursor.offset, segment.duration));
                }
                cursor.segment_index += 1;
                cursor.offset = Timestamp::ZERO;
                needed = needed - available;
            }
        }

        self.cursor = cursor;
        self.filled += 1;
        Ok(OutputPiece { interval, slices })
    }
}

/// Re-slice `permutation` so that piece `i` lasts exactly as long as
/// `intervals[i]`. Fails if the permutation runs dry before the last interval
/// is filled.
pub fn reassemble(
    intervals: &[Interval],
    permutation: &[SegmentId],
) -> Result<Vec<OutputPiece>, ShuffleError> {
    let mut reassembler = Reassembler::new(permutation);
    intervals
        .iter()
        .map(|interval| reassembler.fill(*interval))
        .collect()
}
