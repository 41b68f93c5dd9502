use super::intervals::Interval;
use super::segment::{SegmentId, SegmentKind};
use super::time::Timestamp;

/// Everything between, before and after the dialogue intervals.
///
/// Zero-length gaps (touching intervals, dialogue starting at 0) produce nothing.
pub fn plan_gaps(dialogue: &[Interval], timeline_length: Timestamp) -> Vec<Interval> {
    let (Some(first), Some(last)) = (dialogue.first(), dialogue.last()) else {
        if timeline_length.is_zero() {
            return Vec::new();
        }
        return vec![Interval::new(Timestamp::ZERO, timeline_length)];
    };

    let mut gaps = Vec::with_capacity(dialogue.len() + 1);
    if !first.start.is_zero() {
        gaps.push(Interval::new(Timestamp::ZERO, first.start));
    }
    gaps.extend(
        dialogue
            .windows(2)
            .map(|pair| Interval::new(pair[0].end, pair[1].start)),
    );
    if last.end <= timeline_length {
        gaps.push(Interval::new(last.end, timeline_length));
    }

    gaps.retain(|gap| gap.start < gap.end);
    gaps
}

/// One segment to extract, tagged with where it belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSegment {
    pub id: SegmentId,
    pub kind: SegmentKind,
}

/// Ordered cover of the whole timeline, dialogue and gaps interleaved.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    pub dialogue: Vec<SegmentId>,
    pub gaps: Vec<SegmentId>,
    pub timeline_length: Timestamp,
}

impl SegmentPlan {
    pub fn new(dialogue: &[Interval], timeline_length: Timestamp) -> Self {
        let mut dialogue_ids: Vec<SegmentId> = dialogue.iter().map(Interval::segment_id).collect();
        dialogue_ids.sort();
        let gaps = plan_gaps(dialogue, timeline_length)
            .iter()
            .map(Interval::segment_id)
            .collect();
        Self {
            dialogue: dialogue_ids,
            gaps,
            timeline_length,
        }
    }

    pub fn cover(&self) -> Vec<PlannedSegment> {
        let mut cover: Vec<PlannedSegment> = self
            .dialogue
            .iter()
            .map(|&id| PlannedSegment {
                id,
                kind: SegmentKind::Dialogue,
            })
            .chain(self.gaps.iter().map(|&id| PlannedSegment {
                id,
                kind: SegmentKind::Gap,
            }))
            .collect();
        cover.sort_by_key(|segment| segment.id.offset);
        cover
    }

    pub fn segment_count(&self) -> usize {
        self.dialogue.len() + self.gaps.len()
    }
}
