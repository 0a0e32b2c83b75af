//! Polylines and their independently annotatable segments.

use super::{COLOR_KEY, Metadata};
use crate::grid::GridPoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Build the id of segment `index` of entity `entity_id`.
pub fn segment_id(entity_id: &str, index: usize) -> String {
    format!("{entity_id}_seg_{index}")
}

/// One edge of a polyline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    /// `<entityId>_seg_<index>`; empty when missing from an edited document.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Segment {
    pub fn new(entity_id: &str, index: usize) -> Self {
        Self {
            id: segment_id(entity_id, index),
            metadata: Metadata::new(),
        }
    }

    pub fn color(&self) -> Option<&str> {
        self.metadata.get(COLOR_KEY).and_then(Value::as_str)
    }
}

/// An open or closed chain of points.
///
/// `segments` runs parallel to the edge list: `points.len()` entries when
/// closed, `points.len() - 1` when open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<GridPoint>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Polyline {
    /// Create a polyline with fresh segments for `entity_id`.
    pub fn new(entity_id: &str, points: Vec<GridPoint>, closed: bool) -> Self {
        let mut poly = Self {
            points,
            closed,
            segments: Vec::new(),
        };
        poly.reconcile_segments(entity_id);
        poly
    }

    /// Segment count implied by the point count and closed state.
    pub fn expected_segment_count(&self) -> usize {
        if self.closed {
            self.points.len()
        } else {
            self.points.len().saturating_sub(1)
        }
    }

    /// Make the segment list match the edge list.
    ///
    /// Segments at indices that still exist keep their metadata; missing ones
    /// are appended with empty metadata and surplus ones are dropped. When the
    /// count changes every id is re-derived from its index; otherwise only
    /// missing ids are filled in. Returns whether anything changed.
    pub fn reconcile_segments(&mut self, entity_id: &str) -> bool {
        let expected = self.expected_segment_count();
        let resized = self.segments.len() != expected;
        if resized {
            self.segments.truncate(expected);
            let start = self.segments.len();
            self.segments.extend((start..expected).map(|i| Segment::new(entity_id, i)));
            self.regenerate_segment_ids(entity_id);
            return true;
        }

        let mut changed = false;
        for (index, segment) in self.segments.iter_mut().enumerate() {
            if segment.id.is_empty() {
                segment.id = segment_id(entity_id, index);
                changed = true;
            }
        }
        changed
    }

    /// Re-derive every segment id from the entity id and index.
    pub fn regenerate_segment_ids(&mut self, entity_id: &str) {
        for (index, segment) in self.segments.iter_mut().enumerate() {
            segment.id = segment_id(entity_id, index);
        }
    }

    /// Open or close the polyline, adding or removing the closing segment.
    ///
    /// Closing appends segment `n - 1` only if it is absent; opening removes
    /// the trailing segment only when there are exactly `n` of them.
    pub fn set_closed(&mut self, entity_id: &str, closed: bool) {
        let n = self.points.len();
        if closed {
            if n >= 1 && self.segments.len() == n - 1 {
                self.segments.push(Segment::new(entity_id, n - 1));
            }
        } else if self.segments.len() == n {
            self.segments.pop();
        }
        self.closed = closed;
    }

    /// Edges as `(segment index, from, to)`, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (usize, GridPoint, GridPoint)> + '_ {
        let open_edges = self
            .points
            .windows(2)
            .enumerate()
            .map(|(i, pair)| (i, pair[0], pair[1]));
        let closing = match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(&first), Some(&last)) if self.points.len() > 2 => {
                Some((self.points.len() - 1, last, first))
            }
            _ => None,
        };
        open_edges.chain(closing)
    }

    /// Color of a segment, falling back to the parent entity's color.
    pub fn segment_color<'a>(&'a self, index: usize, parent: &'a Metadata) -> Option<&'a str> {
        self.segments
            .get(index)
            .and_then(Segment::color)
            .or_else(|| parent.get(COLOR_KEY).and_then(Value::as_str))
    }
}
