//! Interaction state machine states.

use crate::history::Snapshot;
use crate::shapes::Entity;
use crate::tools::{ShapeDraft, ToolKind};
use kurbo::Point;

/// What the pointer is currently doing.
///
/// Points are snapped view-space positions unless noted otherwise.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// The next primary click places the origin.
    SettingOrigin,
    /// A line, rectangle, circle or arc being dragged out.
    DrawingShape {
        tool: ToolKind,
        start: Point,
        current: Point,
    },
    /// Polyline points accumulated so far; `hover` is the rubber-band end.
    DrawingPolyline { points: Vec<Point>, hover: Option<Point> },
    /// An existing entity being dragged.
    Dragging {
        entity_id: String,
        /// Snapped position the last applied delta was measured to.
        last: Point,
        /// Model state before the first applied step; pushed to the history
        /// when the drag ends with movement.
        before: Option<Box<Snapshot>>,
        /// The entity before the drag, restored on cancel.
        original: Box<Entity>,
    },
    /// Camera pan; `last` is in screen pixels.
    Panning { last: Point },
}

impl InteractionState {
    /// The provisional shape to preview, if any.
    pub fn draft(&self) -> Option<ShapeDraft> {
        match self {
            InteractionState::DrawingShape { tool, start, current } => ShapeDraft::from_drag(*tool, *start, *current),
            InteractionState::DrawingPolyline { points, hover } => {
                let mut points = points.clone();
                if let Some(hover) = hover {
                    if points.last() != Some(hover) {
                        points.push(*hover);
                    }
                }
                Some(ShapeDraft::Polyline { points, closed: false })
            }
            _ => None,
        }
    }

    /// Whether a multi-step gesture is in progress.
    pub fn is_busy(&self) -> bool {
        !matches!(self, InteractionState::Idle)
    }
}
