//! Drawing tools and the shape drafts they produce.

use crate::grid::GridTransform;
use crate::shapes::{Arc, Circle, EntityKind, Geometry, Line, Polyline, Rectangle};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Line,
    Rectangle,
    Circle,
    Arc,
    Polyline,
}

/// A provisional shape in snapped view coordinates, not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDraft {
    Line { start: Point, end: Point },
    Rectangle { start: Point, end: Point },
    /// `edge` is any point on the circle; it fixes the radius.
    Circle { center: Point, edge: Point },
    Arc { center: Point, edge: Point },
    Polyline { points: Vec<Point>, closed: bool },
}

impl ShapeDraft {
    /// Draft for a drag-shape tool between two snapped view points.
    pub fn from_drag(tool: ToolKind, start: Point, end: Point) -> Option<Self> {
        match tool {
            ToolKind::Line => Some(ShapeDraft::Line { start, end }),
            ToolKind::Rectangle => Some(ShapeDraft::Rectangle { start, end }),
            ToolKind::Circle => Some(ShapeDraft::Circle { center: start, edge: end }),
            ToolKind::Arc => Some(ShapeDraft::Arc { center: start, edge: end }),
            ToolKind::Select | ToolKind::Polyline => None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            ShapeDraft::Line { .. } => EntityKind::Line,
            ShapeDraft::Rectangle { .. } => EntityKind::Rectangle,
            ShapeDraft::Circle { .. } => EntityKind::Circle,
            ShapeDraft::Arc { .. } => EntityKind::Arc,
            ShapeDraft::Polyline { .. } => EntityKind::Polyline,
        }
    }

    /// Press and release on the same point, or a polyline with fewer than two points.
    pub fn is_degenerate(&self) -> bool {
        match self {
            ShapeDraft::Line { start, end } | ShapeDraft::Rectangle { start, end } => start == end,
            ShapeDraft::Circle { center, edge } | ShapeDraft::Arc { center, edge } => center == edge,
            ShapeDraft::Polyline { points, .. } => points.len() < 2,
        }
    }

    /// Normalize the draft into stored geometry for entity `entity_id`.
    ///
    /// Points are rounded to whole grid units; radii are divided by the grid
    /// size without rounding.
    pub fn to_geometry(&self, entity_id: &str, grid: &GridTransform) -> Geometry {
        match self {
            ShapeDraft::Line { start, end } => Geometry::Line(Line {
                start: grid.normalize(*start),
                end: grid.normalize(*end),
            }),
            ShapeDraft::Rectangle { start, end } => Geometry::Rectangle(Rectangle::from_corners(
                grid.normalize(*start),
                grid.normalize(*end),
            )),
            ShapeDraft::Circle { center, edge } => Geometry::Circle(Circle {
                center: grid.normalize(*center),
                radius: grid.normalize_length(center.distance(*edge)),
            }),
            ShapeDraft::Arc { center, edge } => Geometry::Arc(Arc {
                center: grid.normalize(*center),
                radius: grid.normalize_length(center.distance(*edge)),
                start_angle: 0.0,
                end_angle: FRAC_PI_2,
            }),
            ShapeDraft::Polyline { points, closed } => {
                let points = points.iter().map(|p| grid.normalize(*p)).collect();
                Geometry::Polyline(Polyline::new(entity_id, points, *closed))
            }
        }
    }
}
