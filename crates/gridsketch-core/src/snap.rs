//! Grid snapping.

use kurbo::Point;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point (view space).
    pub point: Point,
    /// The point before snapping.
    pub raw: Point,
}

impl SnapResult {
    /// Distance the point travelled while snapping.
    pub fn distance(&self) -> f64 {
        self.raw.distance(self.point)
    }

    /// Whether the raw point was close enough to the grid intersection for an
    /// indicator to be drawn.
    pub fn within(&self, threshold: f64) -> bool {
        self.distance() < threshold
    }
}

/// Snap a view-space point to the nearest grid intersection.
///
/// Idempotent: snapping an already snapped point returns it unchanged.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    SnapResult {
        point: Point::new(snap_value(point.x, grid_size), snap_value(point.y, grid_size)),
        raw: point,
    }
}

/// Snap a single coordinate to the nearest multiple of `grid_size`.
pub fn snap_value(value: f64, grid_size: f64) -> f64 {
    let snapped = (value / grid_size).round() * grid_size;
    // Avoid -0.0 leaking into serialized documents
    if snapped == 0.0 { 0.0 } else { snapped }
}
