//! Conversions between view space and normalized grid space.
//!
//! Entities are stored relative to the document origin, in multiples of the
//! grid size. View space is the pixel space the grid is drawn in (before the
//! camera's pan and zoom are applied).

use kurbo::{Point, Vec2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in normalized grid units, serialized as a `[x, y]` pair.
///
/// Whole-number coordinates are written as JSON integers so that documents
/// read the way users type them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

impl GridPoint {
    pub const ORIGIN: GridPoint = GridPoint { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate by a whole number of grid units.
    pub fn translated(self, delta: GridDelta) -> Self {
        Self::new(self.x + delta.dx as f64, self.y + delta.dy as f64)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for GridPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Serialize for GridPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeTuple;
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&Coordinate(self.x))?;
        tuple.serialize_element(&Coordinate(self.y))?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for GridPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (x, y) = <(f64, f64)>::deserialize(deserializer)?;
        Ok(Self::new(x, y))
    }
}

/// A coordinate that serializes integral values as integers.
pub(crate) struct Coordinate(pub f64);

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

/// A whole-grid-unit translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridDelta {
    pub dx: i64,
    pub dy: i64,
}

impl GridDelta {
    pub fn new(dx: i64, dy: i64) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// The grid size and origin that relate view space to grid space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    /// Pixels per grid unit.
    pub grid_size: f64,
    /// Origin in view space (always grid aligned).
    pub origin: Point,
}

impl GridTransform {
    pub fn new(grid_size: f64, origin: Point) -> Self {
        Self { grid_size, origin }
    }

    /// `(view - origin) / grid_size`, rounded to whole grid units.
    pub fn normalize(&self, view: Point) -> GridPoint {
        GridPoint::new(
            round_unit((view.x - self.origin.x) / self.grid_size),
            round_unit((view.y - self.origin.y) / self.grid_size),
        )
    }

    /// Exact inverse of [`normalize`](Self::normalize): `grid * grid_size + origin`.
    pub fn denormalize(&self, grid: GridPoint) -> Point {
        Point::new(
            grid.x * self.grid_size + self.origin.x,
            grid.y * self.grid_size + self.origin.y,
        )
    }

    /// Convert a view-space length (e.g. a radius) to grid units, unrounded.
    pub fn normalize_length(&self, length: f64) -> f64 {
        length / self.grid_size
    }

    pub fn denormalize_length(&self, length: f64) -> f64 {
        length * self.grid_size
    }

    /// Whole grid units between two snapped view points.
    pub fn delta_between(&self, from: Point, to: Point) -> GridDelta {
        let d: Vec2 = to - from;
        GridDelta::new(
            (d.x / self.grid_size).round() as i64,
            (d.y / self.grid_size).round() as i64,
        )
    }

    /// Re-express a stored point for a new origin so that its view-space
    /// position is unchanged. The point is shifted by the origin offset and
    /// never re-snapped, so fractional coordinates survive.
    pub fn rebase(&self, grid: GridPoint, new_origin: &GridTransform) -> GridPoint {
        let shift = self.origin_shift(new_origin);
        GridPoint::new(grid.x + shift.x, grid.y + shift.y)
    }

    /// `(old origin - new origin) / grid_size`. Grid-aligned origins give
    /// whole units exactly.
    fn origin_shift(&self, new_origin: &GridTransform) -> Vec2 {
        let exact = |delta: f64| {
            let units = delta / self.grid_size;
            if (units - units.round()).abs() < 1e-9 { round_unit(units) } else { units }
        };
        Vec2::new(
            exact(self.origin.x - new_origin.origin.x),
            exact(self.origin.y - new_origin.origin.y),
        )
    }

    /// Origin expressed in grid units, as shown in the document.
    pub fn origin_in_grid_units(&self) -> GridPoint {
        GridPoint::new(
            round_unit(self.origin.x / self.grid_size),
            round_unit(self.origin.y / self.grid_size),
        )
    }

    /// Origin view position for a document origin given in grid units.
    pub fn origin_from_grid_units(origin: GridPoint, grid_size: f64) -> Point {
        Point::new(origin.x * grid_size, origin.y * grid_size)
    }
}

fn round_unit(value: f64) -> f64 {
    let rounded = value.round();
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(origin: Point) -> GridTransform {
        GridTransform::new(20.0, origin)
    }

    #[test]
    fn test_normalize_denormalize() {
        let t = grid(Point::new(100.0, 100.0));
        assert_eq!(t.normalize(Point::new(40.0, 140.0)), GridPoint::new(-3.0, 2.0));
        assert_eq!(t.denormalize(GridPoint::new(-3.0, 2.0)), Point::new(40.0, 140.0));
    }

    #[test]
    fn test_normalize_of_denormalize_is_identity() {
        let t = grid(Point::new(-60.0, 240.0));
        for x in -5..5 {
            for y in -5..5 {
                let p = GridPoint::new(x as f64, y as f64);
                assert_eq!(t.normalize(t.denormalize(p)), p);
            }
        }
    }

    #[test]
    fn test_off_grid_view_point_is_lossy() {
        let t = grid(Point::ZERO);
        let back = t.denormalize(t.normalize(Point::new(47.0, 12.0)));
        assert_eq!(back, Point::new(40.0, 20.0));
    }

    #[test]
    fn test_length_is_not_rounded() {
        let t = grid(Point::new(20.0, 20.0));
        assert!((t.normalize_length(50.0) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rebase_keeps_view_position() {
        let old = grid(Point::ZERO);
        let new = grid(Point::new(100.0, 100.0));
        let p = GridPoint::new(2.0, 2.0);
        let rebased = old.rebase(p, &new);
        assert_eq!(rebased, GridPoint::new(-3.0, -3.0));
        assert_eq!(new.denormalize(rebased), old.denormalize(p));
        assert_eq!(new.rebase(rebased, &old), p);
    }

    #[test]
    fn test_rebase_keeps_fractional_coordinates() {
        let zero = grid(Point::ZERO);
        let shifted = grid(Point::new(20.0, 0.0));
        let p = GridPoint::new(2.5, -0.25);
        let moved = zero.rebase(p, &shifted);
        assert_eq!(moved, GridPoint::new(1.5, -0.25));
        assert_eq!(shifted.denormalize(moved), zero.denormalize(p));
        assert_eq!(shifted.rebase(moved, &zero), p);
    }

    #[test]
    fn test_delta_between() {
        let t = grid(Point::ZERO);
        let delta = t.delta_between(Point::new(40.0, 40.0), Point::new(100.0, 20.0));
        assert_eq!(delta, GridDelta::new(3, -1));
    }

    #[test]
    fn test_origin_in_grid_units() {
        let t = grid(Point::new(100.0, -40.0));
        assert_eq!(t.origin_in_grid_units(), GridPoint::new(5.0, -2.0));
        assert_eq!(
            GridTransform::origin_from_grid_units(GridPoint::new(5.0, -2.0), 20.0),
            Point::new(100.0, -40.0)
        );
    }

    #[test]
    fn test_grid_point_serializes_integers() {
        let json = serde_json::to_string(&GridPoint::new(2.0, -3.5)).unwrap();
        assert_eq!(json, "[2,-3.5]");
        let back: GridPoint = serde_json::from_str("[2, -3.5]").unwrap();
        assert_eq!(back, GridPoint::new(2.0, -3.5));
    }
}
