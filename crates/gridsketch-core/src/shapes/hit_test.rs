//! Hit testing in view space.

use super::{Entity, Geometry};
use crate::grid::GridTransform;
use kurbo::{Point, Vec2};
use std::f64::consts::TAU;

/// Distance from a point to the segment `a`-`b`.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Whether `angle` lies on the sweep from `start` to `end` (increasing angle).
fn angle_in_sweep(angle: f64, start: f64, end: f64) -> bool {
    let sweep = end - start;
    if sweep.abs() >= TAU {
        return true;
    }
    let offset = (angle - start).rem_euclid(TAU);
    if sweep >= 0.0 {
        offset <= sweep
    } else {
        offset >= TAU + sweep || offset == 0.0
    }
}

impl Entity {
    /// Whether a view-space point lies within `tolerance` (view units) of the
    /// entity's outline. Rectangles also accept their interior.
    pub fn hit_test(&self, point: Point, grid: &GridTransform, tolerance: f64) -> bool {
        match &self.geometry {
            Geometry::Line(line) => {
                let a = grid.denormalize(line.start);
                let b = grid.denormalize(line.end);
                distance_to_segment(point, a, b) < tolerance
            }
            Geometry::Rectangle(rect) => {
                let tl = grid.denormalize(rect.top_left);
                let br = grid.denormalize(rect.bottom_right);
                point.x >= tl.x - tolerance
                    && point.x <= br.x + tolerance
                    && point.y >= tl.y - tolerance
                    && point.y <= br.y + tolerance
            }
            Geometry::Circle(circle) => {
                let center = grid.denormalize(circle.center);
                let radius = grid.denormalize_length(circle.radius);
                (point.distance(center) - radius).abs() < tolerance
            }
            Geometry::Arc(arc) => {
                let center = grid.denormalize(arc.center);
                let radius = grid.denormalize_length(arc.radius);
                let offset: Vec2 = point - center;
                (offset.hypot() - radius).abs() < tolerance
                    && angle_in_sweep(offset.atan2(), arc.start_angle, arc.end_angle)
            }
            Geometry::Polyline(_) => self.segment_at(point, grid, tolerance).is_some(),
        }
    }

    /// Index of the polyline segment nearest to `point` within `tolerance`.
    ///
    /// Returns `None` for non-polylines.
    pub fn segment_at(&self, point: Point, grid: &GridTransform, tolerance: f64) -> Option<usize> {
        let poly = self.as_polyline()?;
        poly.edges()
            .map(|(index, a, b)| {
                let d = distance_to_segment(point, grid.denormalize(a), grid.denormalize(b));
                (index, d)
            })
            .filter(|(_, d)| *d < tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPoint;
    use crate::shapes::{Arc, Circle, Line, Polyline, Rectangle};
    use std::f64::consts::FRAC_PI_2;

    fn grid() -> GridTransform {
        GridTransform::new(20.0, Point::ZERO)
    }

    #[test]
    fn test_distance_to_segment() {
        let d = distance_to_segment(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < f64::EPSILON);
        let end = distance_to_segment(Point::new(13.0, 4.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((end - 5.0).abs() < f64::EPSILON);
        let degenerate = distance_to_segment(Point::new(3.0, 4.0), Point::ZERO, Point::ZERO);
        assert!((degenerate - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_line_hit() {
        let entity = Entity::new(
            "entity_1",
            Geometry::Line(Line {
                start: GridPoint::new(0.0, 0.0),
                end: GridPoint::new(5.0, 0.0),
            }),
            "#fff",
        );
        assert!(entity.hit_test(Point::new(50.0, 4.0), &grid(), 5.0));
        assert!(!entity.hit_test(Point::new(50.0, 6.0), &grid(), 5.0));
    }

    #[test]
    fn test_rectangle_hit_includes_interior() {
        let entity = Entity::new(
            "entity_1",
            Geometry::Rectangle(Rectangle::from_corners(GridPoint::new(1.0, 1.0), GridPoint::new(3.0, 3.0))),
            "#fff",
        );
        assert!(entity.hit_test(Point::new(40.0, 40.0), &grid(), 5.0));
        assert!(entity.hit_test(Point::new(16.0, 16.0), &grid(), 5.0));
        assert!(!entity.hit_test(Point::new(10.0, 40.0), &grid(), 5.0));
    }

    #[test]
    fn test_circle_hit_on_outline_only() {
        let entity = Entity::new(
            "entity_1",
            Geometry::Circle(Circle {
                center: GridPoint::new(5.0, 5.0),
                radius: 2.5,
            }),
            "#fff",
        );
        assert!(entity.hit_test(Point::new(150.0, 102.0), &grid(), 5.0));
        assert!(!entity.hit_test(Point::new(100.0, 100.0), &grid(), 5.0));
    }

    #[test]
    fn test_arc_hit_respects_sweep() {
        let entity = Entity::new(
            "entity_1",
            Geometry::Arc(Arc {
                center: GridPoint::new(0.0, 0.0),
                radius: 2.0,
                start_angle: 0.0,
                end_angle: FRAC_PI_2,
            }),
            "#fff",
        );
        // (40, 0) and (0, 40) bound the quarter sweep; (-40, 0) lies outside it
        assert!(entity.hit_test(Point::new(40.0, 1.0), &grid(), 5.0));
        assert!(entity.hit_test(Point::new(0.0, 40.0), &grid(), 5.0));
        assert!(!entity.hit_test(Point::new(-40.0, 0.0), &grid(), 5.0));
    }

    #[test]
    fn test_segment_at_closing_edge() {
        let points = vec![
            GridPoint::new(0.0, 0.0),
            GridPoint::new(4.0, 0.0),
            GridPoint::new(4.0, 4.0),
        ];
        let entity = Entity::new(
            "entity_1",
            Geometry::Polyline(Polyline::new("entity_1", points, true)),
            "#fff",
        );
        assert_eq!(entity.segment_at(Point::new(40.0, 2.0), &grid(), 5.0), Some(0));
        assert_eq!(entity.segment_at(Point::new(82.0, 40.0), &grid(), 5.0), Some(1));
        assert_eq!(entity.segment_at(Point::new(40.0, 41.0), &grid(), 5.0), Some(2));
        assert_eq!(entity.segment_at(Point::new(60.0, 30.0), &grid(), 5.0), None);
        assert!(entity.hit_test(Point::new(40.0, 41.0), &grid(), 5.0));
    }
}
