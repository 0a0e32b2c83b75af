//! Drawing entities.
//!
//! Every entity stores its geometry in normalized grid space. The variant is
//! carried by the `type` tag of the serialized record:
//!
//! ```json
//! { "id": "entity_1", "type": "line", "start": [2, 2], "end": [5, 5],
//!   "metadata": { "color": "#00ff88" } }
//! ```

mod hit_test;
mod polyline;

pub use hit_test::distance_to_segment;
pub use polyline::{Polyline, Segment, segment_id};

use crate::grid::{Coordinate, GridDelta, GridPoint, GridTransform};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Free-form metadata attached to entities and segments (insertion ordered).
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding an entity's or segment's color.
pub const COLOR_KEY: &str = "color";

/// Prefix of generated entity ids (`entity_<N>`).
pub const ENTITY_ID_PREFIX: &str = "entity_";

/// Build the id for the `n`-th created entity.
pub fn entity_id(n: u64) -> String {
    format!("{ENTITY_ID_PREFIX}{n}")
}

/// Numeric suffix of an `entity_<N>` id, if it has one.
pub fn entity_id_number(id: &str) -> Option<u64> {
    id.strip_prefix(ENTITY_ID_PREFIX)?.parse().ok()
}

/// Entity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Line,
    Rectangle,
    Circle,
    Arc,
    Polyline,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Line => "line",
            EntityKind::Rectangle => "rectangle",
            EntityKind::Circle => "circle",
            EntityKind::Arc => "arc",
            EntityKind::Polyline => "polyline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: GridPoint,
    pub end: GridPoint,
}

/// Axis-aligned rectangle; `top_left <= bottom_right` on both axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    pub top_left: GridPoint,
    pub bottom_right: GridPoint,
}

impl Rectangle {
    /// Build a rectangle from two opposite corners in any order.
    pub fn from_corners(a: GridPoint, b: GridPoint) -> Self {
        Self {
            top_left: GridPoint::new(a.x.min(b.x), a.y.min(b.y)),
            bottom_right: GridPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.top_left.x <= self.bottom_right.x && self.top_left.y <= self.bottom_right.y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: GridPoint,
    #[serde(serialize_with = "serialize_number")]
    pub radius: f64,
}

/// Circular arc; angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arc {
    pub center: GridPoint,
    #[serde(serialize_with = "serialize_number")]
    pub radius: f64,
    #[serde(serialize_with = "serialize_number")]
    pub start_angle: f64,
    #[serde(serialize_with = "serialize_number")]
    pub end_angle: f64,
}

/// Variant-specific geometry, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Line(Line),
    Rectangle(Rectangle),
    Circle(Circle),
    Arc(Arc),
    Polyline(Polyline),
}

/// A drawing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Entity {
    /// Create an entity with the given color.
    pub fn new(id: impl Into<String>, geometry: Geometry, color: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(COLOR_KEY.to_string(), Value::String(color.to_string()));
        Self {
            id: id.into(),
            geometry,
            metadata,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match &self.geometry {
            Geometry::Line(_) => EntityKind::Line,
            Geometry::Rectangle(_) => EntityKind::Rectangle,
            Geometry::Circle(_) => EntityKind::Circle,
            Geometry::Arc(_) => EntityKind::Arc,
            Geometry::Polyline(_) => EntityKind::Polyline,
        }
    }

    pub fn color(&self) -> Option<&str> {
        self.metadata.get(COLOR_KEY).and_then(Value::as_str)
    }

    pub fn as_polyline(&self) -> Option<&Polyline> {
        match &self.geometry {
            Geometry::Polyline(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_polyline_mut(&mut self) -> Option<&mut Polyline> {
        match &mut self.geometry {
            Geometry::Polyline(p) => Some(p),
            _ => None,
        }
    }

    /// Number of addressable segments (zero for non-polylines).
    pub fn segment_count(&self) -> usize {
        self.as_polyline().map_or(0, |p| p.segments.len())
    }

    /// Translate every coordinate field by the same grid delta.
    pub fn translate(&mut self, delta: GridDelta) {
        match &mut self.geometry {
            Geometry::Line(line) => {
                line.start = line.start.translated(delta);
                line.end = line.end.translated(delta);
            }
            Geometry::Rectangle(rect) => {
                rect.top_left = rect.top_left.translated(delta);
                rect.bottom_right = rect.bottom_right.translated(delta);
            }
            Geometry::Circle(circle) => circle.center = circle.center.translated(delta),
            Geometry::Arc(arc) => arc.center = arc.center.translated(delta),
            Geometry::Polyline(poly) => {
                for point in &mut poly.points {
                    *point = point.translated(delta);
                }
            }
        }
    }

    /// Re-express the stored coordinates for a new origin.
    ///
    /// View-space positions are preserved. Radii are origin independent and
    /// are left untouched.
    pub fn rebase(&mut self, old: &GridTransform, new: &GridTransform) {
        let rebase = |p: GridPoint| old.rebase(p, new);
        match &mut self.geometry {
            Geometry::Line(line) => {
                line.start = rebase(line.start);
                line.end = rebase(line.end);
            }
            Geometry::Rectangle(rect) => {
                rect.top_left = rebase(rect.top_left);
                rect.bottom_right = rebase(rect.bottom_right);
            }
            Geometry::Circle(circle) => circle.center = rebase(circle.center),
            Geometry::Arc(arc) => arc.center = rebase(arc.center),
            Geometry::Polyline(poly) => {
                for point in &mut poly.points {
                    *point = rebase(*point);
                }
            }
        }
    }

    /// Axis-aligned bounds in grid units as `(min, max)`.
    pub fn bounds(&self) -> (GridPoint, GridPoint) {
        let extend = |acc: Option<(GridPoint, GridPoint)>, p: GridPoint| {
            Some(match acc {
                None => (p, p),
                Some((min, max)) => (
                    GridPoint::new(min.x.min(p.x), min.y.min(p.y)),
                    GridPoint::new(max.x.max(p.x), max.y.max(p.y)),
                ),
            })
        };
        match &self.geometry {
            Geometry::Line(line) => {
                let r = Rectangle::from_corners(line.start, line.end);
                (r.top_left, r.bottom_right)
            }
            Geometry::Rectangle(rect) => (rect.top_left, rect.bottom_right),
            Geometry::Circle(Circle { center, radius }) | Geometry::Arc(Arc { center, radius, .. }) => (
                GridPoint::new(center.x - radius, center.y - radius),
                GridPoint::new(center.x + radius, center.y + radius),
            ),
            Geometry::Polyline(poly) => poly
                .points
                .iter()
                .copied()
                .fold(None, extend)
                .unwrap_or_default(),
        }
    }

    /// Assign a new id, regenerating segment ids to match.
    pub fn reassign_id(&mut self, id: String) {
        self.id = id;
        let entity_id = self.id.clone();
        if let Some(poly) = self.as_polyline_mut() {
            poly.regenerate_segment_ids(&entity_id);
        }
    }
}

pub(crate) fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    Coordinate(*value).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn line(id: &str, start: (f64, f64), end: (f64, f64)) -> Entity {
        Entity::new(
            id,
            Geometry::Line(Line {
                start: start.into(),
                end: end.into(),
            }),
            "#00ff88",
        )
    }

    #[test]
    fn test_entity_id_number() {
        assert_eq!(entity_id(7), "entity_7");
        assert_eq!(entity_id_number("entity_42"), Some(42));
        assert_eq!(entity_id_number("entity_x"), None);
        assert_eq!(entity_id_number("shape_3"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let entity = line("entity_1", (2.0, 2.0), (5.0, 5.0));
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(
            json,
            r##"{"id":"entity_1","type":"line","start":[2,2],"end":[5,5],"metadata":{"color":"#00ff88"}}"##
        );
    }

    #[test]
    fn test_deserialize_rectangle() {
        let json = r#"{"id":"entity_3","type":"rectangle","topLeft":[1,2],"bottomRight":[4,6],"metadata":{"color":"red","layer":"a"}}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind(), EntityKind::Rectangle);
        assert_eq!(entity.color(), Some("red"));
        let keys: Vec<&String> = entity.metadata.keys().collect();
        assert_eq!(keys, ["color", "layer"]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"id":"entity_3","type":"spline","points":[]}"#;
        assert!(serde_json::from_str::<Entity>(json).is_err());
    }

    #[test]
    fn test_translate_rectangle_keeps_order() {
        let mut entity = Entity::new(
            "entity_1",
            Geometry::Rectangle(Rectangle::from_corners(GridPoint::new(7.0, 5.0), GridPoint::new(2.0, 2.0))),
            "#fff",
        );
        entity.translate(GridDelta::new(-3, 4));
        let Geometry::Rectangle(rect) = &entity.geometry else { panic!("not a rectangle") };
        assert_eq!(rect.top_left, GridPoint::new(-1.0, 6.0));
        assert_eq!(rect.bottom_right, GridPoint::new(4.0, 9.0));
        assert!(rect.is_canonical());
    }

    #[test]
    fn test_translate_circle_moves_center_only() {
        let mut entity = Entity::new(
            "entity_1",
            Geometry::Circle(Circle {
                center: GridPoint::new(1.0, 1.0),
                radius: 2.5,
            }),
            "#fff",
        );
        entity.translate(GridDelta::new(2, 0));
        let Geometry::Circle(circle) = &entity.geometry else { panic!("not a circle") };
        assert_eq!(circle.center, GridPoint::new(3.0, 1.0));
        assert!((circle.radius - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rebase_line() {
        let mut entity = line("entity_1", (2.0, 2.0), (5.0, 5.0));
        let old = GridTransform::new(20.0, Point::ZERO);
        let new = GridTransform::new(20.0, Point::new(100.0, 100.0));
        entity.rebase(&old, &new);
        let Geometry::Line(l) = &entity.geometry else { panic!("not a line") };
        assert_eq!(l.start, GridPoint::new(-3.0, -3.0));
        assert_eq!(l.end, GridPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_rebase_leaves_radius() {
        let mut entity = Entity::new(
            "entity_1",
            Geometry::Arc(Arc {
                center: GridPoint::new(4.0, 4.0),
                radius: 1.5,
                start_angle: 0.0,
                end_angle: std::f64::consts::FRAC_PI_2,
            }),
            "#fff",
        );
        let old = GridTransform::new(20.0, Point::ZERO);
        let new = GridTransform::new(20.0, Point::new(40.0, -20.0));
        entity.rebase(&old, &new);
        let Geometry::Arc(arc) = &entity.geometry else { panic!("not an arc") };
        assert_eq!(arc.center, GridPoint::new(2.0, 5.0));
        assert!((arc.radius - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds() {
        let entity = Entity::new(
            "entity_1",
            Geometry::Circle(Circle {
                center: GridPoint::new(0.0, 0.0),
                radius: 2.0,
            }),
            "#fff",
        );
        assert_eq!(entity.bounds(), (GridPoint::new(-2.0, -2.0), GridPoint::new(2.0, 2.0)));
    }
}
