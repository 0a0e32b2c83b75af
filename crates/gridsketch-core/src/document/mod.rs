//! The textual document and its validation/repair pass.
//!
//! The model is serialized into a pretty-printed JSON document on every
//! mutation. Edits to that text come back through [`Document::parse`], which
//! validates the structure, rejects anything it cannot trust and repairs the
//! drift a hand edit typically introduces (segment lists, ids, colors,
//! dangling constraint references).

mod command;
mod spans;

pub use command::{Command, CommandOutcome};
pub use spans::SourceMap;

use crate::config::{DEFAULT_GRID_SIZE, DEFAULT_PALETTE};
use crate::constraint::Constraint;
use crate::grid::{GridPoint, GridTransform};
use crate::model::EntityModel;
use crate::shapes::{COLOR_KEY, Entity, Geometry, Metadata, Rectangle, serialize_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current document schema version.
pub const DOCUMENT_VERSION: &str = "1.0";

/// The only supported unit mode.
pub const GRID_UNITS: &str = "grid";

/// Errors from reading a document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    /// The text is not well-formed JSON.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Well-formed, but not a valid document.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl DocumentError {
    fn validation(message: impl Into<String>) -> Self {
        DocumentError::Validation(message.into())
    }
}

/// What the repair pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub segments_reconciled: usize,
    pub rectangles_canonicalized: usize,
    pub colors_added: usize,
    pub constraints_pruned: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// The serialized drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_grid_size", serialize_with = "serialize_number")]
    pub grid_size: f64,
    /// Origin in grid units.
    #[serde(default)]
    pub origin: GridPoint,
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_units() -> String {
    GRID_UNITS.to_string()
}

fn default_grid_size() -> f64 {
    DEFAULT_GRID_SIZE
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: default_version(),
            units: default_units(),
            grid_size: DEFAULT_GRID_SIZE,
            origin: GridPoint::ORIGIN,
            entities: Vec::new(),
            constraints: Vec::new(),
            metadata: Metadata::new(),
            timestamp: None,
        }
    }
}

/// Current time as RFC 3339, if the clock can be formatted.
pub fn now_timestamp() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

impl Document {
    /// Project a model into a document, stamped with the current time.
    pub fn from_model(model: &EntityModel, grid: &GridTransform, metadata: &Metadata) -> Self {
        Self {
            version: default_version(),
            units: default_units(),
            grid_size: grid.grid_size,
            origin: grid.origin_in_grid_units(),
            entities: model.entities().to_vec(),
            constraints: model.constraints().to_vec(),
            metadata: metadata.clone(),
            timestamp: now_timestamp(),
        }
    }

    /// The transform described by `gridSize` and `origin`.
    pub fn grid(&self) -> GridTransform {
        GridTransform::new(
            self.grid_size,
            GridTransform::origin_from_grid_units(self.origin, self.grid_size),
        )
    }

    /// Build a fresh model from the document's entities and constraints.
    pub fn to_model(&self) -> EntityModel {
        EntityModel::from_parts(self.entities.clone(), self.constraints.clone())
    }

    /// Pretty-printed JSON, keys in declaration order.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parse, validate and repair document text.
    ///
    /// `default_color` fills in entities whose metadata lacks a color.
    pub fn parse(text: &str, default_color: &str) -> Result<(Self, RepairReport), DocumentError> {
        let value: Value = serde_json::from_str(text).map_err(|e| DocumentError::Parse(e.to_string()))?;
        Self::from_value(value, default_color)
    }

    /// Validate and repair an already parsed JSON value.
    pub fn from_value(value: Value, default_color: &str) -> Result<(Self, RepairReport), DocumentError> {
        check_structure(&value)?;
        let mut document: Document =
            serde_json::from_value(value).map_err(|e| DocumentError::Validation(e.to_string()))?;
        document.validate()?;
        let report = document.repair(default_color);
        if !report.is_clean() {
            log::debug!("repaired document: {report:?}");
        }
        Ok((document, report))
    }

    /// Checks that would otherwise require trusting the input.
    fn validate(&self) -> Result<(), DocumentError> {
        if self.units != GRID_UNITS {
            return Err(DocumentError::validation(format!("unsupported units {:?}", self.units)));
        }
        if !(self.grid_size.is_finite() && self.grid_size > 0.0) {
            return Err(DocumentError::validation("gridSize must be a positive number"));
        }
        if !self.origin.is_finite() {
            return Err(DocumentError::validation("origin must be finite"));
        }

        let mut seen = HashSet::new();
        for entity in &self.entities {
            if entity.id.is_empty() {
                return Err(DocumentError::validation("entity id must not be empty"));
            }
            if !seen.insert(entity.id.as_str()) {
                return Err(DocumentError::validation(format!("duplicate entity id {}", entity.id)));
            }
            validate_geometry(entity)?;
        }
        Ok(())
    }

    /// Fix structural drift in place. Never fails.
    pub fn repair(&mut self, default_color: &str) -> RepairReport {
        let mut report = RepairReport::default();

        for entity in &mut self.entities {
            if !entity.metadata.get(COLOR_KEY).is_some_and(Value::is_string) {
                entity
                    .metadata
                    .insert(COLOR_KEY.to_string(), Value::String(default_color.to_string()));
                report.colors_added += 1;
            }
            let id = entity.id.clone();
            match &mut entity.geometry {
                Geometry::Polyline(poly) => {
                    if poly.reconcile_segments(&id) {
                        report.segments_reconciled += 1;
                    }
                }
                Geometry::Rectangle(rect) if !rect.is_canonical() => {
                    *rect = Rectangle::from_corners(rect.top_left, rect.bottom_right);
                    report.rectangles_canonicalized += 1;
                }
                _ => {}
            }
        }

        let entities = &self.entities;
        let before = self.constraints.len();
        self.constraints.retain(|constraint| {
            let dangling = constraint.references.iter().find(|r| {
                match entities.iter().find(|e| e.id == r.entity_id()) {
                    None => true,
                    Some(entity) => r.segment().is_some_and(|i| i >= entity.segment_count()),
                }
            });
            if let Some(reference) = dangling {
                log::debug!("pruning constraint {}: dangling reference {reference}", constraint.id);
                return false;
            }
            if constraint.references.is_empty() {
                log::debug!("pruning constraint {}: no participants", constraint.id);
                return false;
            }
            if let Err(e) = constraint.check_value() {
                log::debug!("pruning constraint {}: {e}", constraint.id);
                return false;
            }
            true
        });
        report.constraints_pruned = before - self.constraints.len();
        report
    }
}

/// Shallow structural check with readable messages, before typed decoding.
fn check_structure(value: &Value) -> Result<(), DocumentError> {
    let root = value
        .as_object()
        .ok_or_else(|| DocumentError::validation("document must be an object"))?;
    let entities = root
        .get("entities")
        .and_then(Value::as_array)
        .ok_or_else(|| DocumentError::validation("missing or invalid entities array"))?;
    for (index, entity) in entities.iter().enumerate() {
        let entity = entity
            .as_object()
            .ok_or_else(|| DocumentError::validation(format!("entity {index} is not an object")))?;
        if !entity.get("id").is_some_and(Value::is_string) {
            return Err(DocumentError::validation(format!("entity {index} has no string id")));
        }
        if !entity.get("type").is_some_and(Value::is_string) {
            return Err(DocumentError::validation(format!("entity {index} has no string type")));
        }
    }
    if root.get("constraints").is_some_and(|c| !c.is_array()) {
        return Err(DocumentError::validation("invalid constraints array"));
    }
    Ok(())
}

fn validate_geometry(entity: &Entity) -> Result<(), DocumentError> {
    let invalid = |what: &str| DocumentError::validation(format!("{}: {what}", entity.id));
    fn finite(points: &[GridPoint]) -> bool {
        points.iter().all(GridPoint::is_finite)
    }
    match &entity.geometry {
        Geometry::Line(line) if !finite(&[line.start, line.end]) => Err(invalid("non-finite coordinate")),
        Geometry::Rectangle(rect) if !finite(&[rect.top_left, rect.bottom_right]) => {
            Err(invalid("non-finite coordinate"))
        }
        Geometry::Circle(circle) if !(circle.center.is_finite() && circle.radius.is_finite() && circle.radius > 0.0) => {
            Err(invalid("radius must be positive"))
        }
        Geometry::Arc(arc) => {
            if !(arc.center.is_finite() && arc.radius.is_finite() && arc.radius > 0.0) {
                Err(invalid("radius must be positive"))
            } else if !(arc.start_angle.is_finite() && arc.end_angle.is_finite()) {
                Err(invalid("non-finite angle"))
            } else {
                Ok(())
            }
        }
        Geometry::Polyline(poly) if poly.points.len() < 2 => Err(invalid("polyline needs at least 2 points")),
        Geometry::Polyline(poly) if poly.closed && poly.points.len() < 3 => {
            Err(invalid("closed polyline needs at least 3 points"))
        }
        Geometry::Polyline(poly) if !finite(&poly.points) => Err(invalid("non-finite coordinate")),
        _ => Ok(()),
    }
}

/// The first palette color, used when a document entity has none.
pub fn default_entity_color() -> &'static str {
    DEFAULT_PALETTE[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintKind, ConstraintRef};
    use crate::tools::ShapeDraft;
    use kurbo::Point;

    fn palette() -> Vec<String> {
        DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
    }

    fn sample_model() -> EntityModel {
        let grid = GridTransform::new(20.0, Point::ZERO);
        let mut model = EntityModel::new();
        let drafts = [
            ShapeDraft::Line {
                start: Point::new(40.0, 40.0),
                end: Point::new(100.0, 100.0),
            },
            ShapeDraft::Rectangle {
                start: Point::new(40.0, 40.0),
                end: Point::new(140.0, 100.0),
            },
            ShapeDraft::Circle {
                center: Point::new(60.0, 60.0),
                edge: Point::new(110.0, 60.0),
            },
            ShapeDraft::Polyline {
                points: vec![Point::ZERO, Point::new(40.0, 0.0), Point::new(40.0, 40.0)],
                closed: true,
            },
        ];
        for draft in &drafts {
            model.create_entity(draft, &grid, &palette()).unwrap();
        }
        model
            .add_constraint(
                ConstraintKind::Distance,
                vec![
                    ConstraintRef::Entity("entity_1".into()),
                    ConstraintRef::Segment {
                        entity: "entity_4".into(),
                        segment: 2,
                    },
                ],
                Some(4.5),
            )
            .unwrap();
        model
    }

    fn parse(text: &str) -> Result<(Document, RepairReport), DocumentError> {
        Document::parse(text, default_entity_color())
    }

    #[test]
    fn test_round_trip() {
        let model = sample_model();
        let grid = GridTransform::new(20.0, Point::new(40.0, 0.0));
        let document = Document::from_model(&model, &grid, &Metadata::new());
        let text = document.to_text().unwrap();

        let (parsed, report) = parse(&text).unwrap();
        assert!(report.is_clean());
        assert_eq!(parsed.entities, model.entities());
        assert_eq!(parsed.constraints, model.constraints());
        assert_eq!(parsed.origin, GridPoint::new(2.0, 0.0));
        assert_eq!(parsed.grid(), grid);
        assert_eq!(parsed.to_model().id_counter(), model.id_counter());
    }

    #[test]
    fn test_key_order_is_stable() {
        let document = Document::from_model(&sample_model(), &GridTransform::new(20.0, Point::ZERO), &Metadata::new());
        let value = document.to_value().unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["version", "units", "gridSize", "origin", "entities", "constraints", "metadata", "timestamp"]
        );
        assert_eq!(value["gridSize"], serde_json::json!(20));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse(r#"{"entities": [ {"id": "#), Err(DocumentError::Parse(_))));
    }

    #[test]
    fn test_structural_validation() {
        assert!(matches!(parse("[]"), Err(DocumentError::Validation(_))));
        assert!(matches!(parse(r#"{"entities": {}}"#), Err(DocumentError::Validation(_))));
        assert!(matches!(
            parse(r#"{"entities": [{"type": "line", "start": [0,0], "end": [1,1]}]}"#),
            Err(DocumentError::Validation(_))
        ));
        assert!(matches!(
            parse(r#"{"entities": [{"id": 3, "type": "line", "start": [0,0], "end": [1,1]}]}"#),
            Err(DocumentError::Validation(_))
        ));
        assert!(matches!(
            parse(r#"{"entities": [{"id": "entity_1", "type": "blob"}]}"#),
            Err(DocumentError::Validation(_))
        ));
        assert!(matches!(
            parse(r#"{"entities": [], "constraints": 4}"#),
            Err(DocumentError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let text = r#"{"entities": [
            {"id": "entity_1", "type": "line", "start": [0,0], "end": [1,1]},
            {"id": "entity_1", "type": "line", "start": [0,0], "end": [2,2]}
        ]}"#;
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("duplicate entity id entity_1"));
    }

    #[test]
    fn test_geometry_validation() {
        assert!(parse(r#"{"entities": [{"id": "entity_1", "type": "circle", "center": [0,0], "radius": 0}]}"#).is_err());
        assert!(parse(r#"{"entities": [{"id": "entity_1", "type": "polyline", "points": [[0,0]]}]}"#).is_err());
        assert!(
            parse(r#"{"entities": [{"id": "entity_1", "type": "polyline", "points": [[0,0],[2,0]], "closed": true}]}"#)
                .is_err()
        );
        assert!(parse(r#"{"units": "px", "entities": []}"#).is_err());
        assert!(parse(r#"{"gridSize": 0, "entities": []}"#).is_err());
    }

    #[test]
    fn test_repair_polyline_segments() {
        let text = r##"{"entities": [{
            "id": "entity_7", "type": "polyline",
            "points": [[0,0],[1,0],[1,1],[0,1]], "closed": false,
            "segments": [{"metadata": {"color": "#ff0000"}}, {"id": "entity_7_seg_1", "metadata": {}}]
        }]}"##;
        let (document, report) = parse(text).unwrap();
        assert_eq!(report.segments_reconciled, 1);
        let poly = document.entities[0].as_polyline().unwrap();
        assert_eq!(poly.segments.len(), 3);
        assert_eq!(poly.segments[0].id, "entity_7_seg_0");
        assert_eq!(poly.segments[0].color(), Some("#ff0000"));
        assert_eq!(poly.segments[2].id, "entity_7_seg_2");
        assert_eq!(document.to_model().id_counter(), 8);
    }

    #[test]
    fn test_repair_fills_missing_segment_ids() {
        let text = r#"{"entities": [{
            "id": "entity_2", "type": "polyline", "points": [[0,0],[1,0],[1,1]], "closed": false,
            "segments": [{"id": "entity_2_seg_0"}, {}]
        }]}"#;
        let (document, _) = parse(text).unwrap();
        let poly = document.entities[0].as_polyline().unwrap();
        assert_eq!(poly.segments[1].id, "entity_2_seg_1");
    }

    #[test]
    fn test_repair_colors_and_rectangles() {
        let text = r#"{"entities": [
            {"id": "entity_1", "type": "rectangle", "topLeft": [5,5], "bottomRight": [1,2]}
        ]}"#;
        let (document, report) = parse(text).unwrap();
        assert_eq!(report.colors_added, 1);
        assert_eq!(report.rectangles_canonicalized, 1);
        assert_eq!(document.entities[0].color(), Some("#00ff88"));
        let Geometry::Rectangle(rect) = &document.entities[0].geometry else { panic!("not a rectangle") };
        assert_eq!(rect.top_left, GridPoint::new(1.0, 2.0));
        assert_eq!(rect.bottom_right, GridPoint::new(5.0, 5.0));
    }

    #[test]
    fn test_repair_prunes_dangling_constraints() {
        let text = r#"{"entities": [
            {"id": "entity_1", "type": "line", "start": [0,0], "end": [1,1]}
        ], "constraints": [
            {"id": "constraint_1", "type": "horizontal", "entities": ["entity_1"]},
            {"id": "constraint_2", "type": "parallel", "entities": ["entity_1", "entity_9"]},
            {"id": "constraint_3", "type": "equal", "entities": [{"entity": "entity_1", "segment": 0}]},
            {"id": "constraint_4", "type": "distance", "entities": ["entity_1"]}
        ]}"#;
        let (document, report) = parse(text).unwrap();
        assert_eq!(report.constraints_pruned, 3);
        assert_eq!(document.constraints.len(), 1);
        assert_eq!(document.constraints[0].id, "constraint_1");
    }

    #[test]
    fn test_counter_from_max_suffix() {
        let text = r#"{"entities": [
            {"id": "entity_3", "type": "line", "start": [0,0], "end": [1,1]},
            {"id": "custom", "type": "line", "start": [0,0], "end": [1,1]},
            {"id": "entity_12", "type": "line", "start": [0,0], "end": [1,1]}
        ]}"#;
        let (document, _) = parse(text).unwrap();
        assert_eq!(document.to_model().id_counter(), 13);
    }
}
