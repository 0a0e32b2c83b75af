//! Declarative geometric constraints.
//!
//! Constraints are recorded, listed and pruned; nothing solves them.

use crate::model::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of generated constraint ids.
pub const CONSTRAINT_ID_PREFIX: &str = "constraint_";

/// Constraint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Coincident,
    Parallel,
    Perpendicular,
    Distance,
    Angle,
    Ratio,
    Horizontal,
    Vertical,
    Equal,
}

impl ConstraintKind {
    /// Distance, angle and ratio constraints carry a numeric value; the
    /// others must not.
    pub fn requires_value(self) -> bool {
        matches!(self, ConstraintKind::Distance | ConstraintKind::Angle | ConstraintKind::Ratio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Coincident => "coincident",
            ConstraintKind::Parallel => "parallel",
            ConstraintKind::Perpendicular => "perpendicular",
            ConstraintKind::Distance => "distance",
            ConstraintKind::Angle => "angle",
            ConstraintKind::Ratio => "ratio",
            ConstraintKind::Horizontal => "horizontal",
            ConstraintKind::Vertical => "vertical",
            ConstraintKind::Equal => "equal",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constraint participant: a whole entity or one segment of a polyline.
///
/// Serialized as a bare id string or as `{"entity": id, "segment": index}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintRef {
    Entity(String),
    Segment { entity: String, segment: usize },
}

impl ConstraintRef {
    pub fn entity_id(&self) -> &str {
        match self {
            ConstraintRef::Entity(id) => id,
            ConstraintRef::Segment { entity, .. } => entity,
        }
    }

    pub fn segment(&self) -> Option<usize> {
        match self {
            ConstraintRef::Entity(_) => None,
            ConstraintRef::Segment { segment, .. } => Some(*segment),
        }
    }
}

impl fmt::Display for ConstraintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintRef::Entity(id) => f.write_str(id),
            ConstraintRef::Segment { entity, segment } => {
                write!(f, "{entity} ({})", crate::shapes::segment_id(entity, *segment))
            }
        }
    }
}

/// A declared constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    #[serde(rename = "entities")]
    pub references: Vec<ConstraintRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Constraint {
    /// Build a constraint, checking the value rules.
    pub fn new(
        id: String,
        kind: ConstraintKind,
        references: Vec<ConstraintRef>,
        value: Option<f64>,
    ) -> Result<Self, ModelError> {
        let constraint = Self {
            id,
            kind,
            references,
            value,
        };
        constraint.check_value()?;
        Ok(constraint)
    }

    /// Enforce "value required for distance/angle/ratio, forbidden otherwise".
    pub fn check_value(&self) -> Result<(), ModelError> {
        match (self.kind.requires_value(), self.value) {
            (true, None) => Err(ModelError::MissingConstraintValue(self.kind)),
            (true, Some(v)) if !v.is_finite() => Err(ModelError::MissingConstraintValue(self.kind)),
            (false, Some(_)) => Err(ModelError::UnexpectedConstraintValue(self.kind)),
            _ => Ok(()),
        }
    }

    /// Whether any participant is (a segment of) the given entity.
    pub fn references_entity(&self, entity_id: &str) -> bool {
        self.references.iter().any(|r| r.entity_id() == entity_id)
    }

    /// Human-readable summary, e.g. `parallel: entity_1, entity_2 (entity_2_seg_1) = 3`.
    pub fn label(&self) -> String {
        let refs: Vec<String> = self.references.iter().map(ToString::to_string).collect();
        let mut text = format!("{}: {}", self.kind, refs.join(", "));
        if let Some(value) = self.value {
            text.push_str(&format!(" = {value}"));
        }
        text
    }
}

/// Generate a time-derived constraint id not present in `existing`.
pub fn generate_constraint_id<'a>(existing: impl IntoIterator<Item = &'a Constraint>) -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let base = format!("{CONSTRAINT_ID_PREFIX}{millis}");
    let taken: Vec<&str> = existing.into_iter().map(|c| c.id.as_str()).collect();
    if !taken.contains(&base.as_str()) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or(base)
}
