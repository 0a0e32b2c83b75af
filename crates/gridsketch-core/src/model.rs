//! The in-memory entity model.

use crate::constraint::{Constraint, ConstraintKind, ConstraintRef, generate_constraint_id};
use crate::grid::{GridDelta, GridPoint, GridTransform};
use crate::history::Snapshot;
use crate::shapes::{COLOR_KEY, Entity, entity_id, entity_id_number};
use crate::tools::ShapeDraft;
use kurbo::Point;
use serde_json::Value;
use thiserror::Error;

/// Errors for rejected model operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Entity {0} is not a polyline")]
    NotAPolyline(String),
    #[error("Segment {index} out of range for {entity}")]
    SegmentOutOfRange { entity: String, index: usize },
    #[error("Shape has no extent")]
    DegenerateShape,
    #[error("Polyline needs at least {required} points, has {actual}")]
    TooFewPoints { required: usize, actual: usize },
    #[error("Constraint needs at least one participant")]
    EmptyConstraint,
    #[error("Constraint not found: {0}")]
    ConstraintNotFound(String),
    #[error("{0} constraints require a numeric value")]
    MissingConstraintValue(ConstraintKind),
    #[error("{0} constraints do not take a value")]
    UnexpectedConstraintValue(ConstraintKind),
    #[error("Metadata key must not be empty")]
    EmptyMetadataKey,
    #[error("The color key cannot be removed")]
    ColorKeyRequired,
}

/// Next free `entity_<N>` number: one past the largest numeric suffix.
pub fn next_entity_number(entities: &[Entity]) -> u64 {
    entities
        .iter()
        .filter_map(|e| entity_id_number(&e.id))
        .max()
        .map_or(1, |n| n + 1)
}

/// Entities (in z-order) and constraints, with the id counter and palette cursor.
///
/// The id counter starts at 1 and only moves forward, except on [`clear`](Self::clear).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityModel {
    entities: Vec<Entity>,
    constraints: Vec<Constraint>,
    id_counter: u64,
    color_index: usize,
}

impl Default for EntityModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityModel {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            constraints: Vec::new(),
            id_counter: 1,
            color_index: 0,
        }
    }

    /// Build a model from already repaired entities and constraints.
    pub fn from_parts(entities: Vec<Entity>, constraints: Vec<Constraint>) -> Self {
        let id_counter = next_entity_number(&entities);
        Self {
            entities,
            constraints,
            id_counter,
            color_index: 0,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn id_counter(&self) -> u64 {
        self.id_counter
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entity(id).is_some()
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    fn entity_mut(&mut self, id: &str) -> Result<&mut Entity, ModelError> {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ModelError::EntityNotFound(id.to_string()))
    }

    fn next_id(&mut self) -> String {
        let id = entity_id(self.id_counter);
        self.id_counter += 1;
        id
    }

    fn next_color(&mut self, palette: &[String]) -> String {
        let color = palette
            .get(self.color_index % palette.len().max(1))
            .cloned()
            .unwrap_or_else(|| crate::config::DEFAULT_PALETTE[0].to_string());
        self.color_index += 1;
        color
    }

    /// Commit a draft as a new entity and return its id.
    pub fn create_entity(
        &mut self,
        draft: &ShapeDraft,
        grid: &GridTransform,
        palette: &[String],
    ) -> Result<String, ModelError> {
        if draft.is_degenerate() {
            return Err(ModelError::DegenerateShape);
        }
        let id = self.next_id();
        let color = self.next_color(palette);
        let geometry = draft.to_geometry(&id, grid);
        log::debug!("created {} {}", draft.kind().as_str(), id);
        self.entities.push(Entity::new(id.clone(), geometry, &color));
        Ok(id)
    }

    /// Remove an entity and every constraint that references it.
    pub fn delete_entity(&mut self, id: &str) -> Result<Entity, ModelError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ModelError::EntityNotFound(id.to_string()))?;
        let removed = self.entities.remove(index);
        let before = self.constraints.len();
        self.constraints.retain(|c| !c.references_entity(id));
        let pruned = before - self.constraints.len();
        if pruned > 0 {
            log::debug!("pruned {pruned} constraint(s) referencing {id}");
        }
        Ok(removed)
    }

    /// Translate an entity by whole grid units.
    pub fn move_entity(&mut self, id: &str, delta: GridDelta) -> Result<(), ModelError> {
        let entity = self.entity_mut(id)?;
        if !delta.is_zero() {
            entity.translate(delta);
        }
        Ok(())
    }

    /// Put an entity back exactly as it was (used to cancel a drag).
    pub fn restore_entity(&mut self, entity: Entity) -> Result<(), ModelError> {
        let slot = self.entity_mut(&entity.id)?;
        *slot = entity;
        Ok(())
    }

    pub fn set_entity_metadata(&mut self, id: &str, key: &str, value: Value) -> Result<(), ModelError> {
        if key.is_empty() {
            return Err(ModelError::EmptyMetadataKey);
        }
        self.entity_mut(id)?.metadata.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a non-color metadata key. Returns the removed value.
    pub fn remove_entity_metadata(&mut self, id: &str, key: &str) -> Result<Option<Value>, ModelError> {
        if key == COLOR_KEY {
            return Err(ModelError::ColorKeyRequired);
        }
        Ok(self.entity_mut(id)?.metadata.shift_remove(key))
    }

    pub fn set_segment_metadata(
        &mut self,
        id: &str,
        index: usize,
        key: &str,
        value: Value,
    ) -> Result<(), ModelError> {
        if key.is_empty() {
            return Err(ModelError::EmptyMetadataKey);
        }
        let segment = self.segment_mut(id, index)?;
        segment.metadata.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove a segment metadata key. Removing `color` falls back to the
    /// parent entity's color.
    pub fn remove_segment_metadata(&mut self, id: &str, index: usize, key: &str) -> Result<Option<Value>, ModelError> {
        Ok(self.segment_mut(id, index)?.metadata.shift_remove(key))
    }

    fn segment_mut(&mut self, id: &str, index: usize) -> Result<&mut crate::shapes::Segment, ModelError> {
        let entity = self.entity_mut(id)?;
        let poly = entity
            .as_polyline_mut()
            .ok_or_else(|| ModelError::NotAPolyline(id.to_string()))?;
        poly.segments.get_mut(index).ok_or_else(|| ModelError::SegmentOutOfRange {
            entity: id.to_string(),
            index,
        })
    }

    /// Open or close a polyline. Closing requires at least three points.
    pub fn set_closed(&mut self, id: &str, closed: bool) -> Result<(), ModelError> {
        let entity = self.entity_mut(id)?;
        let entity_id = entity.id.clone();
        let poly = entity
            .as_polyline_mut()
            .ok_or_else(|| ModelError::NotAPolyline(id.to_string()))?;
        if closed && poly.points.len() < 3 {
            return Err(ModelError::TooFewPoints {
                required: 3,
                actual: poly.points.len(),
            });
        }
        poly.set_closed(&entity_id, closed);
        Ok(())
    }

    fn check_reference(&self, reference: &ConstraintRef) -> Result<(), ModelError> {
        let entity = self
            .entity(reference.entity_id())
            .ok_or_else(|| ModelError::EntityNotFound(reference.entity_id().to_string()))?;
        if let Some(index) = reference.segment() {
            if entity.as_polyline().is_none() {
                return Err(ModelError::NotAPolyline(entity.id.clone()));
            }
            if index >= entity.segment_count() {
                return Err(ModelError::SegmentOutOfRange {
                    entity: entity.id.clone(),
                    index,
                });
            }
        }
        Ok(())
    }

    /// Declare a constraint between existing entities/segments.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        references: Vec<ConstraintRef>,
        value: Option<f64>,
    ) -> Result<String, ModelError> {
        if references.is_empty() {
            return Err(ModelError::EmptyConstraint);
        }
        for reference in &references {
            self.check_reference(reference)?;
        }
        let id = generate_constraint_id(&self.constraints);
        let constraint = Constraint::new(id.clone(), kind, references, value)?;
        self.constraints.push(constraint);
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: &str) -> Result<Constraint, ModelError> {
        let index = self
            .constraints
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ModelError::ConstraintNotFound(id.to_string()))?;
        Ok(self.constraints.remove(index))
    }

    /// Remove everything and reset the id counter to 1.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.constraints.clear();
        self.id_counter = 1;
    }

    /// Insert copies of `entities` with fresh ids, offset by `offset`.
    ///
    /// Returns the new ids in insertion order.
    pub fn paste(&mut self, entities: &[Entity], offset: GridDelta) -> Vec<String> {
        let mut ids = Vec::with_capacity(entities.len());
        for source in entities {
            let mut copy = source.clone();
            let id = self.next_id();
            copy.reassign_id(id.clone());
            copy.translate(offset);
            self.entities.push(copy);
            ids.push(id);
        }
        ids
    }

    /// Rewrite stored coordinates for an origin move; view positions are kept.
    pub fn relocate_origin(&mut self, old: &GridTransform, new: &GridTransform) {
        for entity in &mut self.entities {
            entity.rebase(old, new);
        }
    }

    /// Topmost entity (last in z-order) under a view-space point.
    pub fn entity_at(&self, point: Point, grid: &GridTransform, tolerance: f64) -> Option<&Entity> {
        self.entities
            .iter()
            .rev()
            .find(|e| e.hit_test(point, grid, tolerance))
    }

    /// Bounds of the whole drawing in grid units.
    pub fn bounds(&self) -> Option<(GridPoint, GridPoint)> {
        self.entities.iter().map(Entity::bounds).reduce(|(amin, amax), (bmin, bmax)| {
            (
                GridPoint::new(amin.x.min(bmin.x), amin.y.min(bmin.y)),
                GridPoint::new(amax.x.max(bmax.x), amax.y.max(bmax.y)),
            )
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.entities.clone(),
            constraints: self.constraints.clone(),
            id_counter: self.id_counter,
            origin: None,
        }
    }

    /// Restore a snapshot. The id counter never moves backwards.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.entities = snapshot.entities;
        self.constraints = snapshot.constraints;
        self.id_counter = self.id_counter.max(snapshot.id_counter);
    }

    /// Replace the contents wholesale after a validated text edit or remote
    /// update. The counter becomes `max(current, max suffix + 1)`.
    pub fn replace(&mut self, entities: Vec<Entity>, constraints: Vec<Constraint>) {
        self.id_counter = self.id_counter.max(next_entity_number(&entities));
        self.entities = entities;
        self.constraints = constraints;
    }
}
