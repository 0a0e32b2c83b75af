//! Entity and segment selection.

use crate::constraint::ConstraintRef;
use crate::model::EntityModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A selected entity, or one segment of a selected polyline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
}

impl SelectionItem {
    pub fn entity(id: impl Into<String>) -> Self {
        Self {
            entity_id: id.into(),
            segment_index: None,
        }
    }

    pub fn segment(id: impl Into<String>, index: usize) -> Self {
        Self {
            entity_id: id.into(),
            segment_index: Some(index),
        }
    }

    pub fn to_constraint_ref(&self) -> ConstraintRef {
        match self.segment_index {
            None => ConstraintRef::Entity(self.entity_id.clone()),
            Some(segment) => ConstraintRef::Segment {
                entity: self.entity_id.clone(),
                segment,
            },
        }
    }
}

/// Current selection state.
///
/// `primary` drives the metadata editor; `items` is the full, deduplicated
/// selection set and always contains `primary` when there is one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    primary: Option<SelectionItem>,
    items: BTreeSet<SelectionItem>,
    hovered: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with a single item.
    pub fn select_single(&mut self, item: SelectionItem) {
        self.items.clear();
        self.items.insert(item.clone());
        self.primary = Some(item);
    }

    /// Toggle membership of an item. Returns whether it is now selected.
    pub fn toggle(&mut self, item: SelectionItem) -> bool {
        if self.items.remove(&item) {
            if self.primary.as_ref() == Some(&item) {
                self.primary = self.items.iter().next_back().cloned();
            }
            false
        } else {
            self.items.insert(item.clone());
            self.primary = Some(item);
            true
        }
    }

    /// Add items without toggling, making the last one primary.
    pub fn extend(&mut self, items: impl IntoIterator<Item = SelectionItem>) {
        for item in items {
            self.items.insert(item.clone());
            self.primary = Some(item);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.primary = None;
    }

    /// Drop segment-level selection, keeping the parent entities selected.
    pub fn clear_segments(&mut self) {
        self.items = std::mem::take(&mut self.items)
            .into_iter()
            .map(|item| SelectionItem::entity(item.entity_id))
            .collect();
        if let Some(primary) = &mut self.primary {
            primary.segment_index = None;
        }
    }

    /// Drop items whose entity or segment no longer exists.
    pub fn retain_existing(&mut self, model: &EntityModel) {
        let exists = |item: &SelectionItem| match model.entity(&item.entity_id) {
            None => false,
            Some(entity) => item.segment_index.is_none_or(|i| i < entity.segment_count()),
        };
        self.items.retain(|item| exists(item));
        if self.primary.as_ref().is_some_and(|p| !exists(p)) {
            self.primary = self.items.iter().next_back().cloned();
        }
        if self.hovered.as_ref().is_some_and(|id| !model.contains(id)) {
            self.hovered = None;
        }
    }

    pub fn primary(&self) -> Option<&SelectionItem> {
        self.primary.as_ref()
    }

    pub fn items(&self) -> impl Iterator<Item = &SelectionItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &SelectionItem) -> bool {
        self.items.contains(item)
    }

    /// Whether the entity, or any of its segments, is selected.
    pub fn is_entity_selected(&self, entity_id: &str) -> bool {
        self.items.iter().any(|item| item.entity_id == entity_id)
    }

    /// Whether the selection consists of exactly this entity (or one of its segments).
    pub fn is_sole(&self, entity_id: &str) -> bool {
        self.items.len() == 1 && self.is_entity_selected(entity_id)
    }

    /// Distinct selected entity ids, in z-order of the model.
    pub fn entity_ids(&self, model: &EntityModel) -> Vec<String> {
        model
            .entities()
            .iter()
            .filter(|e| self.is_entity_selected(&e.id))
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn constraint_refs(&self) -> Vec<ConstraintRef> {
        self.items.iter().map(SelectionItem::to_constraint_ref).collect()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn set_hovered(&mut self, id: Option<String>) {
        self.hovered = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_single_replaces() {
        let mut selection = Selection::new();
        selection.select_single(SelectionItem::entity("entity_1"));
        selection.select_single(SelectionItem::entity("entity_2"));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.primary(), Some(&SelectionItem::entity("entity_2")));
    }

    #[test]
    fn test_toggle_dedupes_pairs() {
        let mut selection = Selection::new();
        assert!(selection.toggle(SelectionItem::entity("entity_1")));
        assert!(selection.toggle(SelectionItem::segment("entity_1", 0)));
        assert_eq!(selection.len(), 2);
        assert!(!selection.toggle(SelectionItem::segment("entity_1", 0)));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.primary(), Some(&SelectionItem::entity("entity_1")));
        assert!(!selection.toggle(SelectionItem::entity("entity_1")));
        assert!(selection.is_empty());
        assert!(selection.primary().is_none());
    }

    #[test]
    fn test_clear_segments_keeps_parents() {
        let mut selection = Selection::new();
        selection.select_single(SelectionItem::segment("entity_3", 2));
        selection.clear_segments();
        assert!(selection.contains(&SelectionItem::entity("entity_3")));
        assert_eq!(selection.primary(), Some(&SelectionItem::entity("entity_3")));
    }

    #[test]
    fn test_is_sole() {
        let mut selection = Selection::new();
        selection.select_single(SelectionItem::segment("entity_3", 1));
        assert!(selection.is_sole("entity_3"));
        selection.toggle(SelectionItem::entity("entity_4"));
        assert!(!selection.is_sole("entity_3"));
    }

    #[test]
    fn test_constraint_refs() {
        let mut selection = Selection::new();
        selection.toggle(SelectionItem::entity("entity_1"));
        selection.toggle(SelectionItem::segment("entity_2", 1));
        assert_eq!(
            selection.constraint_refs(),
            vec![
                ConstraintRef::Entity("entity_1".into()),
                ConstraintRef::Segment {
                    entity: "entity_2".into(),
                    segment: 1
                },
            ]
        );
    }

    #[test]
    fn test_retain_existing() {
        let selection_model = EntityModel::new();
        let mut selection = Selection::new();
        selection.select_single(SelectionItem::entity("entity_1"));
        selection.set_hovered(Some("entity_1".into()));
        selection.retain_existing(&selection_model);
        assert!(selection.is_empty());
        assert!(selection.primary().is_none());
        assert!(selection.hovered().is_none());
    }
}
