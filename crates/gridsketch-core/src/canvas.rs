//! The editor context: model, view, selection, history and document text.
//!
//! [`Canvas`] owns every piece of session state and is the only thing input
//! handlers talk to. Each model mutation regenerates the document text; a
//! text edit goes the other way through [`Canvas::apply_text_edit`] and does
//! not regenerate the text it came from.

use crate::camera::Camera;
use crate::config::{DEFAULT_PALETTE, EditorConfig};
use crate::constraint::{Constraint, ConstraintKind};
use crate::document::{Command, Document, DocumentError, RepairReport, SourceMap};
use crate::grid::{GridDelta, GridPoint, GridTransform};
use crate::history::{History, Snapshot};
use crate::input::{Key, Modifiers, MouseButton};
use crate::interaction::InteractionState;
use crate::model::{EntityModel, ModelError};
use crate::selection::{Selection, SelectionItem};
use crate::shapes::{COLOR_KEY, Entity, Metadata};
use crate::snap::{SnapResult, snap_to_grid};
use crate::tools::{ShapeDraft, ToolKind};
use kurbo::{Point, Vec2};
use serde_json::Value;
use std::ops::Range;

/// Result of feeding edited text back into the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEditOutcome {
    /// The text replaced the model.
    Applied(RepairReport),
    /// Not well-formed JSON; most likely the user is mid-edit.
    IgnoredParse,
    /// Well-formed but invalid; the model was kept.
    Rejected(DocumentError),
}

/// Read-only view of everything a renderer needs.
#[derive(Debug, Clone)]
pub struct RenderSnapshot<'a> {
    pub entities: &'a [Entity],
    pub constraints: &'a [Constraint],
    pub selection: &'a Selection,
    pub hovered: Option<&'a str>,
    /// Shape or polyline being drawn, in snapped view coordinates.
    pub draft: Option<ShapeDraft>,
    /// Grid intersection to highlight near the cursor.
    pub snap_indicator: Option<Point>,
    /// Origin in view space.
    pub origin: Point,
    pub grid_size: f64,
    pub zoom: f64,
    pub pan: Vec2,
}

/// A drawing session.
#[derive(Debug, Clone)]
pub struct Canvas {
    config: EditorConfig,
    model: EntityModel,
    camera: Camera,
    grid: GridTransform,
    history: History,
    selection: Selection,
    tool: ToolKind,
    state: InteractionState,
    /// Free-form document metadata, carried through text edits.
    metadata: Metadata,
    text: String,
    source_map: SourceMap,
    clipboard: Vec<Entity>,
    /// Bumped on every model change; watched by the remote sync.
    revision: u64,
    /// Last pointer position.
    cursor: Option<SnapResult>,
}

impl Canvas {
    pub fn new(config: EditorConfig) -> Self {
        let config = config.sanitized();
        let mut canvas = Self {
            camera: Camera::with_zoom_bounds(config.min_zoom, config.max_zoom),
            grid: GridTransform::new(config.grid_size, Point::ZERO),
            history: History::new(config.history_capacity),
            config,
            model: EntityModel::new(),
            selection: Selection::new(),
            tool: ToolKind::default(),
            state: InteractionState::Idle,
            metadata: Metadata::new(),
            text: String::new(),
            source_map: SourceMap::default(),
            clipboard: Vec::new(),
            revision: 0,
            cursor: None,
        };
        canvas.refresh_text();
        canvas
    }

    /// Open an existing document. Its grid size and origin take precedence
    /// over the configured grid size.
    pub fn from_document(config: EditorConfig, document: Document) -> Self {
        let mut canvas = Self::new(config);
        canvas.adopt(document);
        canvas.refresh_text();
        canvas
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn grid(&self) -> &GridTransform {
        &self.grid
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The document text as last generated or edited.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The current model as a document.
    pub fn document(&self) -> Document {
        Document::from_model(&self.model, &self.grid, &self.metadata)
    }

    fn default_color(&self) -> &str {
        self.config
            .palette
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PALETTE[0])
    }

    fn tolerance(&self) -> f64 {
        self.camera.screen_distance_to_view(self.config.hit_tolerance)
    }

    fn snap(&self, screen: Point) -> SnapResult {
        snap_to_grid(self.camera.screen_to_view(screen), self.grid.grid_size)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            origin: Some(self.grid.origin),
            ..self.model.snapshot()
        }
    }

    fn save_state(&mut self) {
        self.history.save_state(self.snapshot());
    }

    fn restore(&mut self, snapshot: Snapshot) {
        if let Some(origin) = snapshot.origin {
            self.grid.origin = origin;
        }
        self.model.restore(snapshot);
        self.touch();
    }

    /// Regenerate the text from the model.
    fn refresh_text(&mut self) {
        match self.document().to_text() {
            Ok(text) => {
                self.source_map = SourceMap::build(&text).unwrap_or_default();
                self.text = text;
            }
            Err(e) => log::warn!("failed to serialize document: {e}"),
        }
    }

    /// Bookkeeping after any model mutation.
    fn touch(&mut self) {
        self.revision += 1;
        self.selection.retain_existing(&self.model);
        self.refresh_text();
    }

    // --- pointer input -------------------------------------------------

    pub fn pointer_down(&mut self, screen: Point, button: MouseButton, modifiers: Modifiers) {
        let snap = self.snap(screen);
        self.cursor = Some(snap);

        match button {
            MouseButton::Middle => {
                self.cancel();
                self.state = InteractionState::Panning { last: screen };
                return;
            }
            MouseButton::Right => return,
            MouseButton::Left => {}
        }

        match &mut self.state {
            InteractionState::SettingOrigin => {
                self.state = InteractionState::Idle;
                self.set_origin(snap.point);
                self.set_tool(ToolKind::Select);
            }
            InteractionState::DrawingPolyline { points, hover } => {
                // A double-click delivers two presses on the same point.
                if points.last() != Some(&snap.point) {
                    points.push(snap.point);
                }
                *hover = None;
            }
            InteractionState::Idle => match self.tool {
                ToolKind::Select => self.press_select(snap, modifiers),
                ToolKind::Polyline => {
                    self.state = InteractionState::DrawingPolyline {
                        points: vec![snap.point],
                        hover: None,
                    };
                }
                tool => {
                    self.state = InteractionState::DrawingShape {
                        tool,
                        start: snap.point,
                        current: snap.point,
                    };
                }
            },
            InteractionState::DrawingShape { .. }
            | InteractionState::Dragging { .. }
            | InteractionState::Panning { .. } => {}
        }
    }

    /// Click with the select tool: select, narrow to a segment, or toggle
    /// with shift, and arm a drag.
    fn press_select(&mut self, snap: SnapResult, modifiers: Modifiers) {
        let tolerance = self.tolerance();
        let Some(entity) = self.model.entity_at(snap.raw, &self.grid, tolerance) else {
            if !modifiers.shift {
                self.selection.clear();
            }
            return;
        };
        let id = entity.id.clone();

        // Shift toggles whole entities; only a plain click narrows.
        if modifiers.shift {
            self.selection.toggle(SelectionItem::entity(&id));
            return;
        }

        let mut item = SelectionItem::entity(&id);
        if entity.as_polyline().is_some() && self.selection.is_sole(&id) {
            if let Some(index) = entity.segment_at(snap.raw, &self.grid, tolerance) {
                item = SelectionItem::segment(&id, index);
            }
        }
        let original = Box::new(entity.clone());
        self.selection.select_single(item);
        self.state = InteractionState::Dragging {
            entity_id: id,
            last: snap.point,
            before: None,
            original,
        };
    }

    pub fn pointer_move(&mut self, screen: Point, _modifiers: Modifiers) {
        let snap = self.snap(screen);
        self.cursor = Some(snap);

        match &mut self.state {
            InteractionState::Panning { last } => {
                let delta = screen - *last;
                *last = screen;
                self.camera.pan_by(delta);
            }
            InteractionState::DrawingShape { current, .. } => *current = snap.point,
            InteractionState::DrawingPolyline { hover, .. } => *hover = Some(snap.point),
            InteractionState::Dragging { .. } => self.drag_to(snap.point),
            InteractionState::Idle if self.tool == ToolKind::Select => {
                let hovered = self
                    .model
                    .entity_at(snap.raw, &self.grid, self.tolerance())
                    .map(|e| e.id.clone());
                self.selection.set_hovered(hovered);
            }
            InteractionState::Idle | InteractionState::SettingOrigin => {}
        }
    }

    /// Apply every whole grid unit of drag movement immediately.
    fn drag_to(&mut self, point: Point) {
        let InteractionState::Dragging {
            entity_id, last, before, ..
        } = &mut self.state
        else {
            return;
        };
        let delta = self.grid.delta_between(*last, point);
        if delta.is_zero() {
            return;
        }
        // One snapshot for the whole drag, captured before the first step and
        // committed on release.
        let moved = before.is_some();
        if !moved {
            *before = Some(Box::new(Snapshot {
                origin: Some(self.grid.origin),
                ..self.model.snapshot()
            }));
        }
        if let Err(e) = self.model.move_entity(entity_id, delta) {
            log::warn!("drag aborted: {e}");
            if let Some(snapshot) = before.take().filter(|_| moved) {
                self.history.save_state(*snapshot);
            }
            self.state = InteractionState::Idle;
            return;
        }
        *last = point;
        self.touch();
    }

    pub fn pointer_up(&mut self, screen: Point, button: MouseButton) {
        let snap = self.snap(screen);
        self.cursor = Some(snap);

        match std::mem::take(&mut self.state) {
            InteractionState::DrawingShape { tool, start, .. } if button == MouseButton::Left => {
                if let Some(draft) = ShapeDraft::from_drag(tool, start, snap.point) {
                    self.commit_draft(&draft);
                }
            }
            InteractionState::Dragging { before, .. } if button == MouseButton::Left => {
                if let Some(before) = before {
                    self.history.save_state(*before);
                }
            }
            InteractionState::Panning { .. } if button == MouseButton::Middle => {}
            other => self.state = other,
        }
    }

    /// Finishes an open polyline.
    pub fn double_click(&mut self, screen: Point) {
        self.cursor = Some(self.snap(screen));
        if matches!(self.state, InteractionState::DrawingPolyline { .. }) {
            self.finish_polyline();
        }
    }

    /// Zoom around a screen point.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        self.camera.zoom_at(screen, factor);
    }

    /// Mouse wheel over the canvas; negative `notches` scrolls up and zooms in.
    pub fn wheel(&mut self, screen: Point, notches: f64) {
        if self.camera.wheel_zoom(screen, notches) && self.state == InteractionState::Idle {
            // Hover tolerance changed with the zoom.
            self.pointer_move(screen, Modifiers::NONE);
        }
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.camera.pan_by(delta);
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
    }

    // --- keyboard -------------------------------------------------------

    /// Returns whether the key was handled.
    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> bool {
        match key {
            Key::Escape => {
                self.cancel();
                true
            }
            Key::Delete | Key::Backspace if !self.state.is_busy() => self.delete_selected() > 0,
            Key::Enter => self.finish_polyline().is_some(),
            Key::Z if modifiers.command() && modifiers.shift => self.redo(),
            Key::Z if modifiers.command() => self.undo(),
            Key::Y if modifiers.command() => self.redo(),
            Key::C if modifiers.command() => self.copy() > 0,
            Key::C if matches!(self.state, InteractionState::DrawingPolyline { .. }) => {
                self.close_polyline().is_some()
            }
            Key::V if modifiers.command() => !self.paste().is_empty(),
            _ => false,
        }
    }

    /// Abort any gesture in progress without committing anything. A drag
    /// already applied is rolled back; the history is left as it was.
    pub fn cancel(&mut self) {
        if let InteractionState::Dragging {
            original,
            before: Some(_),
            ..
        } = std::mem::take(&mut self.state)
        {
            if let Err(e) = self.model.restore_entity(*original) {
                log::warn!("could not roll back drag: {e}");
            }
            self.touch();
        }
    }

    // --- tools and drafts ----------------------------------------------

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.cancel();
        self.tool = tool;
        self.selection.clear_segments();
    }

    /// The next primary click places the origin.
    pub fn begin_set_origin(&mut self) {
        self.cancel();
        self.state = InteractionState::SettingOrigin;
    }

    /// Move the origin to a view-space point (snapped). Entities keep their
    /// view positions; only their stored coordinates change.
    pub fn set_origin(&mut self, view: Point) {
        let origin = snap_to_grid(view, self.grid.grid_size).point;
        if origin == self.grid.origin {
            return;
        }
        self.save_state();
        let new_grid = GridTransform::new(self.grid.grid_size, origin);
        self.model.relocate_origin(&self.grid, &new_grid);
        self.grid = new_grid;
        log::debug!("origin moved to {:?}", self.grid.origin_in_grid_units());
        self.touch();
    }

    fn commit_draft(&mut self, draft: &ShapeDraft) -> Option<String> {
        if draft.is_degenerate() {
            log::debug!("discarding empty {} draft", draft.kind().as_str());
            return None;
        }
        match self.undoable(|model, grid, palette| model.create_entity(draft, grid, palette)) {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("could not create entity: {e}");
                None
            }
        }
    }

    fn take_polyline(&mut self, required: usize) -> Option<Vec<Point>> {
        match &self.state {
            InteractionState::DrawingPolyline { points, .. } if points.len() >= required => {
                let points = points.clone();
                self.state = InteractionState::Idle;
                Some(points)
            }
            _ => None,
        }
    }

    /// Commit the polyline being drawn as an open polyline (two or more points).
    pub fn finish_polyline(&mut self) -> Option<String> {
        let points = self.take_polyline(2)?;
        self.commit_draft(&ShapeDraft::Polyline { points, closed: false })
    }

    /// Commit the polyline being drawn as a closed polyline (three or more points).
    pub fn close_polyline(&mut self) -> Option<String> {
        let points = self.take_polyline(3)?;
        self.commit_draft(&ShapeDraft::Polyline { points, closed: true })
    }

    // --- selection ------------------------------------------------------

    pub fn select(&mut self, item: SelectionItem) {
        self.selection.select_single(item);
    }

    pub fn toggle_selection(&mut self, item: SelectionItem) -> bool {
        self.selection.toggle(item)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Byte range of the primary selection's record in [`text`](Self::text).
    pub fn span_of_selection(&self) -> Option<Range<usize>> {
        let primary = self.selection.primary()?;
        self.source_map.span_of(&primary.entity_id)
    }

    /// Line of the primary selection's record, for scrolling the text view.
    pub fn line_of_selection(&self) -> Option<usize> {
        let primary = self.selection.primary()?;
        self.source_map.line_of(&self.text, &primary.entity_id)
    }

    // --- model edits ----------------------------------------------------

    /// Delete every selected entity (a selected segment deletes its polyline).
    pub fn delete_selected(&mut self) -> usize {
        let ids = self.selection.entity_ids(&self.model);
        if ids.is_empty() {
            return 0;
        }
        let before = self.snapshot();
        let mut deleted = 0;
        for id in &ids {
            match self.model.delete_entity(id) {
                Ok(_) => deleted += 1,
                Err(e) => log::warn!("delete skipped: {e}"),
            }
        }
        if deleted > 0 {
            self.history.save_state(before);
        }
        self.selection.clear();
        self.touch();
        deleted
    }

    pub fn set_entity_metadata(&mut self, id: &str, key: &str, value: Value) -> Result<(), ModelError> {
        self.model.set_entity_metadata(id, key, value)?;
        self.touch();
        Ok(())
    }

    pub fn set_entity_color(&mut self, id: &str, color: &str) -> Result<(), ModelError> {
        self.set_entity_metadata(id, COLOR_KEY, Value::String(color.to_string()))
    }

    pub fn remove_entity_metadata(&mut self, id: &str, key: &str) -> Result<Option<Value>, ModelError> {
        let removed = self.model.remove_entity_metadata(id, key)?;
        self.touch();
        Ok(removed)
    }

    pub fn set_segment_metadata(&mut self, id: &str, index: usize, key: &str, value: Value) -> Result<(), ModelError> {
        self.model.set_segment_metadata(id, index, key, value)?;
        self.touch();
        Ok(())
    }

    pub fn set_segment_color(&mut self, id: &str, index: usize, color: &str) -> Result<(), ModelError> {
        self.set_segment_metadata(id, index, COLOR_KEY, Value::String(color.to_string()))
    }

    pub fn remove_segment_metadata(&mut self, id: &str, index: usize, key: &str) -> Result<Option<Value>, ModelError> {
        let removed = self.model.remove_segment_metadata(id, index, key)?;
        self.touch();
        Ok(removed)
    }

    /// Run a model edit as one undoable step. The snapshot is recorded only
    /// when the edit succeeds, so a failed edit leaves the history untouched.
    fn undoable<T>(
        &mut self,
        edit: impl FnOnce(&mut EntityModel, &GridTransform, &[String]) -> Result<T, ModelError>,
    ) -> Result<T, ModelError> {
        let before = self.snapshot();
        let value = edit(&mut self.model, &self.grid, self.config.palette.as_slice())?;
        self.history.save_state(before);
        self.touch();
        Ok(value)
    }

    pub fn set_closed(&mut self, id: &str, closed: bool) -> Result<(), ModelError> {
        self.undoable(|model, _, _| model.set_closed(id, closed))
    }

    /// Declare a constraint over the current selection.
    pub fn add_constraint_from_selection(
        &mut self,
        kind: ConstraintKind,
        value: Option<f64>,
    ) -> Result<String, ModelError> {
        let references = self.selection.constraint_refs();
        if references.is_empty() {
            return Err(ModelError::EmptyConstraint);
        }
        self.undoable(|model, _, _| model.add_constraint(kind, references, value))
    }

    pub fn remove_constraint(&mut self, id: &str) -> Result<Constraint, ModelError> {
        self.undoable(|model, _, _| model.remove_constraint(id))
    }

    /// Remove everything and reset the id counter.
    pub fn clear(&mut self) {
        self.cancel();
        self.state = InteractionState::Idle;
        self.save_state();
        self.model.clear();
        self.selection.clear();
        self.selection.set_hovered(None);
        self.touch();
    }

    /// Copy the selected entities. Returns how many were copied.
    pub fn copy(&mut self) -> usize {
        let ids = self.selection.entity_ids(&self.model);
        if ids.is_empty() {
            return 0;
        }
        self.clipboard = ids
            .iter()
            .filter_map(|id| self.model.entity(id).cloned())
            .collect();
        self.clipboard.len()
    }

    /// Insert copies of the clipboard with fresh ids and select them.
    /// Repeated pastes cascade by the paste offset.
    pub fn paste(&mut self) -> Vec<String> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let offset = GridDelta::new(self.config.paste_offset, self.config.paste_offset);
        self.save_state();
        let ids = self.model.paste(&self.clipboard, offset);
        for entity in &mut self.clipboard {
            entity.translate(offset);
        }
        self.selection.clear();
        self.selection.extend(ids.iter().map(SelectionItem::entity));
        self.touch();
        ids
    }

    pub fn undo(&mut self) -> bool {
        self.cancel();
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.cancel();
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    // --- document synchronization --------------------------------------

    /// Replace the model from a validated document, keeping view state.
    fn adopt(&mut self, document: Document) {
        if matches!(self.state, InteractionState::Dragging { .. }) {
            self.state = InteractionState::Idle;
        }
        self.grid = document.grid();
        self.metadata = document.metadata;
        self.model.replace(document.entities, document.constraints);
        self.revision += 1;
        self.selection.retain_existing(&self.model);
    }

    /// Feed an edit of the document text back into the model.
    ///
    /// The edited text is kept as is. Unparsable text is ignored and an
    /// invalid document is rejected; in both cases the model is untouched.
    pub fn apply_text_edit(&mut self, text: &str) -> TextEditOutcome {
        self.text = text.to_string();
        self.source_map = SourceMap::build(text).unwrap_or_default();
        match Document::parse(text, self.default_color()) {
            Ok((document, report)) => {
                self.adopt(document);
                TextEditOutcome::Applied(report)
            }
            Err(DocumentError::Parse(e)) => {
                log::debug!("ignoring unparsable edit: {e}");
                TextEditOutcome::IgnoredParse
            }
            Err(e) => {
                log::info!("rejected document edit: {e}");
                TextEditOutcome::Rejected(e)
            }
        }
    }

    /// Overwrite the model with a document read from the remote store.
    pub fn apply_remote_document(&mut self, document: Document) {
        self.adopt(document);
        self.refresh_text();
    }

    /// Run an automation command through validation and repair. The change
    /// is one undoable step. Generated ids continue the model's id counter,
    /// and `clear_canvas` resets it like [`clear`](Self::clear).
    pub fn apply_command(&mut self, command: Value) -> Result<Value, DocumentError> {
        let command = Command::from_value(command)?;
        let action = command.action();
        let resets_ids = matches!(command, Command::ClearCanvas);
        let outcome = command
            .apply(&self.document(), self.default_color(), self.model.id_counter())
            .inspect_err(|e| {
                log::info!("rejected {action} command: {e}");
            })?;
        self.save_state();
        self.adopt(outcome.document);
        if resets_ids {
            self.model.clear();
        }
        self.refresh_text();
        Ok(outcome.result)
    }

    // --- rendering ------------------------------------------------------

    /// Snapped cursor position in grid units, for the coordinate readout.
    pub fn cursor_grid_position(&self) -> Option<GridPoint> {
        self.cursor.map(|snap| self.grid.normalize(snap.point))
    }

    pub fn render_snapshot(&self) -> RenderSnapshot<'_> {
        let threshold = self.camera.screen_distance_to_view(self.config.snap_threshold);
        RenderSnapshot {
            entities: self.model.entities(),
            constraints: self.model.constraints(),
            selection: &self.selection,
            hovered: self.selection.hovered(),
            draft: self.state.draft(),
            snap_indicator: self.cursor.filter(|snap| snap.within(threshold)).map(|snap| snap.point),
            origin: self.grid.origin,
            grid_size: self.grid.grid_size,
            zoom: self.camera.zoom,
            pan: self.camera.pan,
        }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}
