//! Debounced push and periodic poll against a [`RemoteStore`].

use super::RemoteStore;
use crate::canvas::Canvas;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::shapes::Entity;
use std::time::{Duration, Instant};

/// What a [`RemoteSync::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTick {
    pub pushed: bool,
    pub pulled: bool,
}

/// Remote reconciliation state.
///
/// Time is passed in explicitly so the host loop (and tests) decide the clock.
#[derive(Debug, Clone)]
pub struct RemoteSync {
    debounce: Duration,
    poll_interval: Duration,
    /// Time of the last local change not yet pushed.
    pending_since: Option<Instant>,
    last_poll: Option<Instant>,
    /// Entities of the last document read from or written to the store.
    last_remote: Option<Vec<Entity>>,
    /// Canvas revision already accounted for.
    seen_revision: u64,
}

impl RemoteSync {
    pub fn new(debounce: Duration, poll_interval: Duration) -> Self {
        Self {
            debounce,
            poll_interval,
            pending_since: None,
            last_poll: None,
            last_remote: None,
            seen_revision: 0,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.remote_debounce(), config.remote_poll_interval())
    }

    /// Record a local change. Every change restarts the quiet period.
    pub fn mark_changed(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    pub fn has_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn should_push(&self, now: Instant) -> bool {
        self.pending_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.debounce)
    }

    pub fn should_poll(&self, now: Instant) -> bool {
        match self.last_poll {
            Some(last) => now.saturating_duration_since(last) >= self.poll_interval,
            None => true,
        }
    }

    /// Write `document` to the store. A failure is logged and the push is
    /// retried after the next quiet period.
    pub async fn push<S: RemoteStore + ?Sized>(&mut self, store: &S, document: &Document, now: Instant) -> bool {
        match store.replace(document).await {
            Ok(stored) => {
                self.last_remote = Some(stored.entities);
                self.pending_since = None;
                true
            }
            Err(e) => {
                log::warn!("remote push failed: {e}");
                self.pending_since = Some(now);
                false
            }
        }
    }

    /// Read the store. Returns the remote document only if its entities
    /// differ from the last known remote state.
    pub async fn poll<S: RemoteStore + ?Sized>(&mut self, store: &S, now: Instant) -> Option<Document> {
        self.last_poll = Some(now);
        let document = match store.fetch().await {
            Ok(document) => document,
            Err(e) => {
                log::warn!("remote poll failed: {e}");
                return None;
            }
        };
        if self.last_remote.as_ref() == Some(&document.entities) {
            return None;
        }
        log::info!("remote document changed, adopting {} entities", document.entities.len());
        self.last_remote = Some(document.entities.clone());
        // The remote state wins over local edits not yet pushed.
        self.pending_since = None;
        Some(document)
    }

    /// One step of the sync loop for `canvas`.
    pub async fn tick<S: RemoteStore + ?Sized>(&mut self, canvas: &mut Canvas, store: &S, now: Instant) -> SyncTick {
        let mut tick = SyncTick::default();
        if canvas.revision() != self.seen_revision {
            self.seen_revision = canvas.revision();
            self.mark_changed(now);
        }
        if self.should_push(now) {
            tick.pushed = self.push(store, &canvas.document(), now).await;
        }
        if self.should_poll(now) {
            if let Some(document) = self.poll(store, now).await {
                canvas.apply_remote_document(document);
                tick.pulled = true;
            }
            // Adopting the remote state is not a local change.
            self.seen_revision = canvas.revision();
        }
        tick
    }
}

impl Default for RemoteSync {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Modifiers, MouseButton};
    use crate::storage::block_on;
    use crate::sync::MemoryRemoteStore;
    use crate::tools::ToolKind;
    use kurbo::Point;

    fn draw_line(canvas: &mut Canvas, from: (f64, f64), to: (f64, f64)) {
        canvas.set_tool(ToolKind::Line);
        canvas.pointer_down(Point::new(from.0, from.1), MouseButton::Left, Modifiers::NONE);
        canvas.pointer_move(Point::new(to.0, to.1), Modifiers::NONE);
        canvas.pointer_up(Point::new(to.0, to.1), MouseButton::Left);
    }

    fn synced() -> (Canvas, MemoryRemoteStore, RemoteSync, Instant) {
        let mut canvas = Canvas::new(EditorConfig::default());
        let store = MemoryRemoteStore::default();
        let mut sync = RemoteSync::default();
        let start = Instant::now();
        // First poll: the empty remote document is adopted as the baseline.
        block_on(sync.tick(&mut canvas, &store, start));
        (canvas, store, sync, start)
    }

    #[test]
    fn test_push_is_debounced() {
        let (mut canvas, store, mut sync, start) = synced();

        draw_line(&mut canvas, (0.0, 0.0), (40.0, 0.0));
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(100)));
        assert!(!tick.pushed);

        draw_line(&mut canvas, (0.0, 20.0), (40.0, 20.0));
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(900)));
        assert!(!tick.pushed);

        // One second after the last change, both lines go out in one write.
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(1900)));
        assert!(tick.pushed);
        assert_eq!(store.writes(), 1);
        assert_eq!(store.document().unwrap().entities.len(), 2);
    }

    #[test]
    fn test_remote_change_overwrites_local() {
        let (mut canvas, store, mut sync, start) = synced();

        let mut remote = Document::default();
        let text = r#"{"entities": [{"id": "entity_7", "type": "line", "start": [0,0], "end": [1,1]}]}"#;
        remote.entities = Document::parse(text, "#ffffff").unwrap().0.entities;
        store.set_document(remote).unwrap();

        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_secs(2)));
        assert!(tick.pulled);
        assert!(canvas.model().contains("entity_7"));

        // Adopting the remote document is not pushed back.
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_secs(3)));
        assert!(!tick.pushed);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_unchanged_remote_is_ignored() {
        let (mut canvas, store, mut sync, start) = synced();
        draw_line(&mut canvas, (0.0, 0.0), (40.0, 0.0));
        block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(500)));
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(1600)));
        assert!(tick.pushed);

        // The next poll sees our own write and leaves the canvas alone.
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_secs(4)));
        assert!(!tick.pulled);
        assert_eq!(canvas.model().len(), 1);
    }

    #[test]
    fn test_push_failure_is_retried() {
        let (mut canvas, store, mut sync, start) = synced();
        store.set_offline(true);

        draw_line(&mut canvas, (0.0, 0.0), (40.0, 0.0));
        block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(100)));
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(1200)));
        assert!(!tick.pushed);
        assert!(sync.has_pending());
        assert_eq!(canvas.model().len(), 1);

        store.set_offline(false);
        let tick = block_on(sync.tick(&mut canvas, &store, start + Duration::from_millis(2300)));
        assert!(tick.pushed);
        assert_eq!(store.document().unwrap().entities.len(), 1);
    }
}
