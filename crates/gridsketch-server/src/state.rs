//! Shared application state.

use crate::config::ServerConfig;
use crate::error::StartupError;
use gridsketch_core::FileStorage;
use gridsketch_core::document::{Document, now_timestamp};
use gridsketch_core::model::next_entity_number;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// The drawing shared with editors and automation clients, with the entity id
/// counter that outlives deletions.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    pub document: Document,
    pub next_entity: u64,
}

impl LiveDocument {
    pub fn new(document: Document) -> Self {
        Self {
            next_entity: next_entity_number(&document.entities),
            document,
        }
    }

    /// Swap in a validated document. The counter never moves backwards.
    pub fn replace(&mut self, document: Document) {
        self.next_entity = self.next_entity.max(next_entity_number(&document.entities));
        self.document = document;
    }

    /// Empty drawing: the counter starts over at 1.
    pub fn reset_ids(&mut self) {
        self.next_entity = next_entity_number(&self.document.entities);
    }
}

pub struct AppState {
    pub document: RwLock<LiveDocument>,
    /// Saved drawings (`saves/`).
    pub saves: FileStorage,
    /// Exported PNG snapshots.
    pub exports_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self, StartupError> {
        let exports_dir = config.exports_dir();
        std::fs::create_dir_all(&exports_dir)?;
        let saves = FileStorage::new(config.saves_dir())?;
        let document = Document {
            timestamp: now_timestamp(),
            ..Document::default()
        };
        Ok(Self {
            document: RwLock::new(LiveDocument::new(document)),
            saves,
            exports_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsketch_core::document::default_entity_color;

    fn document(ids: &[&str]) -> Document {
        let entities: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "type": "line", "start": [0, 0], "end": [1, 0] }))
            .collect();
        Document::from_value(serde_json::json!({ "entities": entities }), default_entity_color())
            .unwrap()
            .0
    }

    #[test]
    fn test_counter_survives_deletion() {
        let mut live = LiveDocument::new(document(&["entity_1", "entity_2"]));
        assert_eq!(live.next_entity, 3);
        live.replace(document(&["entity_1"]));
        assert_eq!(live.next_entity, 3);
        live.replace(document(&[]));
        live.reset_ids();
        assert_eq!(live.next_entity, 1);
    }
}
