//! File-based storage: one pretty-printed JSON document per id.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::document::{Document, default_entity_color};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of stored documents.
pub const DOCUMENT_EXTENSION: &str = "json";

/// Stores documents as `<id>.json` files in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(|e| StorageError::Io(format!("Failed to create storage directory: {e}")))?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/gridsketch/drawings/`
    /// On Windows: `%LOCALAPPDATA%\gridsketch\drawings\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("gridsketch").join("drawings"))
    }

    /// File name for a document id (unsafe characters replaced by `_`).
    pub fn file_name(id: &str) -> String {
        let id = id.strip_suffix(".json").unwrap_or(id);
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{safe_id}.{DOCUMENT_EXTENSION}")
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.base_path.join(Self::file_name(id))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(&self, id: &str, document: &Document) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);
        let text = document.to_text();
        Box::pin(async move {
            let text = text.map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, text).map_err(|e| StorageError::Io(format!("Failed to write {}: {e}", path.display())))
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Document>> {
        let path = self.document_path(id);
        let id = id.to_string();
        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(id));
            }
            let text = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read {}: {e}", path.display())))?;
            let (document, report) = Document::parse(&text, default_entity_color())
                .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {e}", path.display())))?;
            if !report.is_clean() {
                log::info!("repaired {} on load: {report:?}", path.display());
            }
            Ok(document)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| StorageError::Io(format!("Failed to delete {}: {e}", path.display())))?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries =
                fs::read_dir(&base).map_err(|e| StorageError::Io(format!("Failed to read directory: {e}")))?;
            let mut ids: Vec<String> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION))
                .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.document_path(id);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block_on;
    use tempfile::tempdir;

    fn drawing() -> Document {
        let text = r#"{"entities": [
            {"id": "entity_1", "type": "polyline", "points": [[0,0],[2,0],[2,2]], "closed": true}
        ]}"#;
        Document::parse(text, default_entity_color()).unwrap().0
    }

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let doc = drawing();

        block_on(storage.save("plan", &doc)).unwrap();
        let loaded = block_on(storage.load("plan")).unwrap();

        assert_eq!(loaded.entities, doc.entities);
        assert!(dir.path().join("plan.json").exists());
    }

    #[test]
    fn test_file_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let result = block_on(storage.load("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_storage_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("broken.json"), r#"{"entities": 3}"#).unwrap();

        let result = block_on(storage.load("broken"));
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_file_storage_list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let doc = drawing();

        block_on(storage.save("doc2", &doc)).unwrap();
        block_on(storage.save("doc1.json", &doc)).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(block_on(storage.list()).unwrap(), vec!["doc1", "doc2"]);

        block_on(storage.delete("doc1")).unwrap();
        assert!(!block_on(storage.exists("doc1")).unwrap());
    }

    #[test]
    fn test_file_storage_sanitizes_id() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let doc = drawing();

        block_on(storage.save("../escape/doc:1", &doc)).unwrap();
        assert_eq!(FileStorage::file_name("../escape/doc:1"), "___escape_doc_1.json");
        assert!(block_on(storage.load("../escape/doc:1")).is_ok());
    }
}
