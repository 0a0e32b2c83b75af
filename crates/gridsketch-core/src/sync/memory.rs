//! In-memory remote store, for tests and offline sessions.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::document::Document;
use crate::storage::BoxFuture;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryRemoteStore {
    document: RwLock<Document>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

fn lock_error(e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Transport(format!("Lock error: {e}"))
}

impl MemoryRemoteStore {
    pub fn new(document: Document) -> Self {
        Self {
            document: RwLock::new(document),
            ..Self::default()
        }
    }

    /// Simulate the store becoming unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Overwrite the stored document, as another client would.
    pub fn set_document(&self, document: Document) -> RemoteResult<()> {
        *self.document.write().map_err(lock_error)? = document;
        Ok(())
    }

    pub fn document(&self) -> RemoteResult<Document> {
        Ok(self.document.read().map_err(lock_error)?.clone())
    }

    /// Number of successful `replace` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("store offline".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn fetch(&self) -> BoxFuture<'_, RemoteResult<Document>> {
        Box::pin(async move {
            self.check_online()?;
            self.document()
        })
    }

    fn replace(&self, document: &Document) -> BoxFuture<'_, RemoteResult<Document>> {
        let document = document.clone();
        Box::pin(async move {
            self.check_online()?;
            *self.document.write().map_err(lock_error)? = document.clone();
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(document)
        })
    }
}
