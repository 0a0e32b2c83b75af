//! Synchronization with the external document store.
//!
//! The store is a plain key-value document holder with no transactional
//! guarantees. Local edits are pushed after a quiet period and the store is
//! polled on a fixed interval; a remote document whose entities differ from
//! the last known remote state overwrites the local model (last write wins,
//! local edits made while a poll is in flight are lost).

mod http;
mod memory;
mod scheduler;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;
pub use scheduler::{RemoteSync, SyncTick};

use crate::document::Document;
use crate::storage::BoxFuture;
use thiserror::Error;

/// Remote store failures. Logged by the scheduler, never fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Remote store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Remote store reported failure: {0}")]
    Unsuccessful(String),
    #[error("Invalid remote document: {0}")]
    InvalidDocument(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote document store.
pub trait RemoteStore: Send + Sync {
    /// Read the stored document.
    fn fetch(&self) -> BoxFuture<'_, RemoteResult<Document>>;

    /// Replace the stored document, returning what the store now holds.
    fn replace(&self, document: &Document) -> BoxFuture<'_, RemoteResult<Document>>;
}
