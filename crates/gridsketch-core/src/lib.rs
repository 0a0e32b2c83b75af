//! GridSketch Core Library
//!
//! Coordinate model, entity model, interaction state and document
//! synchronization for the GridSketch parametric drawing editor.

pub mod camera;
pub mod canvas;
pub mod config;
pub mod constraint;
pub mod document;
pub mod grid;
pub mod history;
pub mod input;
pub mod interaction;
pub mod model;
pub mod selection;
pub mod shapes;
pub mod snap;
pub mod storage;
pub mod sync;
pub mod tools;

pub use camera::Camera;
pub use canvas::{Canvas, RenderSnapshot, TextEditOutcome};
pub use config::EditorConfig;
pub use constraint::{Constraint, ConstraintKind, ConstraintRef};
pub use document::{Command, CommandOutcome, Document, DocumentError, RepairReport, SourceMap};
pub use grid::{GridDelta, GridPoint, GridTransform};
pub use history::{History, Snapshot};
pub use input::{Key, Modifiers, MouseButton};
pub use interaction::InteractionState;
pub use model::{EntityModel, ModelError};
pub use selection::{Selection, SelectionItem};
pub use shapes::{Entity, EntityKind, Geometry, Metadata};
pub use snap::{SnapResult, snap_to_grid};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageResult};
pub use sync::{HttpRemoteStore, MemoryRemoteStore, RemoteError, RemoteStore, RemoteSync};
pub use tools::{ShapeDraft, ToolKind};
