//! Reversible ("soft") deletion for records in a relational store.
//!
//! A deleted record keeps its storage row: its lifecycle column switches from
//! the "infinity" sentinel to a concrete timestamp, hiding it from normal
//! queries until it is either restored or permanently purged. The engine
//! drives the delete / restore / purge transitions inside host transactions,
//! evaluates time-bounded recovery windows, cascades through dependent
//! associations, and keeps denormalized dependent counts consistent across
//! nested cascades.
//!
//! Models are described declaratively in a [`ModelRegistry`] and operated on
//! through a [`Session`], which pairs the registry with any store
//! implementing [`Backend`] ([`MemoryBackend`] is bundled).
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use reprieve::{
//!     Column, DataType, MemoryBackend, ModelDescriptor, ModelRegistry, RestoreOptions,
//!     Session, Value,
//! };
//!
//! # fn main() -> reprieve::Result<()> {
//! let mut registry = ModelRegistry::new();
//! registry.register(
//!     ModelDescriptor::new("note", "notes")
//!         .column(Column::new("title", DataType::Text))
//!         .lifecycle("deleted_at")
//!         .touch("updated_at"),
//! );
//!
//! let session = Session::new(Arc::new(MemoryBackend::new()), registry);
//! session.migrate()?;
//!
//! let mut note = session.create("note", &[("title", Value::Text("draft".into()))])?;
//! session.destroy(&mut note)?;
//! assert!(note.is_deleted());
//! assert!(session.active("note")?.is_empty());
//! assert_eq!(session.with_deleted("note")?.len(), 1);
//!
//! session.restore(&mut note, &RestoreOptions::new())?;
//! assert!(!note.is_deleted());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod lifecycle;
pub mod model;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod validate;

// Re-export main types for convenience
pub use crate::core::{
    Column, DataType, RecordId, Result, Row, Schema, StoreError, Value, sentinel_timestamp,
};
pub use crate::lifecycle::{LifecycleEvent, RestoreOptions, Session, WindowRange};
pub use crate::model::{
    AssociationDescriptor, AssociationTarget, Cardinality, CascadePolicy, ModelDescriptor,
    ModelRegistry, Record, ReferenceDescriptor,
};
pub use crate::query::{CmpOp, Predicate, Scope, Selection};
pub use crate::storage::{Backend, MemoryBackend};
