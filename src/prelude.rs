//! Recommended API entrypoints grouped by abstraction level.
//!
//! `dx` is the stable default for applications that declare models and drive
//! lifecycle operations. `advanced` is an explicit escape hatch for the
//! storage internals.

pub mod dx {
    //! Stable high-level surface: model declaration, sessions, lifecycle
    //! operations, restore options, and the validation adapters.
    pub use crate::validate::{validate_reference_live, validate_unique};
    pub use crate::{
        AssociationDescriptor, Cardinality, CascadePolicy, Column, DataType, ModelDescriptor,
        ModelRegistry, Record, ReferenceDescriptor, RestoreOptions, Result, Session, StoreError,
        Value, WindowRange,
    };
}

pub mod advanced {
    //! Escape hatch for storage internals: the host-store contract, the
    //! bundled in-memory store, and raw query composition.
    pub use crate::query::{CmpOp, Predicate, Scope, Selection};
    pub use crate::storage::{Backend, MemoryBackend, Table, TableSchema};
    pub use crate::transaction::Change;
}
