//! The lifecycle state machine and its operation surface.
//!
//! A [`Session`] pairs a host [`Backend`] with a [`ModelRegistry`] and drives
//! every state transition inside one transaction scope: callbacks first, then
//! the raw column writes, then counter bookkeeping, cascading into dependent
//! records through their own operations where requested.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::{RecordId, Result, StoreError, Value, sentinel_timestamp};
use crate::lifecycle::callbacks::{Body, LifecycleEvent};
use crate::lifecycle::window::RestoreOptions;
use crate::lifecycle::{cascade, counters, window};
use crate::model::descriptor::{Cardinality, ModelDescriptor};
use crate::model::record::Record;
use crate::model::registry::ModelRegistry;
use crate::query::{CmpOp, Selection};
use crate::storage::{Backend, MemoryBackend};

pub struct Session {
    backend: Arc<dyn Backend>,
    registry: Arc<ModelRegistry>,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, registry: ModelRegistry) -> Self {
        Self {
            backend,
            registry: Arc::new(registry),
        }
    }

    /// A session over the process-wide shared in-memory store.
    pub fn with_global_backend(registry: ModelRegistry) -> Self {
        Self::new(MemoryBackend::global(), registry)
    }

    pub fn backend_ref(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn registry_ref(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Creates the backing tables for every registered model.
    pub fn migrate(&self) -> Result<()> {
        for model in self.registry.models() {
            if !self.backend.table_exists(model.table()) {
                self.backend.create_table(model.table_schema())?;
            }
        }
        Ok(())
    }

    /// Executes `op` inside a transaction scope: commit on `Ok`, rollback on
    /// `Err`. Nested calls share the enclosing transaction.
    pub fn transaction<T>(&self, op: impl FnOnce(&Session) -> Result<T>) -> Result<T> {
        self.backend.begin()?;
        match op(self) {
            Ok(value) => {
                if let Err(err) = self.backend.commit() {
                    let _ = self.backend.rollback();
                    return Err(err);
                }
                Ok(value)
            }
            Err(err) => {
                let _ = self.backend.rollback();
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Host-side record surface
    // ------------------------------------------------------------------

    /// Inserts a new active record and applies counter-cache increments for
    /// its populated counted references.
    pub fn create(&self, model: &str, attrs: &[(&str, Value)]) -> Result<Record> {
        let descriptor = self.registry.model(model)?;
        let mut record = Record::new(descriptor);
        let now = Utc::now();
        for column in descriptor.timestamp_columns() {
            record.set_attribute(column.clone(), Value::Timestamp(now));
        }
        for (name, value) in attrs {
            record.set_attribute(*name, value.clone());
        }

        let row = record.to_row(descriptor);
        self.transaction(|session| {
            let id = session.backend.insert(descriptor.table(), row)?;
            record.set_id(id);
            counters::adjust_by_foreign_key(&session.registry, session.backend.as_ref(), &record, 1)
        })?;
        debug!(model, id = ?record.id(), "created record");
        Ok(record)
    }

    /// Active-scope lookup by identity.
    pub fn find(&self, model: &str, id: RecordId) -> Result<Option<Record>> {
        let Some(record) = self.find_with_deleted(model, id)? else {
            return Ok(None);
        };
        let hidden = record
            .deletion_timestamp()
            .map(|stamp| stamp <= Utc::now())
            .unwrap_or(false);
        Ok(if hidden { None } else { Some(record) })
    }

    /// Lookup by identity with the default scope removed.
    pub fn find_with_deleted(&self, model: &str, id: RecordId) -> Result<Option<Record>> {
        let descriptor = self.registry.model(model)?;
        let row = self.backend.find(descriptor.table(), id)?;
        Ok(row.map(|row| Record::from_row(descriptor, id, row)))
    }

    /// A scoped selection over the model's table, ready for composition.
    pub fn selection(&self, model: &str) -> Result<Selection> {
        let descriptor = self.registry.model(model)?;
        let mut selection = Selection::new(descriptor.table());
        if let Some(column) = descriptor.lifecycle_column() {
            selection = selection.lifecycle(column);
        }
        Ok(selection)
    }

    pub fn select(&self, selection: &Selection) -> Result<Vec<Record>> {
        let descriptor = self.registry.model_by_table(selection.table())?;
        Ok(self
            .backend
            .select(selection)?
            .into_iter()
            .map(|(id, row)| Record::from_row(descriptor, id, row))
            .collect())
    }

    /// All currently active records of a model.
    pub fn active(&self, model: &str) -> Result<Vec<Record>> {
        self.select(&self.selection(model)?)
    }

    /// The full unfiltered set, soft-deleted rows included.
    pub fn with_deleted(&self, model: &str) -> Result<Vec<Record>> {
        self.select(&self.selection(model)?.with_deleted())
    }

    /// Exactly the soft-deleted records.
    pub fn only_deleted(&self, model: &str) -> Result<Vec<Record>> {
        self.select(&self.selection(model)?.only_deleted())
    }

    /// Alias for [`Session::only_deleted`].
    pub fn deleted(&self, model: &str) -> Result<Vec<Record>> {
        self.only_deleted(model)
    }

    /// Loads an owner-pointing reference into the record's association cache.
    /// Reads without the default scope so bookkeeping can still see a
    /// soft-deleted owner. Returns whether a target was found.
    pub fn load_reference(&self, record: &mut Record, name: &str) -> Result<bool> {
        let descriptor = self.registry.model(record.model())?;
        let reference = descriptor.find_reference(name).ok_or_else(|| {
            StoreError::ExecutionError(format!(
                "Model '{}' has no reference '{}'",
                descriptor.name(),
                name
            ))
        })?;
        let target = self.registry.model(&reference.target)?;
        let loaded = match record.attribute(&reference.foreign_key) {
            Some(Value::Integer(owner_id)) => {
                let owner_id = *owner_id;
                self.backend
                    .find(target.table(), owner_id)?
                    .map(|row| Record::from_row(target, owner_id, row))
            }
            _ => None,
        };
        let present = loaded.is_some();
        record.cache_single(name, loaded);
        Ok(present)
    }

    /// Loads a dependent association into the record's cache through the
    /// default (active-only) scope, the way an ordinary reader would.
    /// Returns the number of targets loaded.
    pub fn load_dependents(&self, record: &mut Record, name: &str) -> Result<usize> {
        let descriptor = self.registry.model(record.model())?;
        let association = descriptor.find_dependent(name).ok_or_else(|| {
            StoreError::ExecutionError(format!(
                "Model '{}' has no dependent association '{}'",
                descriptor.name(),
                name
            ))
        })?;
        let target = self.registry.model(&association.target)?;

        let records: Vec<Record> = match record.id() {
            Some(owner_id) => {
                let mut selection = Selection::new(target.table()).filter(
                    association.foreign_key.as_str(),
                    CmpOp::Eq,
                    Value::Integer(owner_id),
                );
                if let Some(column) = &association.type_column {
                    selection = selection.filter(
                        column.as_str(),
                        CmpOp::Eq,
                        Value::Text(record.model().to_string()),
                    );
                }
                if let Some(column) = target.lifecycle_column() {
                    selection = selection.lifecycle(column);
                }
                self.backend
                    .select(&selection)?
                    .into_iter()
                    .map(|(id, row)| Record::from_row(target, id, row))
                    .collect()
            }
            None => Vec::new(),
        };

        let count = records.len();
        match association.cardinality {
            Cardinality::Single => record.cache_single(name, records.into_iter().next()),
            Cardinality::Collection => record.cache_collection(name, records),
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Lifecycle state machine
    // ------------------------------------------------------------------

    /// Soft delete: a raw lifecycle-column write, no callbacks, no counters.
    /// Never an error for an already-deleted record.
    pub fn delete(&self, record: &mut Record) -> Result<()> {
        self.delete_at(record, Utc::now())
    }

    pub fn delete_at(&self, record: &mut Record, stamp: DateTime<Utc>) -> Result<()> {
        if record.is_readonly() {
            return Err(StoreError::ReadOnly(format!(
                "Cannot delete read-only '{}' record",
                record.model()
            )));
        }
        let descriptor = self.lifecycle_model(record)?;
        let attrs = transition_attributes(descriptor, Value::Timestamp(stamp));
        if let Some(id) = record.id() {
            self.backend.update_columns(descriptor.table(), id, &attrs)?;
            record.apply(&attrs);
        } else if !record.is_frozen() {
            record.apply(&attrs);
        }
        Ok(())
    }

    /// Soft destroy: the host destroy chain around the soft delete, with
    /// dependent cascade and counter-cache decrement. Returns `Ok(false)`
    /// when a callback vetoed and the transaction was rolled back.
    pub fn destroy(&self, record: &mut Record) -> Result<bool> {
        self.destroy_at(record, Utc::now())
    }

    pub fn destroy_at(&self, record: &mut Record, stamp: DateTime<Utc>) -> Result<bool> {
        self.lifecycle_model(record)?;
        debug!(model = record.model(), id = ?record.id(), "destroying record");
        let depth = self.backend.transaction_depth();
        let outcome = self.transaction(|session| {
            session.run_event(LifecycleEvent::Destroy, record, &mut |record| {
                cascade::destroy_dependents(session, record, stamp)?;
                record.suppress_counters(record.is_deleted());
                let result = session.delete_at(record, stamp).and_then(|_| {
                    counters::adjust_loaded(
                        &session.registry,
                        session.backend.as_ref(),
                        record,
                        -1,
                    )
                });
                record.suppress_counters(false);
                result?;
                Ok(true)
            })
        });
        self.conclude(outcome, depth)
    }

    /// Restore: undoes a soft delete when the recovery window admits it and
    /// the record is not frozen, adjusting counters symmetrically to
    /// `destroy`. With `opts.recursive` the cascade walker runs regardless of
    /// whether this record itself changed. Out-of-window and frozen cases are
    /// silent no-ops; inspect [`Record::is_deleted`] afterwards.
    pub fn restore(&self, record: &mut Record, opts: &RestoreOptions) -> Result<bool> {
        self.lifecycle_model(record)?;
        debug!(
            model = record.model(),
            id = ?record.id(),
            recursive = opts.recursive,
            "restoring record"
        );
        let depth = self.backend.transaction_depth();
        let outcome = self.transaction(|session| {
            session.run_event(LifecycleEvent::Restore, record, &mut |record| {
                let anchor = record.deletion_timestamp().unwrap_or_else(sentinel_timestamp);
                let range = window::resolve(opts, anchor);
                if window::within(range.as_ref(), anchor) && !record.is_frozen() {
                    record.suppress_counters(!record.is_deleted());
                    let result = session.write_restore_columns(record).and_then(|_| {
                        counters::adjust_loaded(
                            &session.registry,
                            session.backend.as_ref(),
                            record,
                            1,
                        )
                    });
                    record.suppress_counters(false);
                    result?;
                }
                if opts.recursive {
                    cascade::restore_dependents(session, record, range.as_ref())?;
                }
                Ok(true)
            })
        });
        self.conclude(outcome, depth)
    }

    /// Purge: cascades a hard delete through dependent-destroy associations,
    /// writes a final audit stamp, and removes the row. Terminal; the record
    /// is frozen afterwards.
    pub fn really_destroy(&self, record: &mut Record) -> Result<bool> {
        self.lifecycle_model(record)?;
        debug!(model = record.model(), id = ?record.id(), "purging record");
        let depth = self.backend.transaction_depth();
        let outcome = self.transaction(|session| {
            session.run_event(LifecycleEvent::RealDestroy, record, &mut |record| {
                record.suppress_counters(record.is_deleted());
                let result = session.purge_body(record);
                record.suppress_counters(false);
                result?;
                record.freeze();
                Ok(true)
            })
        });
        self.conclude(outcome, depth)
    }

    /// Class-level bulk restore. Each identifier is located among soft-
    /// deleted rows and restored in its own transaction; the first missing
    /// identifier fails the call, leaving earlier restores committed and
    /// later identifiers untouched.
    pub fn restore_by_ids(
        &self,
        model: &str,
        ids: &[RecordId],
        opts: &RestoreOptions,
    ) -> Result<Vec<Record>> {
        let descriptor = self.registry.model(model)?;
        let now = Utc::now();
        ids.iter()
            .map(|&id| {
                let mut record = self
                    .backend
                    .find(descriptor.table(), id)?
                    .map(|row| Record::from_row(descriptor, id, row))
                    .ok_or_else(|| {
                        StoreError::RecordNotFound(id, descriptor.table().to_string())
                    })?;
                let soft_deleted = record
                    .deletion_timestamp()
                    .map(|stamp| stamp <= now)
                    .unwrap_or(false);
                if !soft_deleted {
                    return Err(StoreError::RecordNotFound(
                        id,
                        descriptor.table().to_string(),
                    ));
                }
                self.restore(&mut record, opts)?;
                Ok(record)
            })
            .collect()
    }

    pub fn restore_by_id(
        &self,
        model: &str,
        id: RecordId,
        opts: &RestoreOptions,
    ) -> Result<Record> {
        let mut restored = self.restore_by_ids(model, &[id], opts)?;
        Ok(restored.remove(0))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn run_event(
        &self,
        event: LifecycleEvent,
        record: &mut Record,
        body: Body<'_>,
    ) -> Result<()> {
        let completed = match self.registry.chain(record.model(), event) {
            Some(chain) => chain.run(record, body)?,
            None => body(record)?,
        };
        if completed {
            Ok(())
        } else {
            Err(StoreError::CallbackHalted(event.name()))
        }
    }

    /// Maps a veto into `Ok(false)` at the outermost level only, so a veto
    /// inside a cascade still aborts the whole enclosing transaction.
    fn conclude(&self, outcome: Result<()>, depth_before: usize) -> Result<bool> {
        match outcome {
            Ok(()) => Ok(true),
            Err(StoreError::CallbackHalted(_)) if depth_before == 0 => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn purge_body(&self, record: &mut Record) -> Result<()> {
        cascade::purge_dependents(self, record)?;
        let descriptor = self.lifecycle_model(record)?;
        // final stamp for the audit trail; the row is about to go away
        let attrs = transition_attributes(descriptor, Value::Timestamp(Utc::now()));
        if let Some(id) = record.id() {
            self.backend.update_columns(descriptor.table(), id, &attrs)?;
        }
        record.apply(&attrs);
        counters::adjust_by_foreign_key(&self.registry, self.backend.as_ref(), record, -1)?;
        if let Some(id) = record.id() {
            self.backend.hard_delete(descriptor.table(), id)?;
        }
        Ok(())
    }

    fn write_restore_columns(&self, record: &mut Record) -> Result<()> {
        let descriptor = self.lifecycle_model(record)?;
        let attrs = transition_attributes(descriptor, Value::sentinel());
        if let Some(id) = record.id() {
            self.backend.update_columns(descriptor.table(), id, &attrs)?;
        }
        record.apply(&attrs);
        Ok(())
    }

    fn lifecycle_model(&self, record: &Record) -> Result<&ModelDescriptor> {
        let descriptor = self.registry.model(record.model())?;
        if !descriptor.is_lifecycle_aware() {
            return Err(StoreError::ExecutionError(format!(
                "Model '{}' has no lifecycle column",
                descriptor.name()
            )));
        }
        Ok(descriptor)
    }
}

/// The column writes of one lifecycle transition: the lifecycle column plus
/// refreshed timestamp columns.
fn transition_attributes(model: &ModelDescriptor, lifecycle_value: Value) -> Vec<(String, Value)> {
    let Some(column) = model.lifecycle_column() else {
        return Vec::new();
    };
    let mut attrs = vec![(column.to_string(), lifecycle_value)];
    let now = Utc::now();
    for column in model.timestamp_columns() {
        attrs.push((column.clone(), Value::Timestamp(now)));
    }
    attrs
}
