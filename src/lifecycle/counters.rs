//! Counter cache coordination.
//!
//! Prevents double counting when both a direct operation and a cascading
//! parent operation would otherwise adjust the same counter: the per-record
//! suppression flag (set by the state machine around each operation body)
//! silences all adjustment, and the reference matching the record's cascade
//! origin is always skipped because the parent side already accounts for it.

use tracing::trace;

use crate::core::{Result, Value};
use crate::model::descriptor::ModelDescriptor;
use crate::model::record::{AssociationTarget, Record};
use crate::model::registry::ModelRegistry;
use crate::storage::Backend;

/// Adjusts the counters of references whose in-memory target is currently
/// loaded. Unloaded references are not probed, so no queries are issued here.
pub(crate) fn adjust_loaded(
    registry: &ModelRegistry,
    backend: &dyn Backend,
    record: &Record,
    delta: i64,
) -> Result<()> {
    if record.counters_suppressed() {
        return Ok(());
    }
    let model = registry.model(record.model())?;
    for reference in counted(model, record) {
        let Some(AssociationTarget::Single(Some(target))) = record.cached(&reference.name) else {
            continue;
        };
        let Some(target_id) = target.id() else {
            continue;
        };
        let counter = reference.counter_column.as_deref().unwrap_or_default();
        let target_model = registry.model(&reference.target)?;
        trace!(
            model = record.model(),
            reference = %reference.name,
            delta,
            "adjusting counter cache"
        );
        backend.adjust_counter(target_model.table(), target_id, counter, delta)?;
    }
    Ok(())
}

/// Foreign-key-addressed adjustment, used by the host-side create and raw
/// hard-delete bookkeeping where no loaded target is required.
pub(crate) fn adjust_by_foreign_key(
    registry: &ModelRegistry,
    backend: &dyn Backend,
    record: &Record,
    delta: i64,
) -> Result<()> {
    if record.counters_suppressed() {
        return Ok(());
    }
    let model = registry.model(record.model())?;
    for reference in counted(model, record) {
        let Some(Value::Integer(owner_id)) = record.attribute(&reference.foreign_key) else {
            continue;
        };
        let counter = reference.counter_column.as_deref().unwrap_or_default();
        let target_model = registry.model(&reference.target)?;
        backend.adjust_counter(target_model.table(), *owner_id, counter, delta)?;
    }
    Ok(())
}

/// Counted references minus the one the record is being cascaded through.
fn counted<'a>(
    model: &'a ModelDescriptor,
    record: &'a Record,
) -> impl Iterator<Item = &'a crate::model::descriptor::ReferenceDescriptor> {
    model.references().iter().filter(move |reference| {
        reference.counter_column.is_some()
            && record.cascade_origin() != Some(reference.foreign_key.as_str())
    })
}
