//! Integration points for a host validation framework.
//!
//! Two adapters: a uniqueness probe that never lets soft-deleted rows cause
//! spurious conflicts, and a liveness check for reference-valued fields whose
//! target may have been soft-deleted.

use chrono::{DateTime, Utc};

use crate::core::{Result, StoreError, Value};
use crate::lifecycle::Session;
use crate::model::descriptor::ModelDescriptor;
use crate::model::record::Record;
use crate::query::{CmpOp, Selection};

/// The query used to test uniqueness of `column` on a lifecycle-aware model:
/// the default scope is removed and replaced with an explicit predicate
/// keeping only rows whose lifecycle column is strictly after `as_of`, so
/// soft-deleted rows never conflict.
pub fn uniqueness_probe(
    model: &ModelDescriptor,
    column: &str,
    value: Value,
    as_of: DateTime<Utc>,
) -> Selection {
    let mut selection = Selection::new(model.table())
        .with_deleted()
        .filter(column, CmpOp::Eq, value);
    if let Some(lifecycle) = model.lifecycle_column() {
        selection = selection
            .lifecycle(lifecycle)
            .filter(lifecycle, CmpOp::Gt, Value::Timestamp(as_of));
    }
    selection
}

/// Fails with a constraint violation when another active record holds the
/// same value in `column`. NULL never conflicts.
pub fn validate_unique(session: &Session, record: &Record, column: &str) -> Result<()> {
    let model = session.registry_ref().model(record.model())?;
    let value = record.attribute(column).cloned().unwrap_or(Value::Null);
    if value == Value::Null {
        return Ok(());
    }

    let probe = uniqueness_probe(model, column, value, Utc::now());
    let hits = session.backend_ref().select(&probe)?;
    let conflicting = hits.iter().any(|(id, _)| Some(*id) != record.id());
    if conflicting {
        return Err(StoreError::ConstraintViolation(format!(
            "Value of '{}' is already taken by an active '{}' record",
            column,
            model.name()
        )));
    }
    Ok(())
}

/// Records a validation error when the named reference points at a record
/// that is currently soft-deleted. A dangling or NULL foreign key is not
/// this adapter's concern.
pub fn validate_reference_live(session: &Session, record: &Record, reference: &str) -> Result<()> {
    let model = session.registry_ref().model(record.model())?;
    let descriptor = model.find_reference(reference).ok_or_else(|| {
        StoreError::ExecutionError(format!(
            "Model '{}' has no reference '{}'",
            model.name(),
            reference
        ))
    })?;
    let target_model = session.registry_ref().model(&descriptor.target)?;
    if !target_model.is_lifecycle_aware() {
        return Ok(());
    }

    let Some(Value::Integer(target_id)) = record.attribute(&descriptor.foreign_key) else {
        return Ok(());
    };
    let Some(target) = session.find_with_deleted(target_model.name(), *target_id)? else {
        return Ok(());
    };
    if target.is_deleted() {
        return Err(StoreError::ValidationFailed(format!(
            "Reference '{}' points at a soft-deleted '{}' record",
            reference,
            target_model.name()
        )));
    }
    Ok(())
}
