//! Dependent-association traversal for cascading operations.
//!
//! Children recurse through their own `Session` operations, so every level
//! runs the full pipeline (callbacks, counters) inside the same enclosing
//! transaction. Before recursing, a child is marked with the foreign key of
//! the association it was reached through; the counter coordinator uses that
//! mark to avoid double-applying the same count delta.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::{RecordId, Result, Value};
use crate::lifecycle::session::Session;
use crate::lifecycle::window::{RestoreOptions, WindowRange};
use crate::model::descriptor::{AssociationDescriptor, Cardinality, ModelDescriptor};
use crate::model::record::{AssociationTarget, Record};
use crate::query::{CmpOp, Scope, Selection};

/// Soft-destroy cascade, run as part of the host destroy chain before the
/// owner's own column update. Children are stamped with the owner's stamp so
/// one cascade shares one deletion time.
pub(crate) fn destroy_dependents(
    session: &Session,
    owner: &mut Record,
    stamp: DateTime<Utc>,
) -> Result<()> {
    let registry = session.registry_ref();
    let model = registry.model(owner.model())?;
    for association in model.cascading_dependents() {
        let target = registry.model(&association.target)?;
        if !target.is_lifecycle_aware() {
            continue;
        }
        debug!(
            owner = owner.model(),
            association = %association.name,
            "cascading soft destroy"
        );
        match association.cardinality {
            Cardinality::Collection => {
                if let Some(owner_id) = owner.id() {
                    let selection =
                        dependent_selection(owner, owner_id, association, target, Scope::Active);
                    for (id, row) in session.backend_ref().select(&selection)? {
                        let mut child = Record::from_row(target, id, row);
                        child.set_cascade_origin(Some(association.foreign_key.clone()));
                        session.destroy_at(&mut child, stamp)?;
                    }
                }
            }
            Cardinality::Single => {
                if let Some(mut child) = resolve_single(session, owner, association, target)? {
                    child.set_cascade_origin(Some(association.foreign_key.clone()));
                    session.destroy_at(&mut child, stamp)?;
                }
            }
        }
    }
    Ok(())
}

/// Restore cascade. Collections re-query their currently-soft-deleted
/// members; a cached singular target is restored directly; an uncached
/// singular target is re-resolved among soft-deleted rows by foreign key,
/// because the in-memory link may have been severed after the owner's
/// destroy. The owner's association cache is invalidated afterwards.
pub(crate) fn restore_dependents(
    session: &Session,
    owner: &mut Record,
    range: Option<&WindowRange>,
) -> Result<()> {
    let registry = session.registry_ref();
    let model = registry.model(owner.model())?;
    let mut walked = false;

    for association in model.cascading_dependents() {
        walked = true;
        let target = registry.model(&association.target)?;
        if !target.is_lifecycle_aware() {
            continue;
        }
        debug!(
            owner = owner.model(),
            association = %association.name,
            "cascading restore"
        );
        match association.cardinality {
            Cardinality::Collection => {
                if let Some(owner_id) = owner.id() {
                    let selection = dependent_selection(
                        owner,
                        owner_id,
                        association,
                        target,
                        Scope::OnlyDeleted,
                    );
                    for (id, row) in session.backend_ref().select(&selection)? {
                        let mut child = Record::from_row(target, id, row);
                        child.set_cascade_origin(Some(association.foreign_key.clone()));
                        session.restore(&mut child, &child_options(range))?;
                    }
                }
            }
            Cardinality::Single => match owner.cached(&association.name).cloned() {
                Some(AssociationTarget::Single(Some(child))) => {
                    let mut child = *child;
                    child.set_cascade_origin(Some(association.foreign_key.clone()));
                    session.restore(&mut child, &child_options(range))?;
                }
                _ => {
                    if let Some(owner_id) = owner.id() {
                        let selection = dependent_selection(
                            owner,
                            owner_id,
                            association,
                            target,
                            Scope::OnlyDeleted,
                        );
                        let hit = session.backend_ref().select(&selection)?.into_iter().next();
                        if let Some((id, row)) = hit {
                            let mut child = Record::from_row(target, id, row);
                            child.set_cascade_origin(Some(association.foreign_key.clone()));
                            session.restore(&mut child, &child_options(range))?;
                        }
                    }
                }
            },
        }
    }

    if walked {
        owner.clear_association_cache();
    }
    Ok(())
}

/// Purge cascade, run to completion before the owner's row is physically
/// removed. Collections re-query including soft-deleted rows; an absent
/// singular target is skipped.
pub(crate) fn purge_dependents(session: &Session, owner: &mut Record) -> Result<()> {
    let registry = session.registry_ref();
    let model = registry.model(owner.model())?;

    for association in model.cascading_dependents() {
        let target = registry.model(&association.target)?;
        if !target.is_lifecycle_aware() {
            continue;
        }
        debug!(
            owner = owner.model(),
            association = %association.name,
            "cascading purge"
        );
        match association.cardinality {
            Cardinality::Collection => {
                if let Some(owner_id) = owner.id() {
                    let selection = dependent_selection(
                        owner,
                        owner_id,
                        association,
                        target,
                        Scope::WithDeleted,
                    );
                    for (id, row) in session.backend_ref().select(&selection)? {
                        let mut child = Record::from_row(target, id, row);
                        child.set_cascade_origin(Some(association.foreign_key.clone()));
                        session.really_destroy(&mut child)?;
                    }
                }
            }
            Cardinality::Single => {
                if let Some(mut child) = resolve_single(session, owner, association, target)? {
                    child.set_cascade_origin(Some(association.foreign_key.clone()));
                    session.really_destroy(&mut child)?;
                }
            }
        }
    }
    Ok(())
}

fn child_options(range: Option<&WindowRange>) -> RestoreOptions {
    RestoreOptions {
        recursive: true,
        recovery_window: None,
        recovery_window_range: range.cloned(),
    }
}

/// The current value of a singular association: the cached target when one
/// is held in memory, otherwise an active-scope foreign-key lookup.
fn resolve_single(
    session: &Session,
    owner: &Record,
    association: &AssociationDescriptor,
    target: &ModelDescriptor,
) -> Result<Option<Record>> {
    if let Some(cached) = owner.cached(&association.name) {
        return Ok(match cached {
            AssociationTarget::Single(Some(record)) => Some((**record).clone()),
            _ => None,
        });
    }
    let Some(owner_id) = owner.id() else {
        return Ok(None);
    };
    let selection = dependent_selection(owner, owner_id, association, target, Scope::Active);
    let hit = session.backend_ref().select(&selection)?.into_iter().next();
    Ok(hit.map(|(id, row)| Record::from_row(target, id, row)))
}

fn dependent_selection(
    owner: &Record,
    owner_id: RecordId,
    association: &AssociationDescriptor,
    target: &ModelDescriptor,
    scope: Scope,
) -> Selection {
    let mut selection = Selection::new(target.table()).filter(
        association.foreign_key.as_str(),
        CmpOp::Eq,
        Value::Integer(owner_id),
    );
    if let Some(column) = &association.type_column {
        selection = selection.filter(
            column.as_str(),
            CmpOp::Eq,
            Value::Text(owner.model().to_string()),
        );
    }
    if let Some(column) = target.lifecycle_column() {
        selection = selection.lifecycle(column);
    }
    match scope {
        Scope::Active => selection,
        Scope::WithDeleted => selection.with_deleted(),
        Scope::OnlyDeleted => selection.only_deleted(),
    }
}
