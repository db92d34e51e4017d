/// Validation adapter tests
///
/// Uniqueness probing restricted to active rows, and liveness checks for
/// references whose target may have been soft-deleted.
/// Run with: cargo test --test validation_tests
use std::sync::Arc;

use reprieve::prelude::dx::{validate_reference_live, validate_unique};
use reprieve::{
    Column, DataType, MemoryBackend, ModelDescriptor, ModelRegistry, Record, ReferenceDescriptor,
    RestoreOptions, Session, StoreError, Value,
};

fn session() -> Session {
    let mut registry = ModelRegistry::new();
    registry.register(
        ModelDescriptor::new("account", "accounts")
            .column(Column::new("email", DataType::Text))
            .lifecycle("deleted_at"),
    );
    registry.register(
        ModelDescriptor::new("invoice", "invoices")
            .column(Column::new("number", DataType::Text))
            .lifecycle("deleted_at")
            .reference(ReferenceDescriptor::new("account", "account", "account_id")),
    );
    let session = Session::new(Arc::new(MemoryBackend::new()), registry);
    session.migrate().unwrap();
    session
}

fn create_account(session: &Session, email: &str) -> Record {
    session
        .create("account", &[("email", Value::Text(email.to_string()))])
        .unwrap()
}

#[test]
fn test_uniqueness_conflicts_with_an_active_duplicate() {
    let session = session();
    create_account(&session, "a@example.com");

    let descriptor = session.registry_ref().model("account").unwrap();
    let mut candidate = Record::new(descriptor);
    candidate.set_attribute("email", Value::Text("a@example.com".into()));

    assert!(matches!(
        validate_unique(&session, &candidate, "email"),
        Err(StoreError::ConstraintViolation(_))
    ));
}

#[test]
fn test_uniqueness_ignores_soft_deleted_rows() {
    let session = session();
    let mut existing = create_account(&session, "a@example.com");
    session.destroy(&mut existing).unwrap();

    let descriptor = session.registry_ref().model("account").unwrap();
    let mut candidate = Record::new(descriptor);
    candidate.set_attribute("email", Value::Text("a@example.com".into()));

    assert!(validate_unique(&session, &candidate, "email").is_ok());
}

#[test]
fn test_uniqueness_does_not_conflict_with_itself() {
    let session = session();
    let existing = create_account(&session, "a@example.com");
    assert!(validate_unique(&session, &existing, "email").is_ok());
}

#[test]
fn test_uniqueness_skips_null_values() {
    let session = session();
    create_account(&session, "a@example.com");
    let descriptor = session.registry_ref().model("account").unwrap();
    let candidate = Record::new(descriptor);
    assert!(validate_unique(&session, &candidate, "email").is_ok());
}

#[test]
fn test_reference_liveness_flags_a_soft_deleted_target() {
    let session = session();
    let mut account = create_account(&session, "a@example.com");
    let invoice = session
        .create(
            "invoice",
            &[
                ("number", Value::Text("INV-1".into())),
                ("account_id", Value::Integer(account.id().unwrap())),
            ],
        )
        .unwrap();

    assert!(validate_reference_live(&session, &invoice, "account").is_ok());

    session.destroy(&mut account).unwrap();
    assert!(matches!(
        validate_reference_live(&session, &invoice, "account"),
        Err(StoreError::ValidationFailed(_))
    ));

    session
        .restore(&mut account, &RestoreOptions::new())
        .unwrap();
    assert!(validate_reference_live(&session, &invoice, "account").is_ok());
}

#[test]
fn test_reference_liveness_ignores_a_null_foreign_key() {
    let session = session();
    let invoice = session
        .create("invoice", &[("number", Value::Text("INV-2".into()))])
        .unwrap();
    assert!(validate_reference_live(&session, &invoice, "account").is_ok());
}

#[test]
fn test_reference_liveness_on_an_unknown_reference_is_an_error() {
    let session = session();
    let invoice = session
        .create("invoice", &[("number", Value::Text("INV-3".into()))])
        .unwrap();
    assert!(matches!(
        validate_reference_live(&session, &invoice, "customer"),
        Err(StoreError::ExecutionError(_))
    ));
}
