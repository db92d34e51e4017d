/// Association cascade tests
///
/// Destroy, restore, and purge propagation through dependent-destroy
/// associations, including severed singular links and polymorphic lookups.
/// Run with: cargo test --test cascade_tests
use std::sync::Arc;

use reprieve::{
    AssociationDescriptor, Column, DataType, MemoryBackend, ModelDescriptor, ModelRegistry,
    Record, ReferenceDescriptor, RestoreOptions, Session, Value,
};

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register(
        ModelDescriptor::new("post", "posts")
            .column(Column::new("title", DataType::Text))
            .column(Column::new("comments_count", DataType::Integer))
            .lifecycle("deleted_at")
            .touch("updated_at")
            .dependent(AssociationDescriptor::collection("comments", "comment", "post_id"))
            .dependent(AssociationDescriptor::single("cover", "cover", "post_id"))
            .dependent(
                AssociationDescriptor::single("sticker", "sticker", "owner_id")
                    .polymorphic("owner_type"),
            )
            .dependent(AssociationDescriptor::collection(
                "audit_entries",
                "audit_entry",
                "post_id",
            )),
    );
    registry.register(
        ModelDescriptor::new("comment", "comments")
            .column(Column::new("body", DataType::Text))
            .lifecycle("deleted_at")
            .reference(ReferenceDescriptor::new("post", "post", "post_id").counted("comments_count")),
    );
    registry.register(
        ModelDescriptor::new("cover", "covers")
            .column(Column::new("caption", DataType::Text))
            .column(Column::new("post_id", DataType::Integer))
            .lifecycle("deleted_at"),
    );
    registry.register(
        ModelDescriptor::new("sticker", "stickers")
            .column(Column::new("owner_id", DataType::Integer))
            .column(Column::new("owner_type", DataType::Text))
            .lifecycle("deleted_at"),
    );
    // deliberately not lifecycle-aware
    registry.register(
        ModelDescriptor::new("audit_entry", "audit_entries")
            .column(Column::new("message", DataType::Text))
            .column(Column::new("post_id", DataType::Integer)),
    );
    registry
}

fn session() -> Session {
    let session = Session::new(Arc::new(MemoryBackend::new()), registry());
    session.migrate().unwrap();
    session
}

fn create_post(session: &Session, title: &str) -> Record {
    session
        .create("post", &[("title", Value::Text(title.to_string()))])
        .unwrap()
}

fn create_comment(session: &Session, post_id: i64, body: &str) -> Record {
    session
        .create(
            "comment",
            &[
                ("body", Value::Text(body.to_string())),
                ("post_id", Value::Integer(post_id)),
            ],
        )
        .unwrap()
}

fn create_cover(session: &Session, post_id: i64) -> Record {
    session
        .create(
            "cover",
            &[
                ("caption", Value::Text("cover".into())),
                ("post_id", Value::Integer(post_id)),
            ],
        )
        .unwrap()
}

#[test]
fn test_destroy_cascades_to_dependents() {
    let session = session();
    let mut post = create_post(&session, "hello");
    let post_id = post.id().unwrap();
    create_comment(&session, post_id, "first");
    create_comment(&session, post_id, "second");
    create_cover(&session, post_id);

    session.destroy(&mut post).unwrap();

    assert_eq!(session.only_deleted("comment").unwrap().len(), 2);
    assert_eq!(session.only_deleted("cover").unwrap().len(), 1);
    assert!(session.active("comment").unwrap().is_empty());
}

#[test]
fn test_cascaded_children_share_the_owners_stamp() {
    let session = session();
    let mut post = create_post(&session, "hello");
    create_comment(&session, post.id().unwrap(), "first");

    session.destroy(&mut post).unwrap();

    let comment = &session.only_deleted("comment").unwrap()[0];
    assert_eq!(
        comment.attribute("deleted_at"),
        post.attribute("deleted_at")
    );
}

#[test]
fn test_recursive_restore_brings_dependents_back() {
    let session = session();
    let mut post = create_post(&session, "hello");
    let post_id = post.id().unwrap();
    create_comment(&session, post_id, "first");
    create_comment(&session, post_id, "second");
    create_cover(&session, post_id);
    session.destroy(&mut post).unwrap();

    session
        .restore(&mut post, &RestoreOptions::new().recursive())
        .unwrap();

    assert!(!post.is_deleted());
    assert_eq!(session.active("comment").unwrap().len(), 2);
    assert_eq!(session.active("cover").unwrap().len(), 1);
    assert!(session.only_deleted("comment").unwrap().is_empty());
}

#[test]
fn test_plain_restore_leaves_dependents_deleted() {
    let session = session();
    let mut post = create_post(&session, "hello");
    create_comment(&session, post.id().unwrap(), "first");
    session.destroy(&mut post).unwrap();

    session.restore(&mut post, &RestoreOptions::new()).unwrap();

    assert!(!post.is_deleted());
    assert_eq!(session.only_deleted("comment").unwrap().len(), 1);
}

#[test]
fn test_recursive_restore_resolves_a_severed_singular_link() {
    let session = session();
    let mut post = create_post(&session, "hello");
    let post_id = post.id().unwrap();
    create_cover(&session, post_id);
    session.destroy(&mut post).unwrap();

    // the in-memory link was nulled after the destroy; the walker must fall
    // back to a foreign-key lookup among soft-deleted rows
    post.cache_single("cover", None);
    session
        .restore(&mut post, &RestoreOptions::new().recursive())
        .unwrap();

    assert_eq!(session.active("cover").unwrap().len(), 1);
}

#[test]
fn test_restore_invalidates_the_association_cache() {
    let session = session();
    let mut post = create_post(&session, "hello");
    create_cover(&session, post.id().unwrap());
    session.destroy(&mut post).unwrap();
    post.cache_single("cover", None);

    session
        .restore(&mut post, &RestoreOptions::new().recursive())
        .unwrap();

    assert!(post.cached("cover").is_none());
}

#[test]
fn test_polymorphic_lookup_matches_the_discriminator() {
    let session = session();
    let mut post = create_post(&session, "hello");
    let post_id = post.id().unwrap();
    session
        .create(
            "sticker",
            &[
                ("owner_id", Value::Integer(post_id)),
                ("owner_type", Value::Text("post".into())),
            ],
        )
        .unwrap();
    // same owner id, different owner type: must never be touched
    let mut foreign = session
        .create(
            "sticker",
            &[
                ("owner_id", Value::Integer(post_id)),
                ("owner_type", Value::Text("page".into())),
            ],
        )
        .unwrap();

    session.destroy(&mut post).unwrap();
    assert_eq!(session.only_deleted("sticker").unwrap().len(), 1);

    session.destroy(&mut foreign).unwrap();
    session
        .restore(&mut post, &RestoreOptions::new().recursive())
        .unwrap();

    let active = session.active("sticker").unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(
        active[0].attribute("owner_type"),
        Some(&Value::Text("post".into()))
    );
}

#[test]
fn test_purge_removes_all_dependents_before_the_owner() {
    let session = session();
    let mut post = create_post(&session, "hello");
    let post_id = post.id().unwrap();
    for body in ["a", "b", "c"] {
        create_comment(&session, post_id, body);
    }
    create_cover(&session, post_id);

    assert!(session.really_destroy(&mut post).unwrap());

    assert!(session.with_deleted("post").unwrap().is_empty());
    assert!(session.with_deleted("comment").unwrap().is_empty());
    assert!(session.with_deleted("cover").unwrap().is_empty());
}

#[test]
fn test_purge_reaches_soft_deleted_members() {
    let session = session();
    let mut post = create_post(&session, "hello");
    create_comment(&session, post.id().unwrap(), "first");
    session.destroy(&mut post).unwrap();

    session.really_destroy(&mut post).unwrap();

    assert!(session.with_deleted("post").unwrap().is_empty());
    assert!(session.with_deleted("comment").unwrap().is_empty());
}

#[test]
fn test_purge_skips_non_lifecycle_aware_targets() {
    let session = session();
    let mut post = create_post(&session, "hello");
    session
        .create(
            "audit_entry",
            &[
                ("message", Value::Text("created".into())),
                ("post_id", Value::Integer(post.id().unwrap())),
            ],
        )
        .unwrap();

    session.really_destroy(&mut post).unwrap();

    // never probed for soft-delete state, never cascaded into
    assert_eq!(session.with_deleted("audit_entry").unwrap().len(), 1);
}

#[test]
fn test_purge_with_an_absent_singular_target_is_fine() {
    let session = session();
    let mut post = create_post(&session, "hello");
    assert!(session.really_destroy(&mut post).unwrap());
    assert!(session.with_deleted("post").unwrap().is_empty());
}

#[test]
fn test_nested_failure_rolls_back_the_whole_purge() {
    let mut registry = registry();
    registry.before_real_destroy("comment", |_| Ok(false));
    let session = Session::new(Arc::new(MemoryBackend::new()), registry);
    session.migrate().unwrap();

    let mut post = create_post(&session, "hello");
    create_comment(&session, post.id().unwrap(), "survivor");

    let completed = session.really_destroy(&mut post).unwrap();

    assert!(!completed);
    // no partial cascade was committed
    assert_eq!(session.with_deleted("post").unwrap().len(), 1);
    assert_eq!(session.with_deleted("comment").unwrap().len(), 1);
    assert_eq!(session.active("comment").unwrap().len(), 1);
}
