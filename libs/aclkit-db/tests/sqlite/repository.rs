#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Repository session operations against a seeded SQLite database.
//!
//! Missing rows and rows the principal may not touch must be
//! indistinguishable to the caller.

#[path = "../common/mod.rs"]
mod common;

use aclkit_db::secure::AclError;
use aclkit_db::{AclConfig, UnmanagedCreatePolicy};
use aclkit_security::permission::{DELETE, READ, UPDATE};
use common::{ALICE, BOB, CAROL, DAVE, TestDb, audit_log, documents, ids, user, user_with};
use sea_orm::{ActiveValue::NotSet, ColumnTrait, Condition, Set};
use tracing_test::traced_test;

#[tokio::test]
async fn session_lists_visible_rows() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let bob = user(BOB);
    let session = db.session(Some(&bob));

    let docs = session.find_all::<documents::Entity>(READ).await.unwrap();
    assert_eq!(ids(&docs, |d| d.id), vec![1001, 1002]);
    assert_eq!(session.count::<documents::Entity>(READ).await.unwrap(), 2);
    assert_eq!(db.db_engine(), "sqlite");
}

#[tokio::test]
async fn find_by_id_hides_invisible_rows() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let alice = user(ALICE);
    let session = db.session(Some(&alice));

    let own = session
        .find_by_id::<documents::Entity, _>(1000_i64, READ)
        .await
        .unwrap();
    assert_eq!(own.map(|d| d.title), Some("doc-1000".to_owned()));

    let foreign = session
        .find_by_id::<documents::Entity, _>(1001_i64, READ)
        .await
        .unwrap();
    assert!(foreign.is_none());

    let missing = session
        .get_one::<documents::Entity, _>(4242_i64, READ)
        .await
        .unwrap_err();
    let forbidden = session
        .get_one::<documents::Entity, _>(1001_i64, READ)
        .await
        .unwrap_err();
    assert!(matches!(missing, AclError::NotFound));
    assert!(matches!(forbidden, AclError::NotFound));
}

#[tokio::test]
async fn find_all_by_id_filters_the_given_ids() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let dave = user(DAVE);
    let session = db.session(Some(&dave));

    let docs = session
        .find_all_by_id::<documents::Entity, _, _>([1000_i64, 1004, 1005], UPDATE)
        .await
        .unwrap();
    assert_eq!(ids(&docs, |d| d.id), vec![1005]);
}

#[tokio::test]
async fn find_one_combines_filter_and_access() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let bob = user(BOB);
    let session = db.session(Some(&bob));

    let by_title = |title: &str| Condition::all().add(documents::Column::Title.eq(title));

    let hit = session
        .find_one::<documents::Entity>(by_title("doc-1002"), READ)
        .await
        .unwrap();
    assert_eq!(hit.map(|d| d.id), Some(1002));

    let miss = session
        .find_one::<documents::Entity>(by_title("doc-1000"), READ)
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn has_permission_checks_a_single_row() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let carol = user(CAROL);
    let session = db.session(Some(&carol));

    assert!(session.has_permission::<documents::Entity, _>(1000_i64, READ).await.unwrap());
    assert!(!session.has_permission::<documents::Entity, _>(1000_i64, UPDATE).await.unwrap());
    assert!(!session.has_permission::<documents::Entity, _>(4242_i64, READ).await.unwrap());
}

#[tokio::test]
async fn update_requires_update_permission() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let alice = user(ALICE);
    let carol = user(CAROL);

    let updated = db
        .session(Some(&alice))
        .update::<documents::Entity, _, _>(
            1000_i64,
            documents::ActiveModel {
                id: NotSet,
                title: Set("renamed".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, 1000);
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.owner_id, Some(ALICE));

    let err = db
        .session(Some(&carol))
        .update::<documents::Entity, _, _>(
            1000_i64,
            documents::ActiveModel {
                id: Set(1000),
                title: Set("hijacked".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::NotFound));

    let unchanged = db
        .session(None)
        .find_by_id_without_permission_check::<documents::Entity, _>(1000_i64)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.title, "renamed");
}

#[tokio::test]
async fn update_through_share_link() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let dave = user(DAVE);
    let session = db.session(Some(&dave));

    let updated = session
        .update::<documents::Entity, _, _>(
            1005_i64,
            documents::ActiveModel {
                title: Set("shared edit".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "shared edit");

    let err = session
        .update::<documents::Entity, _, _>(
            1004_i64,
            documents::ActiveModel {
                title: Set("read only".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::NotFound));
}

#[tokio::test]
async fn update_rejects_mismatched_primary_key() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let alice = user(ALICE);

    let err = db
        .session(Some(&alice))
        .update::<documents::Entity, _, _>(
            1000_i64,
            documents::ActiveModel {
                id: Set(1001),
                title: Set("moved".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::Invalid(_)));
}

#[tokio::test]
async fn delete_requires_delete_permission() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let bob = user(BOB);
    let session = db.session(Some(&bob));

    // Owners of documents hold only {read, update}.
    let err = session
        .delete_by_id::<documents::Entity, _>(1001_i64)
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::NotFound));

    // Group owners are admitted for any permission the group rule covers.
    session
        .delete_by_id::<documents::Entity, _>(1002_i64)
        .await
        .unwrap();

    let gone = session
        .find_by_id_without_permission_check::<documents::Entity, _>(1002_i64)
        .await
        .unwrap();
    assert!(gone.is_none());
    assert!(
        session
            .find_by_id_without_permission_check::<documents::Entity, _>(1001_i64)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn delete_without_permission_check_reports_rows() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let session = db.session(None);

    let removed = session
        .delete_without_permission_check::<documents::Entity, _>(1003_i64)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let removed = session
        .delete_without_permission_check::<documents::Entity, _>(1003_i64)
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn insert_requires_create_authority() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let editor = user_with(7, "ROLE_EDITOR");
    let alice = user(ALICE);

    let doc = |id: i64| documents::ActiveModel {
        id: Set(id),
        title: Set(format!("doc-{id}")),
        owner_id: Set(Some(7)),
        folder_id: Set(None),
        group_id: Set(None),
    };

    let created = db
        .session(Some(&editor))
        .insert::<documents::Entity, _>(doc(2000))
        .await
        .unwrap();
    assert_eq!(created.id, 2000);

    let err = db
        .session(Some(&alice))
        .insert::<documents::Entity, _>(doc(2001))
        .await
        .unwrap_err();
    assert!(
        matches!(err, AclError::CreateDenied { ref entity_type } if entity_type == "document")
    );
    assert_eq!(
        db.session(Some(&editor))
            .find_all::<documents::Entity>(DELETE)
            .await
            .unwrap()
            .len(),
        0
    );
}

#[tokio::test]
async fn unmanaged_types_follow_the_create_policy() {
    let entry = |id: i64| audit_log::ActiveModel {
        id: Set(id),
        message: Set("login".to_owned()),
    };
    let alice = user(ALICE);

    let db = TestDb::new().await.acl(AclConfig::default());
    db.session(Some(&alice))
        .insert::<audit_log::Entity, _>(entry(1))
        .await
        .unwrap();

    let db = TestDb::new().await.acl(AclConfig {
        unmanaged_create: UnmanagedCreatePolicy::Deny,
        ..AclConfig::default()
    });
    let err = db
        .session(Some(&alice))
        .insert::<audit_log::Entity, _>(entry(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::CreateDenied { .. }));

    let err = db
        .session(Some(&alice))
        .find_all::<audit_log::Entity>(READ)
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::UnknownEntity(_)));
}

#[tokio::test]
#[traced_test]
async fn denied_create_is_logged() {
    let db = TestDb::new().await.acl(AclConfig::default());
    let alice = user(ALICE);

    let _ = db
        .session(Some(&alice))
        .insert::<documents::Entity, _>(documents::ActiveModel {
            id: Set(3000),
            title: Set("nope".to_owned()),
            owner_id: Set(Some(ALICE)),
            folder_id: Set(None),
            group_id: Set(None),
        })
        .await;
    assert!(logs_contain("create denied"));
}
