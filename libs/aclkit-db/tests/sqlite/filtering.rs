#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Row filtering against a seeded SQLite database.
//!
//! Every case runs the compiled predicate through the real query path, so
//! joins, `DISTINCT` and the permission-link ON conditions are exercised by
//! the database rather than by string inspection.

#[path = "../common/mod.rs"]
mod common;

use aclkit_db::AclConfig;
use aclkit_db::secure::{AclEntityExt, AclError, AclSpecification};
use aclkit_security::AclPrincipal;
use aclkit_security::permission::{DELETE, READ, UPDATE};
use common::{
    ALICE, BOB, CAROL, DAVE, ERIN, TestDb, desks, documents, ids, projects, spec, tasks, user,
    user_with, users, workspaces,
};
use sea_orm::{EntityTrait, Order};
use tracing_test::traced_test;

async fn visible_documents(
    config: AclConfig,
    principal_id: Option<i64>,
    permission: &str,
) -> Vec<i64> {
    let db = TestDb::new().await;
    let spec = spec(config);
    let principal = principal_id.map(user);
    let rows = documents::Entity::find()
        .acl()
        .with_permission(&spec, principal.as_ref(), permission)
        .expect("compile")
        .all(&db.conn)
        .await
        .expect("query");
    ids(&rows, |d| d.id)
}

async fn visible_tasks(
    db: &TestDb,
    spec: &AclSpecification,
    principal: &AclPrincipal,
    permission: &str,
) -> Vec<i64> {
    let rows = tasks::Entity::find()
        .acl()
        .with_permission(spec, Some(principal), permission)
        .expect("compile")
        .all(&db.conn)
        .await
        .expect("query");
    ids(&rows, |t| t.id)
}

async fn visible_desks(
    db: &TestDb,
    spec: &AclSpecification,
    principal_id: i64,
    permission: &str,
) -> Vec<i64> {
    let principal = user(principal_id);
    let rows = desks::Entity::find()
        .acl()
        .with_permission(spec, Some(&principal), permission)
        .expect("compile")
        .all(&db.conn)
        .await
        .expect("query");
    ids(&rows, |d| d.id)
}

#[tokio::test]
async fn owner_reads_own_document() {
    assert_eq!(visible_documents(AclConfig::default(), Some(ALICE), READ).await, vec![1000]);
}

#[tokio::test]
async fn group_member_reads_group_document() {
    assert_eq!(
        visible_documents(AclConfig::default(), Some(BOB), READ).await,
        vec![1001, 1002]
    );
}

#[tokio::test]
async fn parent_owner_reads_child_document() {
    assert_eq!(visible_documents(AclConfig::default(), Some(CAROL), READ).await, vec![1000]);
}

#[tokio::test]
async fn grandparent_owner_needs_enough_depth() {
    assert_eq!(visible_documents(AclConfig::default(), Some(ERIN), READ).await, vec![1000]);

    let shallow = AclConfig {
        max_depth: 1,
        ..AclConfig::default()
    };
    assert!(visible_documents(shallow, Some(ERIN), READ).await.is_empty());
}

#[tokio::test]
async fn parent_rule_covers_only_declared_permissions() {
    assert!(visible_documents(AclConfig::default(), Some(CAROL), UPDATE).await.is_empty());
}

#[tokio::test]
async fn owner_permissions_are_respected() {
    assert_eq!(visible_documents(AclConfig::default(), Some(ALICE), UPDATE).await, vec![1000]);
    assert!(visible_documents(AclConfig::default(), Some(ALICE), DELETE).await.is_empty());
}

#[tokio::test]
async fn shares_grant_by_stored_permission() {
    assert_eq!(
        visible_documents(AclConfig::default(), Some(DAVE), READ).await,
        vec![1004, 1005]
    );
    assert_eq!(visible_documents(AclConfig::default(), Some(DAVE), UPDATE).await, vec![1005]);
    assert_eq!(visible_documents(AclConfig::default(), Some(DAVE), DELETE).await, vec![1005]);
}

#[tokio::test]
async fn anonymous_sees_nothing() {
    assert!(visible_documents(AclConfig::default(), None, READ).await.is_empty());
}

#[tokio::test]
async fn cyclic_parents_terminate() {
    let deep = AclConfig {
        max_depth: 8,
        ..AclConfig::default()
    };
    assert_eq!(visible_documents(deep, Some(ALICE), READ).await, vec![1000]);
}

#[tokio::test]
async fn admin_role_sees_everything() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());
    let admin = user_with(99, "ROLE_ADMIN");

    let rows = documents::Entity::find()
        .acl()
        .with_permission(&spec, Some(&admin), DELETE)
        .unwrap()
        .order_by(documents::Column::Id, Order::Asc)
        .all(&db.conn)
        .await
        .unwrap();

    assert_eq!(
        rows.iter().map(|d| d.id).collect::<Vec<_>>(),
        vec![1000, 1001, 1002, 1003, 1004, 1005]
    );
}

#[tokio::test]
async fn duplicate_link_rows_are_collapsed() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());
    let dave = user(DAVE);

    // Two share rows for 1005 both grant read.
    let count = documents::Entity::find()
        .acl()
        .with_permission(&spec, Some(&dave), READ)
        .unwrap()
        .count(&db.conn)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn users_see_only_themselves() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());
    let bob = user(BOB);

    let rows = users::Entity::find()
        .acl()
        .with_permission(&spec, Some(&bob), UPDATE)
        .unwrap()
        .all(&db.conn)
        .await
        .unwrap();
    assert_eq!(ids(&rows, |u| u.id), vec![BOB]);
}

#[tokio::test]
async fn scoped_member_permission_reaches_tasks_only() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());
    let carol = user_with(CAROL, "ROLE_STAFF");
    let dave = user_with(DAVE, "ROLE_STAFF");

    assert_eq!(visible_tasks(&db, &spec, &carol, READ).await, vec![600]);
    assert_eq!(visible_tasks(&db, &spec, &carol, UPDATE).await, vec![600]);
    assert_eq!(visible_tasks(&db, &spec, &dave, READ).await, vec![600]);
    assert!(visible_tasks(&db, &spec, &dave, UPDATE).await.is_empty());

    // "task:update" is scoped, so it does not grant read on the project itself.
    let projects_for_carol = projects::Entity::find()
        .acl()
        .with_permission(&spec, Some(&carol), READ)
        .unwrap()
        .all(&db.conn)
        .await
        .unwrap();
    assert!(projects_for_carol.is_empty());
}

#[tokio::test]
async fn role_condition_gates_tasks() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());
    let carol = user(CAROL);

    let rows = tasks::Entity::find()
        .acl()
        .with_permission(&spec, Some(&carol), READ)
        .unwrap()
        .all(&db.conn)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn scoped_owner_groups_check_group_owner_permissions() {
    // Group owners hold the default {read, update, delete}; scoped mode checks
    // the same tokens because the group prefix is empty.
    let scoped = AclConfig {
        owner_groups: aclkit_db::OwnerGroupMode::Scoped,
        ..AclConfig::default()
    };
    assert_eq!(visible_documents(scoped, Some(BOB), DELETE).await, vec![1002]);
}

#[tokio::test]
async fn has_many_owner_matches_any_member() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());

    for (id, expected) in [(ALICE, vec![700]), (BOB, vec![700]), (CAROL, vec![701])] {
        let rows = workspaces::Entity::find()
            .acl()
            .with_permission(&spec, Some(&user(id)), UPDATE)
            .unwrap()
            .all(&db.conn)
            .await
            .unwrap();
        assert_eq!(ids(&rows, |w| w.id), expected, "user {id}");
    }

    let count = workspaces::Entity::find()
        .acl()
        .with_permission(&spec, Some(&user(ERIN)), READ)
        .unwrap()
        .count(&db.conn)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn has_one_owner_respects_its_permissions() {
    let db = TestDb::new().await;
    let spec = spec(AclConfig::default());

    assert_eq!(visible_desks(&db, &spec, DAVE, READ).await, vec![800]);
    assert!(visible_desks(&db, &spec, DAVE, UPDATE).await.is_empty());
    assert!(visible_desks(&db, &spec, ALICE, READ).await.is_empty());
}

#[tokio::test]
async fn unknown_entity_type_fails_closed() {
    let spec = spec(AclConfig::default());
    let err = common::audit_log::Entity::find()
        .acl()
        .with_permission(&spec, Some(&user(ALICE)), READ)
        .unwrap_err();
    assert!(matches!(err, AclError::UnknownEntity(ref t) if t == "audit"));
}

#[tokio::test]
async fn table_mismatch_is_reported() {
    let spec = spec(AclConfig::default());
    let err = common::archived_documents::Entity::find()
        .acl()
        .with_permission(&spec, Some(&user(ALICE)), READ)
        .unwrap_err();
    assert!(matches!(
        err,
        AclError::TableMismatch { ref expected, ref actual, .. }
            if expected == "documents" && actual == "archived_documents"
    ));
}

#[tokio::test]
#[traced_test]
async fn compilation_is_traced() {
    let _ = visible_documents(AclConfig::default(), Some(CAROL), READ).await;
    assert!(logs_contain("adding parent sub-predicates"));
    assert!(logs_contain("adding permission-link predicate"));
}
