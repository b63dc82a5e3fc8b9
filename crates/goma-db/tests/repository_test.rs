//! Integration tests for the Tenant repository using in-memory SurrealDB.

use goma_core::error::GomaError;
use goma_core::models::role::CreateRole;
use goma_core::models::tenant::{CreateTenant, UpdateTenant};
use goma_core::repository::{Pagination, RoleRepository, TenantRepository};
use goma_db::repository::{SurrealRoleRepository, SurrealTenantRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    goma_db::run_migrations(&db).await.unwrap();
    db
}

fn tenant(name: &str) -> CreateTenant {
    CreateTenant {
        name: name.into(),
        description: None,
    }
}

#[tokio::test]
async fn tenant_crud() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let created = repo
        .create(CreateTenant {
            name: "Acme".into(),
            description: Some("Primary tenant".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Acme");
    assert_eq!(created.description.as_deref(), Some("Primary tenant"));
    assert!(created.active);

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.name, "Acme");

    let by_name = repo.get_by_name("Acme").await.unwrap();
    assert_eq!(by_name.id, created.id);

    let updated = repo
        .update(
            created.id,
            UpdateTenant {
                name: Some("Acme Corp".into()),
                description: Some(None),
                active: Some(false),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Acme Corp");
    assert!(updated.description.is_none());
    assert!(!updated.active);

    repo.delete(created.id).await.unwrap();
    let err = repo.get_by_id(created.id).await.unwrap_err();
    assert!(matches!(err, GomaError::NotFound { .. }));
}

#[tokio::test]
async fn update_without_changes_keeps_fields() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let created = repo
        .create(CreateTenant {
            name: "Acme".into(),
            description: Some("kept".into()),
        })
        .await
        .unwrap();

    let updated = repo
        .update(created.id, UpdateTenant::default())
        .await
        .unwrap();
    assert_eq!(updated.name, "Acme");
    assert_eq!(updated.description.as_deref(), Some("kept"));
}

#[tokio::test]
async fn duplicate_tenant_name_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(tenant("Acme")).await.unwrap();
    let err = repo.create(tenant("Acme")).await.unwrap_err();
    assert!(
        matches!(err, GomaError::AlreadyExists { .. }),
        "expected AlreadyExists, got {err:?}"
    );
}

#[tokio::test]
async fn blank_tenant_name_never_reaches_database() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.create(tenant("   ")).await.unwrap_err();
    match err {
        GomaError::Validation(errors) => assert!(errors.has_field("name")),
        other => panic!("expected Validation, got {other:?}"),
    }

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn overlong_description_is_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo
        .create(CreateTenant {
            name: "Acme".into(),
            description: Some("x".repeat(501)),
        })
        .await
        .unwrap_err();
    match err {
        GomaError::Validation(errors) => assert!(errors.has_field("description")),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn tenant_list_paginates() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    for i in 0..5 {
        repo.create(tenant(&format!("tenant-{i}"))).await.unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);

    let last = repo
        .list(Pagination {
            offset: 4,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(last.total, 5);
    assert_eq!(last.items.len(), 1);
}

#[tokio::test]
async fn tenant_with_roles_cannot_be_deleted() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db);

    let t = tenants.create(tenant("Acme")).await.unwrap();
    let role = roles
        .create(CreateRole::new(t.id, "admin", "Administrator"))
        .await
        .unwrap();

    let err = tenants.delete(t.id).await.unwrap_err();
    assert!(
        matches!(err, GomaError::Conflict(_)),
        "expected Conflict, got {err:?}"
    );
    tenants.get_by_id(t.id).await.unwrap();

    roles.delete(t.id, role.id).await.unwrap();
    tenants.delete(t.id).await.unwrap();
}

#[tokio::test]
async fn missing_tenant_lookups_are_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.get_by_id(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, GomaError::NotFound { .. }));

    let err = repo.get_by_name("nobody").await.unwrap_err();
    assert!(matches!(err, GomaError::NotFound { .. }));
}

#[tokio::test]
async fn deleting_unknown_tenant_is_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.delete(uuid::Uuid::new_v4()).await.unwrap_err();
    match err {
        GomaError::NotFound { entity, .. } => assert_eq!(entity, "tenant"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn role_cannot_be_added_to_deleted_tenant() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db);

    let t = tenants.create(tenant("Acme")).await.unwrap();
    tenants.delete(t.id).await.unwrap();

    let err = roles
        .create(CreateRole::new(t.id, "admin", "Administrator"))
        .await
        .unwrap_err();
    match err {
        GomaError::NotFound { entity, .. } => assert_eq!(entity, "tenant"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    let page = roles.list(t.id, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0, "no role row may be left behind");
}
