//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use goma_core::error::GomaResult;
use goma_core::models::permission::{CreatePermission, Permission, UpdatePermission};
use goma_core::repository::{PaginatedResult, Pagination, PermissionRepository};
use goma_core::validation::Validate;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    key: String,
    name: String,
    description: Option<String>,
    module: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    fn into_permission(self, id: Uuid) -> Permission {
        Permission {
            id,
            key: self.key,
            name: self.name,
            description: self.description,
            module: self.module,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
pub(super) struct PermissionRowWithId {
    record_id: String,
    key: String,
    name: String,
    description: Option<String>,
    module: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRowWithId {
    pub(super) fn try_into_permission(self) -> Result<Permission, DbError> {
        let id = parse_uuid("permission", &self.record_id)?;
        Ok(Permission {
            id,
            key: self.key,
            name: self.name,
            description: self.description,
            module: self.module,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> GomaResult<Permission> {
        input.validate().inspect_err(|e| {
            warn!(key = %input.key, error = %e, "Rejected permission input");
        })?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 key = $key, name = $name, \
                 description = $description, module = $module",
            )
            .bind(("id", id_str.clone()))
            .bind(("key", input.key))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("module", input.module))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("permission", e))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", &id_str))?;

        debug!(permission_id = %id, key = %row.key, "Created permission");
        Ok(row.into_permission(id))
    }

    async fn get_by_id(&self, id: Uuid) -> GomaResult<Permission> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id_str))?;

        Ok(row.into_permission(id))
    }

    async fn get_by_key(&self, key: &str) -> GomaResult<Permission> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM permission WHERE key = $key",
            )
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", format!("key={key}")))?;

        Ok(row.try_into_permission()?)
    }

    async fn update(&self, id: Uuid, input: UpdatePermission) -> GomaResult<Permission> {
        input.validate()?;
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.key.is_some() {
            sets.push("key = $key");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.module.is_some() {
            sets.push("module = $module");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('permission', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(key) = input.key {
            builder = builder.bind(("key", key));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(module) = input.module {
            builder = builder.bind(("module", module));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("permission", e))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id_str))?;

        Ok(row.into_permission(id))
    }

    async fn delete(&self, id: Uuid) -> GomaResult<()> {
        self.get_by_id(id).await?;
        let id_str = id.to_string();

        let query = "BEGIN TRANSACTION; \
             DELETE role_permissions WHERE out = type::record('permission', $id); \
             DELETE type::record('permission', $id); \
             COMMIT TRANSACTION;";

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("permission", e))?;

        debug!(permission_id = %id, "Deleted permission and its grants");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> GomaResult<PaginatedResult<Permission>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM permission GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 ORDER BY key ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_module(&self, module: &str) -> GomaResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE module = $module ORDER BY key ASC",
            )
            .bind(("module", module.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;

        let permissions = rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(permissions)
    }
}
