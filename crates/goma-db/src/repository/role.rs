//! SurrealDB implementation of [`RoleRepository`].
//!
//! Grants live in the `role_permissions` relation table
//! (`role -> role_permissions -> permission`). Nothing here loads them
//! implicitly; `load_permissions` and `get_with_permissions` are the
//! only reads that touch the relation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use goma_core::error::GomaResult;
use goma_core::models::permission::Permission;
use goma_core::models::role::{CreateRole, Role, UpdateRole};
use goma_core::repository::{PaginatedResult, Pagination, RoleRepository};
use goma_core::validation::Validate;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use super::permission::PermissionRowWithId;
use super::{CountRow, parse_uuid};
use crate::error::{DbError, THROWN_NOT_FOUND};

#[derive(Debug, SurrealValue)]
struct RoleRow {
    tenant_id: String,
    code: String,
    name: String,
    description: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn try_into_role(self, id: Uuid) -> Result<Role, DbError> {
        let tenant_id = parse_uuid("tenant", &self.tenant_id)?;
        Ok(Role {
            id,
            tenant_id,
            code: self.code,
            name: self.name,
            description: self.description,
            active: self.active,
            permissions: HashSet::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: String,
    tenant_id: String,
    code: String,
    name: String,
    description: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        let id = parse_uuid("role", &self.record_id)?;
        let tenant_id = parse_uuid("tenant", &self.tenant_id)?;
        Ok(Role {
            id,
            tenant_id,
            code: self.code,
            name: self.name,
            description: self.description,
            active: self.active,
            permissions: HashSet::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RecordIdRow {
    record_id: String,
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Fails with `NotFound` naming the first id that has no permission record.
    async fn ensure_permissions(&self, ids: &[Uuid]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let wanted: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM permission \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", wanted.clone()))
            .await?;

        let rows: Vec<RecordIdRow> = result.take(0)?;
        let found: HashSet<String> = rows.into_iter().map(|r| r.record_id).collect();

        match wanted.into_iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(DbError::not_found("permission", missing)),
            None => Ok(()),
        }
    }

    /// Permissions granted to `role_id`, without checking tenant ownership.
    async fn fetch_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE id IN (\
                     SELECT VALUE out FROM role_permissions \
                     WHERE in = type::record('role', $role_id)\
                 ) \
                 ORDER BY key ASC",
            )
            .bind(("role_id", role_id.to_string()))
            .await?;

        let rows: Vec<PermissionRowWithId> = result.take(0)?;

        rows.into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect()
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> GomaResult<Role> {
        input.validate().inspect_err(|e| {
            warn!(code = %input.code, error = %e, "Rejected role input");
        })?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let tenant_id_str = input.tenant_id.to_string();

        // The tenant check and the insert run as one statement.
        let query = format!(
            "IF record::exists(type::record('tenant', $tenant_id)) {{ \
                 CREATE type::record('role', $id) SET \
                 tenant_id = $tenant_id, \
                 code = $code, name = $name, \
                 description = $description, active = $active \
             }} ELSE {{ \
                 THROW '{THROWN_NOT_FOUND}' \
             }}"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id_str.clone()))
            .bind(("code", input.code))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("active", input.active))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            if DbError::is_thrown(&e, THROWN_NOT_FOUND) {
                DbError::not_found("tenant", &tenant_id_str)
            } else {
                DbError::from_statement("role", e)
            }
        })?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", &id_str))?;

        let role = row.try_into_role(id)?;
        debug!(role_id = %id, tenant_id = %role.tenant_id, code = %role.code, "Created role");
        Ok(role)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> GomaResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('role', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id_str))?;

        Ok(row.try_into_role(id)?)
    }

    async fn get_by_code(&self, tenant_id: Uuid, code: &str) -> GomaResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id AND code = $code",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", format!("code={code}")))?;

        Ok(row.try_into_role()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateRole) -> GomaResult<Role> {
        input.validate()?;
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.code.is_some() {
            sets.push("code = $code");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.active.is_some() {
            sets.push("active = $active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(code) = input.code {
            builder = builder.bind(("code", code));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(active) = input.active {
            builder = builder.bind(("active", active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id_str))?;

        Ok(row.try_into_role(id)?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> GomaResult<()> {
        // Ownership check first so another tenant's grants are never touched.
        self.get_by_id(tenant_id, id).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE role_permissions WHERE in = type::record('role', $id); \
                 DELETE type::record('role', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        debug!(role_id = %id, %tenant_id, "Deleted role and its grants");
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, pagination: Pagination) -> GomaResult<PaginatedResult<Role>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM role \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RoleRowWithId::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn load_permissions(&self, tenant_id: Uuid, role_id: Uuid) -> GomaResult<Vec<Permission>> {
        self.get_by_id(tenant_id, role_id).await?;
        Ok(self.fetch_permissions(role_id).await?)
    }

    async fn get_with_permissions(&self, tenant_id: Uuid, id: Uuid) -> GomaResult<Role> {
        let mut role = self.get_by_id(tenant_id, id).await?;
        role.permissions = self.fetch_permissions(id).await?.into_iter().collect();
        Ok(role)
    }

    async fn save_permissions(&self, role: &Role) -> GomaResult<()> {
        self.get_by_id(role.tenant_id, role.id).await?;

        let permission_ids: Vec<Uuid> = role.permissions.iter().map(|p| p.id).collect();
        self.ensure_permissions(&permission_ids).await?;

        // RELATE needs literal record ids; UUIDs are safe to embed.
        let role_id_str = role.id.to_string();
        let mut statement = String::from(
            "BEGIN TRANSACTION; \
             DELETE role_permissions WHERE in = type::record('role', $role_id);",
        );
        for permission_id in &permission_ids {
            statement.push_str(&format!(
                " RELATE role:`{role_id_str}` -> role_permissions -> permission:`{permission_id}`;"
            ));
        }
        statement.push_str(" COMMIT TRANSACTION;");

        self.db
            .query(statement)
            .bind(("role_id", role_id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role_permissions", e))?;

        debug!(
            role_id = %role.id,
            grants = permission_ids.len(),
            "Saved role permissions"
        );
        Ok(())
    }

    async fn grant_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> GomaResult<()> {
        self.get_by_id(tenant_id, role_id).await?;
        self.ensure_permissions(&[permission_id]).await?;

        // Drop any existing edge first so a repeated grant stays a single row.
        let query = format!(
            "BEGIN TRANSACTION; \
             DELETE role_permissions WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $permission_id); \
             RELATE role:`{role_id}` -> role_permissions -> permission:`{permission_id}`; \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("role_id", role_id.to_string()))
            .bind(("permission_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role_permissions", e))?;

        debug!(%role_id, %permission_id, "Granted permission");
        Ok(())
    }

    async fn revoke_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> GomaResult<()> {
        self.get_by_id(tenant_id, role_id).await?;

        self.db
            .query(
                "DELETE role_permissions WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $permission_id)",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("permission_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role_permissions", e))?;

        debug!(%role_id, %permission_id, "Revoked permission");
        Ok(())
    }

    async fn list_by_permission_key(&self, tenant_id: Uuid, key: &str) -> GomaResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = $tenant_id \
                 AND id IN (\
                     SELECT VALUE in FROM role_permissions \
                     WHERE out IN (\
                         SELECT VALUE id FROM permission WHERE key = $key\
                     )\
                 ) \
                 ORDER BY code ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;

        let roles = rows
            .into_iter()
            .map(RoleRowWithId::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(roles)
    }
}
