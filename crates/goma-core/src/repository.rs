//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Role operations take a
//! `tenant_id` parameter to enforce tenant isolation; tenants and
//! permissions are global.

use uuid::Uuid;

use crate::error::GomaResult;
use crate::models::{
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role, UpdateRole},
    tenant::{CreateTenant, Tenant, UpdateTenant},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Global scope
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = GomaResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GomaResult<Tenant>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = GomaResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = GomaResult<Tenant>> + Send;
    /// Fails with `NotFound` for an unknown id and with `Conflict` while
    /// the tenant still owns roles.
    fn delete(&self, id: Uuid) -> impl Future<Output = GomaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = GomaResult<PaginatedResult<Tenant>>> + Send;
}

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = GomaResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GomaResult<Permission>> + Send;
    fn get_by_key(&self, key: &str) -> impl Future<Output = GomaResult<Permission>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> impl Future<Output = GomaResult<Permission>> + Send;
    /// Deletes the permission and every role grant that references it.
    /// Fails with `NotFound` for an unknown id.
    fn delete(&self, id: Uuid) -> impl Future<Output = GomaResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = GomaResult<PaginatedResult<Permission>>> + Send;
    fn list_by_module(
        &self,
        module: &str,
    ) -> impl Future<Output = GomaResult<Vec<Permission>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped
// ---------------------------------------------------------------------------

/// Roles returned by `create`, `get_by_id`, `get_by_code`, `update`, and
/// `list` carry an empty permission set. Use [`Self::get_with_permissions`]
/// or [`Self::load_permissions`] when the grants are needed.
pub trait RoleRepository: Send + Sync {
    /// Fails with `NotFound` when `input.tenant_id` does not exist.
    fn create(&self, input: CreateRole) -> impl Future<Output = GomaResult<Role>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GomaResult<Role>> + Send;
    fn get_by_code(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> impl Future<Output = GomaResult<Role>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = GomaResult<Role>> + Send;
    /// Deletes the role and its `role_permissions` rows. Fails with
    /// `NotFound` for an unknown id or a role owned by another tenant.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = GomaResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GomaResult<PaginatedResult<Role>>> + Send;

    /// Get all permissions granted to a role.
    fn load_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = GomaResult<Vec<Permission>>> + Send;

    /// Get a role with its permission set populated.
    fn get_with_permissions(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GomaResult<Role>> + Send;

    /// Replace the persisted grants of `role` with its in-memory set,
    /// atomically.
    fn save_permissions(&self, role: &Role) -> impl Future<Output = GomaResult<()>> + Send;

    /// Grant a permission to a role. Granting twice is a no-op.
    fn grant_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = GomaResult<()>> + Send;

    /// Revoke a permission from a role.
    fn revoke_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = GomaResult<()>> + Send;

    /// Get all roles in the tenant that hold the permission `key`.
    fn list_by_permission_key(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> impl Future<Output = GomaResult<Vec<Role>>> + Send;
}
