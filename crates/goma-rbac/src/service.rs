//! RBAC service: role loading, permission seeding, and authorization
//! checks.

use std::collections::{BTreeSet, HashMap};

use goma_core::error::{GomaError, GomaResult};
use goma_core::models::permission::{CreatePermission, Permission};
use goma_core::models::role::{CreateRole, Role, UpdateRole};
use goma_core::repository::{PermissionRepository, RoleRepository, TenantRepository};
use goma_core::validation::Validate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// RBAC service.
///
/// Generic over repository implementations so that the RBAC layer
/// has no dependency on the database crate.
pub struct RbacService<T: TenantRepository, R: RoleRepository, P: PermissionRepository> {
    tenant_repo: T,
    role_repo: R,
    permission_repo: P,
}

impl<T: TenantRepository, R: RoleRepository, P: PermissionRepository> RbacService<T, R, P> {
    pub fn new(tenant_repo: T, role_repo: R, permission_repo: P) -> Self {
        Self {
            tenant_repo,
            role_repo,
            permission_repo,
        }
    }

    /// Fetch a role with its permission set populated.
    pub async fn load_role(&self, tenant_id: Uuid, role_id: Uuid) -> GomaResult<Role> {
        self.role_repo.get_with_permissions(tenant_id, role_id).await
    }

    /// Create a role and grant it the permissions named by `keys`.
    ///
    /// Every key is resolved before the role is written, so an unknown
    /// key fails with `NotFound` and leaves nothing behind. Roles cannot
    /// be added to an inactive tenant.
    pub async fn create_role_with_permissions(
        &self,
        input: CreateRole,
        keys: &[&str],
    ) -> GomaResult<Role> {
        // 1. Field checks first so a nil tenant reports as Validation.
        input.validate()?;

        // 2. Tenant must exist and be active.
        let tenant = self.tenant_repo.get_by_id(input.tenant_id).await?;
        if !tenant.active {
            return Err(GomaError::Conflict(format!(
                "tenant {} is inactive",
                tenant.id
            )));
        }

        // 3. Resolve all keys up front.
        let mut permissions = Vec::with_capacity(keys.len());
        for key in keys {
            permissions.push(self.permission_repo.get_by_key(key).await?);
        }

        // 4. Create the role, then persist its grants in one write.
        let mut role = self.role_repo.create(input).await?;
        for permission in permissions {
            role.add_permission(permission);
        }

        if let Err(e) = self.role_repo.save_permissions(&role).await {
            warn!(role_id = %role.id, error = %e, "Saving grants failed, removing role");
            if let Err(rollback) = self.role_repo.delete(role.tenant_id, role.id).await {
                error!(
                    role_id = %role.id,
                    tenant_id = %role.tenant_id,
                    error = %rollback,
                    "Removing role after failed grant save also failed"
                );
            }
            return Err(e);
        }

        info!(
            role_id = %role.id,
            tenant_id = %role.tenant_id,
            code = %role.code,
            grants = role.permissions.len(),
            "Created role with permissions"
        );
        Ok(role)
    }

    /// Make sure every permission in `inputs` exists, keyed by `key`.
    ///
    /// Existing permissions are returned unchanged; missing ones are
    /// created. The result follows the order of `inputs`.
    pub async fn ensure_permissions(
        &self,
        inputs: Vec<CreatePermission>,
    ) -> GomaResult<Vec<Permission>> {
        let mut seen: HashMap<String, Permission> = HashMap::new();
        let mut result = Vec::with_capacity(inputs.len());
        let mut created = 0usize;

        for input in inputs {
            if let Some(existing) = seen.get(&input.key) {
                result.push(existing.clone());
                continue;
            }

            let key = input.key.clone();
            let permission = match self.permission_repo.get_by_key(&key).await {
                Ok(p) => p,
                Err(GomaError::NotFound { .. }) => match self.permission_repo.create(input).await {
                    Ok(p) => {
                        created += 1;
                        p
                    }
                    // Lost a race with a concurrent seeder.
                    Err(GomaError::AlreadyExists { .. }) => {
                        self.permission_repo.get_by_key(&key).await?
                    }
                    Err(e) => return Err(e),
                },
                Err(e) => return Err(e),
            };

            seen.insert(key, permission.clone());
            result.push(permission);
        }

        info!(total = result.len(), created, "Permission catalog ensured");
        Ok(result)
    }

    /// Enable or disable a role without touching its grants.
    pub async fn set_role_active(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        active: bool,
    ) -> GomaResult<Role> {
        let role = self
            .role_repo
            .update(
                tenant_id,
                role_id,
                UpdateRole {
                    active: Some(active),
                    ..Default::default()
                },
            )
            .await?;

        debug!(%role_id, active, "Role activation changed");
        Ok(role)
    }

    /// `true` when the role is active and holds the permission `key`.
    pub async fn is_granted(&self, tenant_id: Uuid, role_id: Uuid, key: &str) -> GomaResult<bool> {
        let role = self.load_role(tenant_id, role_id).await?;
        Ok(role.active && role.has_permission(key))
    }

    /// Union of the permission keys held by the active roles among
    /// `role_ids`. Inactive roles contribute nothing; an unknown role
    /// fails with `NotFound`.
    pub async fn granted_keys(
        &self,
        tenant_id: Uuid,
        role_ids: &[Uuid],
    ) -> GomaResult<BTreeSet<String>> {
        let mut keys = BTreeSet::new();

        for role_id in role_ids {
            let role = self.role_repo.get_by_id(tenant_id, *role_id).await?;
            if !role.active {
                continue;
            }
            let permissions = self.role_repo.load_permissions(tenant_id, role.id).await?;
            keys.extend(permissions.into_iter().map(|p| p.key));
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use chrono::Utc;
    use goma_core::models::permission::UpdatePermission;
    use goma_core::models::tenant::{CreateTenant, Tenant, UpdateTenant};
    use goma_core::repository::{PaginatedResult, Pagination};

    use super::*;

    // Minimal in-memory repositories; only the paths the service uses
    // are implemented.

    struct Tenants(Vec<Tenant>);

    impl TenantRepository for Tenants {
        async fn create(&self, _: CreateTenant) -> GomaResult<Tenant> {
            unimplemented!()
        }
        async fn get_by_id(&self, id: Uuid) -> GomaResult<Tenant> {
            self.0
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| GomaError::NotFound {
                    entity: "tenant".into(),
                    id: id.to_string(),
                })
        }
        async fn get_by_name(&self, _: &str) -> GomaResult<Tenant> {
            unimplemented!()
        }
        async fn update(&self, _: Uuid, _: UpdateTenant) -> GomaResult<Tenant> {
            unimplemented!()
        }
        async fn delete(&self, _: Uuid) -> GomaResult<()> {
            unimplemented!()
        }
        async fn list(&self, _: Pagination) -> GomaResult<PaginatedResult<Tenant>> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct Permissions(Mutex<Vec<Permission>>);

    impl PermissionRepository for Permissions {
        async fn create(&self, input: CreatePermission) -> GomaResult<Permission> {
            let mut perms = self.0.lock().unwrap();
            if perms.iter().any(|p| p.key == input.key) {
                return Err(GomaError::AlreadyExists {
                    entity: "permission".into(),
                });
            }
            let p = Permission::new(input.key, input.name);
            perms.push(p.clone());
            Ok(p)
        }
        async fn get_by_id(&self, _: Uuid) -> GomaResult<Permission> {
            unimplemented!()
        }
        async fn get_by_key(&self, key: &str) -> GomaResult<Permission> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.key == key)
                .cloned()
                .ok_or_else(|| GomaError::NotFound {
                    entity: "permission".into(),
                    id: format!("key={key}"),
                })
        }
        async fn update(&self, _: Uuid, _: UpdatePermission) -> GomaResult<Permission> {
            unimplemented!()
        }
        async fn delete(&self, _: Uuid) -> GomaResult<()> {
            unimplemented!()
        }
        async fn list(&self, _: Pagination) -> GomaResult<PaginatedResult<Permission>> {
            unimplemented!()
        }
        async fn list_by_module(&self, _: &str) -> GomaResult<Vec<Permission>> {
            unimplemented!()
        }
    }

    /// The flag makes `save_permissions` fail.
    #[derive(Default)]
    struct Roles(Mutex<Vec<Role>>, bool);

    impl RoleRepository for Roles {
        async fn create(&self, input: CreateRole) -> GomaResult<Role> {
            let now = Utc::now();
            let role = Role {
                id: Uuid::new_v4(),
                tenant_id: input.tenant_id,
                code: input.code,
                name: input.name,
                description: input.description,
                active: input.active,
                permissions: HashSet::new(),
                created_at: now,
                updated_at: now,
            };
            self.0.lock().unwrap().push(role.clone());
            Ok(role)
        }
        async fn get_by_id(&self, _: Uuid, id: Uuid) -> GomaResult<Role> {
            let mut role = self.get_with_permissions(Uuid::nil(), id).await?;
            role.permissions.clear();
            Ok(role)
        }
        async fn get_by_code(&self, _: Uuid, _: &str) -> GomaResult<Role> {
            unimplemented!()
        }
        async fn update(&self, _: Uuid, id: Uuid, input: UpdateRole) -> GomaResult<Role> {
            let mut roles = self.0.lock().unwrap();
            let role = roles.iter_mut().find(|r| r.id == id).ok_or_else(|| {
                GomaError::NotFound {
                    entity: "role".into(),
                    id: id.to_string(),
                }
            })?;
            if let Some(active) = input.active {
                role.active = active;
            }
            Ok(role.clone())
        }
        async fn delete(&self, _: Uuid, id: Uuid) -> GomaResult<()> {
            self.0.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }
        async fn list(&self, _: Uuid, _: Pagination) -> GomaResult<PaginatedResult<Role>> {
            unimplemented!()
        }
        async fn load_permissions(&self, _: Uuid, role_id: Uuid) -> GomaResult<Vec<Permission>> {
            let role = self.get_with_permissions(Uuid::nil(), role_id).await?;
            Ok(role.permissions.into_iter().collect())
        }
        async fn get_with_permissions(&self, _: Uuid, id: Uuid) -> GomaResult<Role> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| GomaError::NotFound {
                    entity: "role".into(),
                    id: id.to_string(),
                })
        }
        async fn save_permissions(&self, role: &Role) -> GomaResult<()> {
            if self.1 {
                return Err(GomaError::Database("connection reset".into()));
            }
            let mut roles = self.0.lock().unwrap();
            if let Some(stored) = roles.iter_mut().find(|r| r.id == role.id) {
                stored.permissions = role.permissions.clone();
            }
            Ok(())
        }
        async fn grant_permission(&self, _: Uuid, _: Uuid, _: Uuid) -> GomaResult<()> {
            unimplemented!()
        }
        async fn revoke_permission(&self, _: Uuid, _: Uuid, _: Uuid) -> GomaResult<()> {
            unimplemented!()
        }
        async fn list_by_permission_key(&self, _: Uuid, _: &str) -> GomaResult<Vec<Role>> {
            unimplemented!()
        }
    }

    fn tenant(active: bool) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            description: None,
            active,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(t: &Tenant) -> RbacService<Tenants, Roles, Permissions> {
        RbacService::new(
            Tenants(vec![t.clone()]),
            Roles::default(),
            Permissions::default(),
        )
    }

    #[tokio::test]
    async fn ensure_permissions_dedupes_repeated_keys() {
        let t = tenant(true);
        let svc = service(&t);

        let perms = svc
            .ensure_permissions(vec![
                CreatePermission::new("doc.read", "Read"),
                CreatePermission::new("doc.read", "Read again"),
            ])
            .await
            .unwrap();

        assert_eq!(perms.len(), 2);
        assert_eq!(perms[0].id, perms[1].id);
        assert_eq!(svc.permission_repo.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inactive_tenant_rejects_new_roles() {
        let t = tenant(false);
        let svc = service(&t);

        let err = svc
            .create_role_with_permissions(CreateRole::new(t.id, "admin", "Admin"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GomaError::Conflict(_)));
        assert!(svc.role_repo.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn nil_tenant_is_a_validation_error() {
        let t = tenant(true);
        let svc = service(&t);

        let err = svc
            .create_role_with_permissions(CreateRole::new(Uuid::nil(), "admin", "Admin"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GomaError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_grant_save_removes_the_new_role() {
        let t = tenant(true);
        let svc = RbacService::new(
            Tenants(vec![t.clone()]),
            Roles(Mutex::default(), true),
            Permissions::default(),
        );
        svc.ensure_permissions(vec![CreatePermission::new("doc.read", "Read")])
            .await
            .unwrap();

        let err = svc
            .create_role_with_permissions(CreateRole::new(t.id, "reader", "Reader"), &["doc.read"])
            .await
            .unwrap_err();
        assert!(matches!(err, GomaError::Database(_)), "got {err:?}");
        assert!(svc.role_repo.0.lock().unwrap().is_empty());
    }
}
