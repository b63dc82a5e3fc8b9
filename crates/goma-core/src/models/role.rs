//! Role domain model.
//!
//! A role is a named, tenant-scoped bundle of permissions. The
//! permission set is an in-memory collection: `add_permission` and
//! `remove_permission` never touch the database. Persisting the set is
//! an explicit `RoleRepository::save_permissions` call.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;
use super::tenant::Tenant;
use crate::validation::{
    Validate, ValidationErrors, check_optional, check_required, require_tenant,
};

pub const CODE_MAX_LEN: usize = 50;
pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Short identifier, unique within the tenant (e.g. `ADMIN`).
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    /// Empty unless loaded explicitly.
    #[serde(default)]
    pub permissions: HashSet<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Build an unsaved, active role with no permissions.
    pub fn new(code: impl Into<String>, name: impl Into<String>, tenant: &Tenant) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            code: code.into(),
            name: name.into(),
            description: None,
            active: true,
            permissions: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `permission` to the set. Returns `false` if it was already present.
    pub fn add_permission(&mut self, permission: Permission) -> bool {
        self.permissions.insert(permission)
    }

    /// Removes `permission` from the set. Returns `false` if it was absent.
    pub fn remove_permission(&mut self, permission: &Permission) -> bool {
        self.permissions.remove(permission)
    }

    /// Returns `true` iff some permission in the set has the given key.
    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.iter().any(|p| p.key == key)
    }

    pub fn permission_keys(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(|p| p.key.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

impl CreateRole {
    /// Active role with no description.
    pub fn new(tenant_id: Uuid, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            code: code.into(),
            name: name.into(),
            description: None,
            active: true,
        }
    }
}

impl Validate for CreateRole {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(require_tenant(self.tenant_id));
        check_required(&mut errors, "code", &self.code, CODE_MAX_LEN);
        check_required(&mut errors, "name", &self.name, NAME_MAX_LEN);
        check_optional(
            &mut errors,
            "description",
            self.description.as_deref(),
            DESCRIPTION_MAX_LEN,
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub code: Option<String>,
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

impl Validate for UpdateRole {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(code) = &self.code {
            check_required(&mut errors, "code", code, CODE_MAX_LEN);
        }
        if let Some(name) = &self.name {
            check_required(&mut errors, "name", name, NAME_MAX_LEN);
        }
        check_optional(
            &mut errors,
            "description",
            self.description.as_ref().and_then(|d| d.as_deref()),
            DESCRIPTION_MAX_LEN,
        );
        errors.into_result()
    }
}
