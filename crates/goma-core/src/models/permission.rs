//! Permission domain model.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{Validate, ValidationErrors, check_optional, check_required};

pub const KEY_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const MODULE_MAX_LEN: usize = 50;

/// A globally unique, named capability that can be granted to roles.
///
/// Permissions are not tenant-scoped: the same `key` means the same
/// capability in every tenant. Two permissions are the same set member
/// when their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    /// Authorization token checked by [`Role::has_permission`](super::role::Role::has_permission),
    /// e.g. `user.read`.
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    /// Optional grouping such as `users` or `billing`.
    pub module: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Build an unsaved permission with a fresh id.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            name: name.into(),
            description: None,
            module: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub module: Option<String>,
}

impl CreatePermission {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
            module: None,
        }
    }
}

impl Validate for CreatePermission {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "key", &self.key, KEY_MAX_LEN);
        check_required(&mut errors, "name", &self.name, NAME_MAX_LEN);
        check_optional(
            &mut errors,
            "description",
            self.description.as_deref(),
            DESCRIPTION_MAX_LEN,
        );
        check_optional(&mut errors, "module", self.module.as_deref(), MODULE_MAX_LEN);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    pub key: Option<String>,
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
    /// Same tri-state semantics as `description`.
    pub module: Option<Option<String>>,
}

impl Validate for UpdatePermission {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(key) = &self.key {
            check_required(&mut errors, "key", key, KEY_MAX_LEN);
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
        check_optional(
            &mut errors,
            "module",
            self.module.as_ref().and_then(|m| m.as_deref()),
            MODULE_MAX_LEN,
        );
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_follows_id_not_key() {
        let a = Permission::new("user.read", "Read User");
        let b = Permission::new("user.read", "Read User");
        assert_ne!(a, b);

        let mut renamed = a.clone();
        renamed.name = "Read Users".into();
        assert_eq!(a, renamed);

        let set: HashSet<_> = [a, b, renamed].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn create_permission_validation() {
        assert!(CreatePermission::new("user.read", "Read User").validate().is_ok());

        let errors = CreatePermission {
            key: " ".into(),
            name: String::new(),
            description: Some("d".repeat(DESCRIPTION_MAX_LEN + 1)),
            module: Some("m".repeat(MODULE_MAX_LEN + 1)),
        }
        .validate()
        .unwrap_err();

        assert_eq!(errors.errors().len(), 4);
        assert!(errors.has_field("key"));
        assert!(errors.has_field("name"));
        assert!(errors.has_field("description"));
        assert!(errors.has_field("module"));
    }

    #[test]
    fn update_permission_ignores_absent_fields() {
        assert!(UpdatePermission::default().validate().is_ok());
        assert!(
            UpdatePermission {
                module: Some(None),
                ..Default::default()
            }
            .validate()
            .is_ok()
        );

        let errors = UpdatePermission {
            key: Some(String::new()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(errors.has_field("key"));
    }
}
