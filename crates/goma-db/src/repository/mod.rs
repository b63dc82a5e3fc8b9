//! SurrealDB repository implementations.

mod permission;
mod role;
mod tenant;

pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use tenant::SurrealTenantRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for `count() ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

impl CountRow {
    /// `GROUP ALL` over an empty selection yields no row at all.
    fn total(rows: &[CountRow]) -> u64 {
        rows.first().map_or(0, |r| r.total)
    }
}

fn parse_uuid(what: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}
