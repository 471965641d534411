//! Permission domain model

use super::key::Key;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Width of the `name` / `normalized_name` columns.
pub const MAX_NAME_LENGTH: u64 = 256;

/// Permission entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, Validate)]
pub struct Permission {
    pub id: Key,
    /// Display name, e.g. "Invoice.Read"
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name: String,
    /// Canonical form used for uniqueness and lookups
    pub normalized_name: String,
    /// Optimistic-lock token, regenerated by the store on every write
    pub concurrency_stamp: String,
}

impl Permission {
    /// A new, not yet persisted permission. Normalization and the stamp are
    /// filled in by the manager and store on `create`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self {
            id: Key::new_v4(),
            name: String::new(),
            normalized_name: String::new(),
            concurrency_stamp: String::new(),
        }
    }
}

/// Role-Permission association; `(role_id, permission_id)` is the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role_id: Key,
    pub permission_id: Key,
}
