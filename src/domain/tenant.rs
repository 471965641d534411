//! Tenant domain model

use super::key::Key;
use super::permission::MAX_NAME_LENGTH;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Tenant entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, Validate)]
pub struct Tenant {
    pub id: Key,
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name: String,
    pub normalized_name: String,
    pub display_name: String,
    pub concurrency_stamp: String,
    pub is_hierarchical: bool,
    /// Tenant data lives in its own physical database named `database_name`
    pub has_separate_database: bool,
    pub database_name: String,
}

impl Tenant {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Route this tenant's data to a dedicated database.
    pub fn with_separate_database(mut self, database_name: impl Into<String>) -> Self {
        self.has_separate_database = true;
        self.database_name = database_name.into();
        self
    }
}

impl Default for Tenant {
    fn default() -> Self {
        Self {
            id: Key::new_v4(),
            name: String::new(),
            normalized_name: String::new(),
            display_name: String::new(),
            concurrency_stamp: String::new(),
            is_hierarchical: false,
            has_separate_database: false,
            database_name: String::new(),
        }
    }
}

/// Tenant-Role association; `(tenant_id, role_id)` is the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct TenantRole {
    pub tenant_id: Key,
    pub role_id: Key,
}
