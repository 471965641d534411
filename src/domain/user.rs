//! Role and user records owned by the identity subsystem.
//!
//! This crate reads them (role lookups during association, user lookups
//! during claims resolution) but never writes them outside of seeding.

use super::key::Key;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Key,
    pub name: String,
    pub normalized_name: String,
}

impl Role {
    pub fn new(name: impl Into<String>, normalized_name: impl Into<String>) -> Self {
        Self {
            id: Key::new_v4(),
            name: name.into(),
            normalized_name: normalized_name.into(),
        }
    }
}

/// User entity. `tenant_id` is `None` for tenant-less deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Key,
    pub user_name: String,
    pub tenant_id: Option<Key>,
}

impl User {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            id: Key::new_v4(),
            user_name: user_name.into(),
            tenant_id: None,
        }
    }

    pub fn in_tenant(mut self, tenant_id: Key) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }
}
