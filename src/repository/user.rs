//! User lookups for claims resolution
//!
//! Users are owned by the identity subsystem. This crate only needs to find
//! a user, list the names of the user's roles and read the optional tenant
//! reference.

use crate::domain::{Key, User};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>>;
    async fn get_roles(&self, user: &User) -> Result<Vec<String>>;
    async fn get_tenant_id(&self, user: &User) -> Result<Option<String>>;
}

pub struct UserDirectoryImpl {
    pool: MySqlPool,
}

impl UserDirectoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserDirectoryImpl {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let Some(id) = Key::parse(user_id) else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, User>(
            "SELECT id, user_name, tenant_id FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_roles(&self, user: &User) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM user_roles ur
            INNER JOIN roles r ON ur.role_id = r.id
            WHERE ur.user_id = ?
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn get_tenant_id(&self, user: &User) -> Result<Option<String>> {
        Ok(user.tenant_id.map(|id| id.to_string()))
    }
}
