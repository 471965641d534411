//! Permission repository

use super::{
    is_foreign_key_violation, is_unique_violation, require_role_name, role_not_found,
    violates_unique_index, StoreGuard,
};
use crate::domain::{new_concurrency_stamp, Key, Permission, Role};
use crate::error::{AppError, IdentityError, IdentityResult, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use sqlx::MySqlPool;
use tokio_util::sync::CancellationToken;

/// Unique index over `normalized_name`.
const NAME_INDEX: &str = "idx_permissions_normalized_name";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Insert a permission, assigning it a fresh concurrency stamp.
    async fn create(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    /// Persist changes. `permission.concurrency_stamp` must hold the stamp
    /// that was read; on success it is replaced by the new one.
    async fn update(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    /// Remove a permission together with its role associations.
    async fn delete(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Permission>>;

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Permission>>;

    // Role-Permission associations
    async fn add_to_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn remove_from_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_roles(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;

    async fn get_role_ids(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>>;

    async fn is_in_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    async fn get_permissions_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Permission>>;

    /// Dispose the store; every later call fails with `Disposed`.
    fn close(&self);
}

/// Optional capability: list every permission.
#[async_trait]
pub trait QueryablePermissionStore: Send + Sync {
    async fn permissions(&self, cancel: &CancellationToken) -> Result<Vec<Permission>>;
}

pub struct PermissionStoreImpl {
    pool: MySqlPool,
    guard: StoreGuard,
}

impl PermissionStoreImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            guard: StoreGuard::new("PermissionStore"),
        }
    }

    async fn find_role(&self, normalized_role_name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, normalized_name FROM roles WHERE normalized_name = ?",
        )
        .bind(normalized_role_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }
}

#[async_trait]
impl PermissionStore for PermissionStoreImpl {
    async fn create(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        permission.concurrency_stamp = new_concurrency_stamp();

        let result = sqlx::query(
            r#"
            INSERT INTO permissions (id, name, normalized_name, concurrency_stamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(permission.id)
        .bind(&permission.name)
        .bind(&permission.normalized_name)
        .bind(&permission.concurrency_stamp)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(IdentityResult::success()),
            // Lost the validate-then-insert race against another writer
            Err(e) if violates_unique_index(&e, NAME_INDEX) => Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_permission_name(&permission.name),
            ])),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Permission {} already exists.",
                permission.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let expected = std::mem::replace(
            &mut permission.concurrency_stamp,
            new_concurrency_stamp(),
        );

        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = ?, normalized_name = ?, concurrency_stamp = ?
            WHERE id = ? AND concurrency_stamp = ?
            "#,
        )
        .bind(&permission.name)
        .bind(&permission.normalized_name)
        .bind(&permission.concurrency_stamp)
        .bind(permission.id)
        .bind(&expected)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(IdentityResult::success()),
            Ok(_) => {
                permission.concurrency_stamp = expected;
                metrics::record_concurrency_failure("permission");
                Ok(IdentityResult::failed(vec![
                    IdentityError::concurrency_failure(),
                ]))
            }
            Err(e) => {
                permission.concurrency_stamp = expected;
                if violates_unique_index(&e, NAME_INDEX) {
                    Ok(IdentityResult::failed(vec![
                        IdentityError::duplicate_permission_name(&permission.name),
                    ]))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn delete(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut tx = self.pool.begin().await?;

        // Delete role-permission mappings first
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(permission.id)
            .execute(&mut *tx)
            .await?;

        self.guard.check(cancel)?;
        let done = sqlx::query("DELETE FROM permissions WHERE id = ? AND concurrency_stamp = ?")
            .bind(permission.id)
            .bind(&permission.concurrency_stamp)
            .execute(&mut *tx)
            .await?;

        if done.rows_affected() == 0 {
            tx.rollback().await?;
            metrics::record_concurrency_failure("permission");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        }

        tx.commit().await?;
        Ok(IdentityResult::success())
    }

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        let permission = sqlx::query_as::<_, Permission>(
            "SELECT id, name, normalized_name, concurrency_stamp FROM permissions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        let permission = sqlx::query_as::<_, Permission>(
            "SELECT id, name, normalized_name, concurrency_stamp FROM permissions WHERE normalized_name = ?",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn add_to_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        let role = self
            .find_role(normalized_role_name)
            .await?
            .ok_or_else(|| role_not_found(normalized_role_name))?;

        self.guard.check(cancel)?;
        let result = sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role.id)
            .bind(permission.id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Permission '{}' is already in role '{}'.",
                permission.name, normalized_role_name
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::InvalidOperation(format!(
                "The permission '{}' has not been persisted.",
                permission.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_from_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        if let Some(role) = self.find_role(normalized_role_name).await? {
            self.guard.check(cancel)?;
            sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
                .bind(role.id)
                .bind(permission.id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn get_roles(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM role_permissions rp
            INNER JOIN roles r ON rp.role_id = r.id
            WHERE rp.permission_id = ?
            "#,
        )
        .bind(permission.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn get_role_ids(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        let ids = sqlx::query_scalar::<_, Key>(
            r#"
            SELECT r.id
            FROM role_permissions rp
            INNER JOIN roles r ON rp.role_id = r.id
            WHERE rp.permission_id = ?
            "#,
        )
        .bind(permission.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_in_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        let Some(role) = self.find_role(normalized_role_name).await? else {
            return Ok(false);
        };

        self.guard.check(cancel)?;
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_permissions WHERE role_id = ? AND permission_id = ?",
        )
        .bind(role.id)
        .bind(permission.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn get_permissions_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        let Some(role) = self.find_role(normalized_role_name).await? else {
            return Ok(Vec::new());
        };

        self.guard.check(cancel)?;
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.normalized_name, p.concurrency_stamp
            FROM role_permissions rp
            INNER JOIN permissions p ON rp.permission_id = p.id
            WHERE rp.role_id = ?
            "#,
        )
        .bind(role.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    fn close(&self) {
        self.guard.close();
    }
}

#[async_trait]
impl QueryablePermissionStore for PermissionStoreImpl {
    async fn permissions(&self, cancel: &CancellationToken) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, name, normalized_name, concurrency_stamp FROM permissions ORDER BY normalized_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }
}
