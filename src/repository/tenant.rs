//! Tenant repository

use super::{
    is_foreign_key_violation, is_unique_violation, require_role_name, role_not_found,
    violates_unique_index, StoreGuard,
};
use crate::domain::{new_concurrency_stamp, Key, Role, Tenant};
use crate::error::{AppError, IdentityError, IdentityResult, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use sqlx::MySqlPool;
use tokio_util::sync::CancellationToken;

/// Unique index over `normalized_name`.
const NAME_INDEX: &str = "idx_tenants_normalized_name";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert a tenant, assigning it a fresh concurrency stamp.
    async fn create(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    /// Persist changes. `tenant.concurrency_stamp` must hold the stamp
    /// that was read; on success it is replaced by the new one.
    async fn update(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    /// Remove a tenant together with its role associations.
    async fn delete(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult>;

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Tenant>>;

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>>;

    // Tenant-Role associations
    async fn add_to_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn remove_from_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_roles(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>>;

    async fn get_role_ids(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>>;

    async fn is_in_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    async fn get_tenants_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Tenant>>;

    /// Dispose the store; every later call fails with `Disposed`.
    fn close(&self);
}

/// Optional capability: list every tenant.
#[async_trait]
pub trait QueryableTenantStore: Send + Sync {
    async fn tenants(&self, cancel: &CancellationToken) -> Result<Vec<Tenant>>;
}

pub struct TenantStoreImpl {
    pool: MySqlPool,
    guard: StoreGuard,
}

impl TenantStoreImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            guard: StoreGuard::new("TenantStore"),
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
impl TenantStore for TenantStoreImpl {
    async fn create(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        tenant.concurrency_stamp = new_concurrency_stamp();

        let result = sqlx::query(
            r#"
            INSERT INTO tenants (id, name, normalized_name, display_name, concurrency_stamp, is_hierarchical, has_separate_database, database_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.normalized_name)
        .bind(&tenant.display_name)
        .bind(&tenant.concurrency_stamp)
        .bind(tenant.is_hierarchical)
        .bind(tenant.has_separate_database)
        .bind(&tenant.database_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(IdentityResult::success()),
            // Lost the validate-then-insert race against another writer
            Err(e) if violates_unique_index(&e, NAME_INDEX) => Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_tenant_name(&tenant.name),
            ])),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Tenant {} already exists.",
                tenant.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let expected = std::mem::replace(
            &mut tenant.concurrency_stamp,
            new_concurrency_stamp(),
        );

        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET name = ?, normalized_name = ?, display_name = ?, concurrency_stamp = ?,
                is_hierarchical = ?, has_separate_database = ?, database_name = ?
            WHERE id = ? AND concurrency_stamp = ?
            "#,
        )
        .bind(&tenant.name)
        .bind(&tenant.normalized_name)
        .bind(&tenant.display_name)
        .bind(&tenant.concurrency_stamp)
        .bind(tenant.is_hierarchical)
        .bind(tenant.has_separate_database)
        .bind(&tenant.database_name)
        .bind(tenant.id)
        .bind(&expected)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(IdentityResult::success()),
            Ok(_) => {
                tenant.concurrency_stamp = expected;
                metrics::record_concurrency_failure("tenant");
                Ok(IdentityResult::failed(vec![
                    IdentityError::concurrency_failure(),
                ]))
            }
            Err(e) => {
                tenant.concurrency_stamp = expected;
                if violates_unique_index(&e, NAME_INDEX) {
                    Ok(IdentityResult::failed(vec![
                        IdentityError::duplicate_tenant_name(&tenant.name),
                    ]))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn delete(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut tx = self.pool.begin().await?;

        // Delete tenant-role mappings first
        sqlx::query("DELETE FROM tenant_roles WHERE tenant_id = ?")
            .bind(tenant.id)
            .execute(&mut *tx)
            .await?;

        self.guard.check(cancel)?;
        let done = sqlx::query("DELETE FROM tenants WHERE id = ? AND concurrency_stamp = ?")
            .bind(tenant.id)
            .bind(&tenant.concurrency_stamp)
            .execute(&mut *tx)
            .await?;

        if done.rows_affected() == 0 {
            tx.rollback().await?;
            metrics::record_concurrency_failure("tenant");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        }

        tx.commit().await?;
        Ok(IdentityResult::success())
    }

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, normalized_name, display_name, concurrency_stamp, is_hierarchical, has_separate_database, database_name FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, normalized_name, display_name, concurrency_stamp, is_hierarchical, has_separate_database, database_name FROM tenants WHERE normalized_name = ?",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn add_to_role(
        &self,
        tenant: &Tenant,
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
        let result = sqlx::query("INSERT INTO tenant_roles (tenant_id, role_id) VALUES (?, ?)")
            .bind(tenant.id)
            .bind(role.id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Tenant '{}' is already in role '{}'.",
                tenant.name, normalized_role_name
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::InvalidOperation(format!(
                "The tenant '{}' has not been persisted.",
                tenant.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_from_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        if let Some(role) = self.find_role(normalized_role_name).await? {
            self.guard.check(cancel)?;
            sqlx::query("DELETE FROM tenant_roles WHERE tenant_id = ? AND role_id = ?")
                .bind(tenant.id)
                .bind(role.id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn get_roles(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM tenant_roles tr
            INNER JOIN roles r ON tr.role_id = r.id
            WHERE tr.tenant_id = ?
            "#,
        )
        .bind(tenant.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn get_role_ids(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        let ids = sqlx::query_scalar::<_, Key>(
            r#"
            SELECT r.id
            FROM tenant_roles tr
            INNER JOIN roles r ON tr.role_id = r.id
            WHERE tr.tenant_id = ?
            "#,
        )
        .bind(tenant.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_in_role(
        &self,
        tenant: &Tenant,
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
            "SELECT COUNT(*) FROM tenant_roles WHERE tenant_id = ? AND role_id = ?",
        )
        .bind(tenant.id)
        .bind(role.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn get_tenants_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;

        let Some(role) = self.find_role(normalized_role_name).await? else {
            return Ok(Vec::new());
        };

        self.guard.check(cancel)?;
        let tenants = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT t.id, t.name, t.normalized_name, t.display_name, t.concurrency_stamp,
                   t.is_hierarchical, t.has_separate_database, t.database_name
            FROM tenant_roles tr
            INNER JOIN tenants t ON tr.tenant_id = t.id
            WHERE tr.role_id = ?
            "#,
        )
        .bind(role.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }

    fn close(&self) {
        self.guard.close();
    }
}

#[async_trait]
impl QueryableTenantStore for TenantStoreImpl {
    async fn tenants(&self, cancel: &CancellationToken) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        let tenants = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, normalized_name, display_name, concurrency_stamp, is_hierarchical, has_separate_database, database_name FROM tenants ORDER BY normalized_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }
}
