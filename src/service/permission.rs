//! Permission business logic

use super::normalizer::{normalize, LookupNormalizer, UpperInvariantNormalizer};
use super::validator::{PermissionNameValidator, PermissionValidator};
use crate::domain::{Key, Permission};
use crate::error::{AppError, IdentityResult, Result};
use crate::repository::{PermissionStore, QueryablePermissionStore, StoreGuard};
use crate::telemetry::metrics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct PermissionManager<S: PermissionStore + 'static> {
    store: Arc<S>,
    queryable: Option<Arc<dyn QueryablePermissionStore>>,
    normalizer: Option<Arc<dyn LookupNormalizer>>,
    validators: Vec<Arc<dyn PermissionValidator<S>>>,
    guard: StoreGuard,
}

impl<S: PermissionStore + 'static> PermissionManager<S> {
    /// Manager without the listing capability; `permissions()` fails with
    /// `NotSupported`.
    pub fn new(
        store: Arc<S>,
        normalizer: Option<Arc<dyn LookupNormalizer>>,
        validators: Vec<Arc<dyn PermissionValidator<S>>>,
    ) -> Self {
        Self {
            store,
            queryable: None,
            normalizer,
            validators,
            guard: StoreGuard::new("PermissionManager"),
        }
    }

    /// Manager over a store that can also list every permission.
    pub fn queryable(
        store: Arc<S>,
        normalizer: Option<Arc<dyn LookupNormalizer>>,
        validators: Vec<Arc<dyn PermissionValidator<S>>>,
    ) -> Self
    where
        S: QueryablePermissionStore,
    {
        let listing: Arc<dyn QueryablePermissionStore> = store.clone();
        Self {
            queryable: Some(listing),
            ..Self::new(store, normalizer, validators)
        }
    }

    /// Upper-invariant normalizer plus the built-in name validator.
    pub fn with_defaults(store: Arc<S>) -> Self
    where
        S: QueryablePermissionStore,
    {
        Self::queryable(
            store,
            Some(Arc::new(UpperInvariantNormalizer)),
            vec![Arc::new(PermissionNameValidator)],
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn supports_queryable_permissions(&self) -> bool {
        self.queryable.is_some()
    }

    pub async fn permissions(&self, cancel: &CancellationToken) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        match &self.queryable {
            Some(listing) => listing.permissions(cancel).await,
            None => Err(AppError::NotSupported(
                "Store does not implement QueryablePermissionStore.".to_string(),
            )),
        }
    }

    pub async fn create(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;

        let result = self.validate(permission, cancel).await?;
        if !result.succeeded() {
            return Ok(result);
        }
        self.update_normalized_permission_name(permission);

        let result = self.store.create(permission, cancel).await?;
        if result.succeeded() {
            debug!(permission_id = %permission.id, name = %permission.name, "Permission created");
        }
        Ok(result)
    }

    pub async fn update(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;

        let result = self.validate(permission, cancel).await?;
        if !result.succeeded() {
            return Ok(result);
        }
        self.update_normalized_permission_name(permission);

        self.store.update(permission, cancel).await
    }

    pub async fn delete(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        self.store.delete(permission, cancel).await
    }

    /// Look up by the string form of the key. An id that does not parse is a miss.
    pub async fn find_by_id(
        &self,
        permission_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        match Key::parse(permission_id) {
            Some(id) => self.store.find_by_id(id, cancel).await,
            None => Ok(None),
        }
    }

    pub async fn find_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        self.store
            .find_by_name(&self.normalize_name(name), cancel)
            .await
    }

    pub async fn permission_exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        Ok(self.find_by_name(name, cancel).await?.is_some())
    }

    /// Rename in memory; call `update` to persist.
    pub fn set_permission_name(&self, permission: &mut Permission, name: impl Into<String>) {
        permission.name = name.into();
        self.update_normalized_permission_name(permission);
    }

    pub fn normalize_name(&self, name: &str) -> String {
        normalize(self.normalizer.as_deref(), name)
    }

    pub fn update_normalized_permission_name(&self, permission: &mut Permission) {
        permission.normalized_name = self.normalize_name(&permission.name);
    }

    pub async fn add_to_role(
        &self,
        permission: &Permission,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        self.store
            .add_to_role(permission, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn remove_from_role(
        &self,
        permission: &Permission,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        self.store
            .remove_from_role(permission, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn get_roles(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        self.store.get_roles(permission, cancel).await
    }

    pub async fn get_role_ids(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        self.store.get_role_ids(permission, cancel).await
    }

    pub async fn is_in_role(
        &self,
        permission: &Permission,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.guard.check(cancel)?;
        self.store
            .is_in_role(permission, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn get_permissions_in_role(
        &self,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        self.store
            .get_permissions_in_role(&self.normalize_name(role), cancel)
            .await
    }

    /// Dispose the manager and its store.
    pub fn close(&self) {
        if !self.guard.is_closed() {
            self.guard.close();
            self.store.close();
        }
    }

    async fn validate(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        let mut errors = Vec::new();
        for validator in &self.validators {
            errors.extend(validator.validate(self, permission, cancel).await?);
        }
        if errors.is_empty() {
            return Ok(IdentityResult::success());
        }

        let result = IdentityResult::failed(errors);
        warn!(
            permission_id = %permission.id,
            codes = %result.joined_codes(),
            "Permission validation failed"
        );
        metrics::record_validation_failure("permission");
        Ok(result)
    }
}
