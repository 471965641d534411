//! Tenant business logic
//!
//! Mirrors [`PermissionManager`](super::PermissionManager) over the tenant
//! store and serves as the tenant collaborator of the claims provider.

use super::normalizer::{normalize, LookupNormalizer, UpperInvariantNormalizer};
use super::validator::{TenantNameValidator, TenantValidator};
use crate::domain::{Key, Tenant};
use crate::error::{AppError, IdentityResult, Result};
use crate::repository::{QueryableTenantStore, StoreGuard, TenantStore};
use crate::telemetry::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the claims provider needs to know about tenants.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_id(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>>;

    async fn get_roles(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<String>>;

    async fn get_tenant_name(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<String>;

    async fn get_tenant_display_name(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

pub struct TenantManager<S: TenantStore + 'static> {
    store: Arc<S>,
    queryable: Option<Arc<dyn QueryableTenantStore>>,
    normalizer: Option<Arc<dyn LookupNormalizer>>,
    validators: Vec<Arc<dyn TenantValidator<S>>>,
    guard: StoreGuard,
}

impl<S: TenantStore + 'static> TenantManager<S> {
    pub fn new(
        store: Arc<S>,
        normalizer: Option<Arc<dyn LookupNormalizer>>,
        validators: Vec<Arc<dyn TenantValidator<S>>>,
    ) -> Self {
        Self {
            store,
            queryable: None,
            normalizer,
            validators,
            guard: StoreGuard::new("TenantManager"),
        }
    }

    pub fn queryable(
        store: Arc<S>,
        normalizer: Option<Arc<dyn LookupNormalizer>>,
        validators: Vec<Arc<dyn TenantValidator<S>>>,
    ) -> Self
    where
        S: QueryableTenantStore,
    {
        let listing: Arc<dyn QueryableTenantStore> = store.clone();
        Self {
            queryable: Some(listing),
            ..Self::new(store, normalizer, validators)
        }
    }

    pub fn with_defaults(store: Arc<S>) -> Self
    where
        S: QueryableTenantStore,
    {
        Self::queryable(
            store,
            Some(Arc::new(UpperInvariantNormalizer)),
            vec![Arc::new(TenantNameValidator)],
        )
    }

    pub fn supports_queryable_tenants(&self) -> bool {
        self.queryable.is_some()
    }

    pub async fn tenants(&self, cancel: &CancellationToken) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        match &self.queryable {
            Some(listing) => listing.tenants(cancel).await,
            None => Err(AppError::NotSupported(
                "Store does not implement QueryableTenantStore.".to_string(),
            )),
        }
    }

    pub async fn create(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;

        let result = self.validate(tenant, cancel).await?;
        if !result.succeeded() {
            return Ok(result);
        }
        self.update_normalized_tenant_name(tenant);

        let result = self.store.create(tenant, cancel).await?;
        if result.succeeded() {
            debug!(tenant_id = %tenant.id, name = %tenant.name, "Tenant created");
        }
        Ok(result)
    }

    pub async fn update(
        &self,
        tenant: &mut Tenant,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;

        let result = self.validate(tenant, cancel).await?;
        if !result.succeeded() {
            return Ok(result);
        }
        self.update_normalized_tenant_name(tenant);

        self.store.update(tenant, cancel).await
    }

    pub async fn delete(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        self.store.delete(tenant, cancel).await
    }

    pub async fn find_by_id(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        match Key::parse(tenant_id) {
            Some(id) => self.store.find_by_id(id, cancel).await,
            None => Ok(None),
        }
    }

    pub async fn find_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        self.store
            .find_by_name(&self.normalize_name(name), cancel)
            .await
    }

    pub async fn tenant_exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        Ok(self.find_by_name(name, cancel).await?.is_some())
    }

    pub fn set_tenant_name(&self, tenant: &mut Tenant, name: impl Into<String>) {
        tenant.name = name.into();
        self.update_normalized_tenant_name(tenant);
    }

    pub fn get_tenant_name(&self, tenant: &Tenant) -> String {
        tenant.name.clone()
    }

    pub fn get_tenant_display_name(&self, tenant: &Tenant) -> String {
        tenant.display_name.clone()
    }

    pub fn normalize_name(&self, name: &str) -> String {
        normalize(self.normalizer.as_deref(), name)
    }

    pub fn update_normalized_tenant_name(&self, tenant: &mut Tenant) {
        tenant.normalized_name = self.normalize_name(&tenant.name);
    }

    pub async fn add_to_role(
        &self,
        tenant: &Tenant,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        self.store
            .add_to_role(tenant, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn remove_from_role(
        &self,
        tenant: &Tenant,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        self.store
            .remove_from_role(tenant, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn get_roles(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        self.store.get_roles(tenant, cancel).await
    }

    pub async fn get_role_ids(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        self.store.get_role_ids(tenant, cancel).await
    }

    pub async fn is_in_role(
        &self,
        tenant: &Tenant,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.guard.check(cancel)?;
        self.store
            .is_in_role(tenant, &self.normalize_name(role), cancel)
            .await
    }

    pub async fn get_tenants_in_role(
        &self,
        role: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        self.store
            .get_tenants_in_role(&self.normalize_name(role), cancel)
            .await
    }

    pub fn close(&self) {
        if !self.guard.is_closed() {
            self.guard.close();
            self.store.close();
        }
    }

    async fn validate(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<IdentityResult> {
        let mut errors = Vec::new();
        for validator in &self.validators {
            errors.extend(validator.validate(self, tenant, cancel).await?);
        }
        if errors.is_empty() {
            return Ok(IdentityResult::success());
        }

        let result = IdentityResult::failed(errors);
        warn!(
            tenant_id = %tenant.id,
            codes = %result.joined_codes(),
            "Tenant validation failed"
        );
        metrics::record_validation_failure("tenant");
        Ok(result)
    }
}

#[async_trait]
impl<S: TenantStore + 'static> TenantDirectory for TenantManager<S> {
    async fn find_by_id(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>> {
        TenantManager::find_by_id(self, tenant_id, cancel).await
    }

    async fn get_roles(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<String>> {
        TenantManager::get_roles(self, tenant, cancel).await
    }

    async fn get_tenant_name(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<String> {
        self.guard.check(cancel)?;
        Ok(TenantManager::get_tenant_name(self, tenant))
    }

    async fn get_tenant_display_name(
        &self,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.guard.check(cancel)?;
        Ok(TenantManager::get_tenant_display_name(self, tenant))
    }
}
