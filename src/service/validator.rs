//! Validators run by the managers before every create and update

use super::permission::PermissionManager;
use super::tenant::TenantManager;
use crate::domain::{Permission, Tenant};
use crate::error::{IdentityError, Result};
use crate::repository::{PermissionStore, TenantStore};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// A check applied to a permission before it is persisted.
///
/// An empty vector means the permission passed.
#[async_trait]
pub trait PermissionValidator<S: PermissionStore + 'static>: Send + Sync {
    async fn validate(
        &self,
        manager: &PermissionManager<S>,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<IdentityError>>;
}

#[async_trait]
pub trait TenantValidator<S: TenantStore + 'static>: Send + Sync {
    async fn validate(
        &self,
        manager: &TenantManager<S>,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<IdentityError>>;
}

/// Rejects blank or over-long names and names already owned by another permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionNameValidator;

#[async_trait]
impl<S: PermissionStore + 'static> PermissionValidator<S> for PermissionNameValidator {
    async fn validate(
        &self,
        manager: &PermissionManager<S>,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<IdentityError>> {
        if permission.name.trim().is_empty() || permission.validate().is_err() {
            return Ok(vec![IdentityError::invalid_permission_name(
                &permission.name,
            )]);
        }

        match manager.find_by_name(&permission.name, cancel).await? {
            Some(owner) if owner.id != permission.id => Ok(vec![
                IdentityError::duplicate_permission_name(&permission.name),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}

/// Tenant counterpart of [`PermissionNameValidator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantNameValidator;

#[async_trait]
impl<S: TenantStore + 'static> TenantValidator<S> for TenantNameValidator {
    async fn validate(
        &self,
        manager: &TenantManager<S>,
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Vec<IdentityError>> {
        if tenant.name.trim().is_empty() || tenant.validate().is_err() {
            return Ok(vec![IdentityError::invalid_tenant_name(&tenant.name)]);
        }

        match manager.find_by_name(&tenant.name, cancel).await? {
            Some(owner) if owner.id != tenant.id => {
                Ok(vec![IdentityError::duplicate_tenant_name(&tenant.name)])
            }
            _ => Ok(Vec::new()),
        }
    }
}
