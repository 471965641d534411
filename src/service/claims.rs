//! Claims resolution
//!
//! Walks user → roles → permissions and, when a tenant directory is attached
//! and the user belongs to a tenant, tenant → roles → permissions, then adds
//! the tenant identity claims.

use super::permission::PermissionManager;
use super::tenant::TenantDirectory;
use crate::config::ClaimsConfig;
use crate::domain::{claim_types, Claim, ClaimSet, User};
use crate::error::{AppError, Result};
use crate::repository::{PermissionStore, UserDirectory};
use crate::telemetry::metrics;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ClaimsProvider<U: UserDirectory, P: PermissionStore + 'static> {
    users: Arc<U>,
    permissions: Arc<PermissionManager<P>>,
    tenants: Option<Arc<dyn TenantDirectory>>,
    deduplicate: bool,
}

impl<U: UserDirectory, P: PermissionStore + 'static> ClaimsProvider<U, P> {
    /// Provider that only resolves the user's own roles.
    pub fn new(users: Arc<U>, permissions: Arc<PermissionManager<P>>) -> Self {
        Self {
            users,
            permissions,
            tenants: None,
            deduplicate: false,
        }
    }

    /// Resolve tenant role permissions and tenant claims as well.
    pub fn with_tenants(mut self, tenants: Arc<dyn TenantDirectory>) -> Self {
        self.tenants = Some(tenants);
        self
    }

    pub fn deduplicate_permission_claims(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Apply [`ClaimsConfig`]. The tenant directory is only attached when the
    /// configuration is tenant-aware.
    pub fn configure(self, config: &ClaimsConfig, tenants: Arc<dyn TenantDirectory>) -> Self {
        let provider = self.deduplicate_permission_claims(config.deduplicate_permission_claims);
        if config.tenant_aware {
            provider.with_tenants(tenants)
        } else {
            provider
        }
    }

    pub fn is_tenant_aware(&self) -> bool {
        self.tenants.is_some()
    }

    pub async fn find_user(&self, user_id: &str) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Resolve every claim for `user_id`. An unknown user is `NotFound`.
    pub async fn get_claims(&self, user_id: &str, cancel: &CancellationToken) -> Result<ClaimSet> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let user = self.find_user(user_id).await?;
        self.get_claims_for(&user, cancel).await
    }

    pub async fn get_claims_for(&self, user: &User, cancel: &CancellationToken) -> Result<ClaimSet> {
        let mut claims = Vec::new();

        let roles = self.users.get_roles(user).await?;
        self.push_permission_claims(&roles, &mut claims, cancel)
            .await?;

        let mut tenant_resolved = false;
        if let Some(tenants) = &self.tenants {
            let tenant_id = self
                .users
                .get_tenant_id(user)
                .await?
                .filter(|id| !id.trim().is_empty());

            if let Some(tenant_id) = tenant_id {
                let tenant = tenants
                    .find_by_id(&tenant_id, cancel)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Tenant {} not found", tenant_id))
                    })?;

                let tenant_roles = tenants.get_roles(&tenant, cancel).await?;
                self.push_permission_claims(&tenant_roles, &mut claims, cancel)
                    .await?;

                claims.push(Claim::new(claim_types::TENANT_ID, tenant_id));
                claims.push(Claim::new(
                    claim_types::TENANT_NAME,
                    tenants.get_tenant_name(&tenant, cancel).await?,
                ));
                claims.push(Claim::new(
                    claim_types::TENANT_DISPLAY_NAME,
                    tenants.get_tenant_display_name(&tenant, cancel).await?,
                ));
                tenant_resolved = true;
            }
        }

        if self.deduplicate {
            let mut seen = HashSet::new();
            claims.retain(|c| !c.is_permission() || seen.insert(c.value.clone()));
        }

        debug!(
            user_id = %user.id,
            roles = roles.len(),
            claims = claims.len(),
            tenant = tenant_resolved,
            "Resolved claims"
        );
        metrics::record_claims_resolved(tenant_resolved);

        Ok(ClaimSet::from_vec(claims))
    }

    async fn push_permission_claims(
        &self,
        roles: &[String],
        claims: &mut Vec<Claim>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for role in roles {
            let permissions = self.permissions.get_permissions_in_role(role, cancel).await?;
            claims.extend(permissions.into_iter().map(|p| Claim::permission(p.name)));
        }
        Ok(())
    }
}

/// The authenticated identity handed to the host after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimsIdentity {
    claims: ClaimSet,
}

impl ClaimsIdentity {
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn user_id(&self) -> Option<&str> {
        self.claims.first_value(claim_types::USER_ID)
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }
}

/// Builds the signed-in identity: base user claims followed by resolved claims.
pub struct PermissionClaimsPrincipalFactory<U: UserDirectory, P: PermissionStore + 'static> {
    provider: Arc<ClaimsProvider<U, P>>,
}

impl<U: UserDirectory, P: PermissionStore + 'static> PermissionClaimsPrincipalFactory<U, P> {
    pub fn new(provider: Arc<ClaimsProvider<U, P>>) -> Self {
        Self { provider }
    }

    pub async fn create(&self, user_id: &str, cancel: &CancellationToken) -> Result<ClaimsIdentity> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let user = self.provider.find_user(user_id).await?;

        let mut claims = vec![
            Claim::new(claim_types::USER_ID, user.id.to_string()),
            Claim::new(claim_types::USER_NAME, user.user_name.clone()),
        ];
        claims.extend(self.provider.get_claims_for(&user, cancel).await?);

        Ok(ClaimsIdentity {
            claims: ClaimSet::from_vec(claims),
        })
    }
}
