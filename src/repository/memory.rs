//! In-memory implementation of the permission, tenant and user stores.
//!
//! All tables live in one `MemoryState` behind a `tokio::sync::RwLock` so the
//! stores handed out by a [`MemoryDatabase`] observe each other's writes the
//! way stores sharing one relational database do. The same constraints are
//! enforced as in MySQL: unique normalized names, composite keys on the
//! association tables, concurrency-stamp checks on update/delete and cascade
//! removal of association rows.
//!
//! Not durable: state is lost when the last handle is dropped.

use super::{
    require_role_name, role_not_found, PermissionStore, QueryablePermissionStore,
    QueryableTenantStore, StoreGuard, TenantStore, UserDirectory,
};
use crate::domain::{
    new_concurrency_stamp, Key, Permission, Role, RolePermission, Tenant, TenantRole, User,
};
use crate::error::{AppError, IdentityError, IdentityResult, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct MemoryState {
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    role_permissions: Vec<RolePermission>,
    tenants: Vec<Tenant>,
    tenant_roles: Vec<TenantRole>,
    users: Vec<User>,
    user_roles: Vec<(Key, Key)>,
}

impl MemoryState {
    fn role_by_name(&self, normalized_role_name: &str) -> Option<&Role> {
        self.roles
            .iter()
            .find(|r| r.normalized_name == normalized_role_name)
    }

    fn role_by_id(&self, id: Key) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }
}

/// Shared in-memory database. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permission_store(&self) -> MemoryPermissionStore {
        MemoryPermissionStore {
            state: self.state.clone(),
            guard: StoreGuard::new("MemoryPermissionStore"),
        }
    }

    pub fn tenant_store(&self) -> MemoryTenantStore {
        MemoryTenantStore {
            state: self.state.clone(),
            guard: StoreGuard::new("MemoryTenantStore"),
        }
    }

    pub fn user_directory(&self) -> MemoryUserDirectory {
        MemoryUserDirectory {
            state: self.state.clone(),
        }
    }

    /// Seed a role. Roles belong to the identity subsystem, so the caller
    /// supplies the normalized name it uses.
    pub async fn add_role(
        &self,
        name: impl Into<String>,
        normalized_name: impl Into<String>,
    ) -> Result<Role> {
        let role = Role::new(name, normalized_name);
        let mut state = self.state.write().await;
        if state.role_by_name(&role.normalized_name).is_some() {
            return Err(AppError::Conflict(format!(
                "Role '{}' already exists.",
                role.normalized_name
            )));
        }
        state.roles.push(role.clone());
        Ok(role)
    }

    /// Delete a role and every association row pointing at it.
    pub async fn remove_role(&self, role_id: Key) {
        let mut state = self.state.write().await;
        state.roles.retain(|r| r.id != role_id);
        state.role_permissions.retain(|rp| rp.role_id != role_id);
        state.tenant_roles.retain(|tr| tr.role_id != role_id);
        state.user_roles.retain(|(_, r)| *r != role_id);
    }

    pub async fn add_user(&self, user: User) -> Result<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.id == user.id) {
            return Err(AppError::Conflict(format!("User {} already exists.", user.id)));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    pub async fn add_user_to_role(&self, user_id: Key, normalized_role_name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let role_id = state
            .role_by_name(normalized_role_name)
            .map(|r| r.id)
            .ok_or_else(|| role_not_found(normalized_role_name))?;
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        if state.user_roles.contains(&(user_id, role_id)) {
            return Err(AppError::Conflict(format!(
                "User {} is already in role '{}'.",
                user_id, normalized_role_name
            )));
        }
        state.user_roles.push((user_id, role_id));
        Ok(())
    }
}

pub struct MemoryPermissionStore {
    state: Arc<RwLock<MemoryState>>,
    guard: StoreGuard,
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn create(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        if state.permissions.iter().any(|p| p.id == permission.id) {
            return Err(AppError::Conflict(format!(
                "Permission {} already exists.",
                permission.id
            )));
        }
        if state
            .permissions
            .iter()
            .any(|p| p.normalized_name == permission.normalized_name)
        {
            return Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_permission_name(&permission.name),
            ]));
        }

        permission.concurrency_stamp = new_concurrency_stamp();
        state.permissions.push(permission.clone());
        Ok(IdentityResult::success())
    }

    async fn update(
        &self,
        permission: &mut Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        let Some(index) = state
            .permissions
            .iter()
            .position(|p| p.id == permission.id && p.concurrency_stamp == permission.concurrency_stamp)
        else {
            metrics::record_concurrency_failure("permission");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        };

        if state
            .permissions
            .iter()
            .any(|p| p.id != permission.id && p.normalized_name == permission.normalized_name)
        {
            return Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_permission_name(&permission.name),
            ]));
        }

        permission.concurrency_stamp = new_concurrency_stamp();
        state.permissions[index] = permission.clone();
        Ok(IdentityResult::success())
    }

    async fn delete(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        let Some(index) = state
            .permissions
            .iter()
            .position(|p| p.id == permission.id && p.concurrency_stamp == permission.concurrency_stamp)
        else {
            metrics::record_concurrency_failure("permission");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        };

        state.permissions.remove(index);
        state
            .role_permissions
            .retain(|rp| rp.permission_id != permission.id);
        Ok(IdentityResult::success())
    }

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state.permissions.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Permission>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .permissions
            .iter()
            .find(|p| p.normalized_name == normalized_name)
            .cloned())
    }

    async fn add_to_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let mut state = self.state.write().await;

        let role_id = state
            .role_by_name(normalized_role_name)
            .map(|r| r.id)
            .ok_or_else(|| role_not_found(normalized_role_name))?;
        if !state.permissions.iter().any(|p| p.id == permission.id) {
            return Err(AppError::InvalidOperation(format!(
                "The permission '{}' has not been persisted.",
                permission.name
            )));
        }

        let link = RolePermission {
            role_id,
            permission_id: permission.id,
        };
        if state.role_permissions.contains(&link) {
            return Err(AppError::Conflict(format!(
                "Permission '{}' is already in role '{}'.",
                permission.name, normalized_role_name
            )));
        }
        state.role_permissions.push(link);
        Ok(())
    }

    async fn remove_from_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let mut state = self.state.write().await;

        if let Some(role_id) = state.role_by_name(normalized_role_name).map(|r| r.id) {
            state
                .role_permissions
                .retain(|rp| !(rp.role_id == role_id && rp.permission_id == permission.id));
        }
        Ok(())
    }

    async fn get_roles(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .filter(|rp| rp.permission_id == permission.id)
            .filter_map(|rp| state.role_by_id(rp.role_id))
            .map(|r| r.name.clone())
            .collect())
    }

    async fn get_role_ids(
        &self,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .filter(|rp| rp.permission_id == permission.id)
            .map(|rp| rp.role_id)
            .collect())
    }

    async fn is_in_role(
        &self,
        permission: &Permission,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let state = self.state.read().await;

        Ok(match state.role_by_name(normalized_role_name) {
            Some(role) => state.role_permissions.contains(&RolePermission {
                role_id: role.id,
                permission_id: permission.id,
            }),
            None => false,
        })
    }

    async fn get_permissions_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let state = self.state.read().await;

        let Some(role_id) = state.role_by_name(normalized_role_name).map(|r| r.id) else {
            return Ok(Vec::new());
        };
        Ok(state
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| state.permissions.iter().find(|p| p.id == rp.permission_id))
            .cloned()
            .collect())
    }

    fn close(&self) {
        self.guard.close();
    }
}

#[async_trait]
impl QueryablePermissionStore for MemoryPermissionStore {
    async fn permissions(&self, cancel: &CancellationToken) -> Result<Vec<Permission>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        let mut all = state.permissions.clone();
        all.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(all)
    }
}

pub struct MemoryTenantStore {
    state: Arc<RwLock<MemoryState>>,
    guard: StoreGuard,
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn create(&self, tenant: &mut Tenant, cancel: &CancellationToken) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        if state.tenants.iter().any(|t| t.id == tenant.id) {
            return Err(AppError::Conflict(format!("Tenant {} already exists.", tenant.id)));
        }
        if state
            .tenants
            .iter()
            .any(|t| t.normalized_name == tenant.normalized_name)
        {
            return Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_tenant_name(&tenant.name),
            ]));
        }

        tenant.concurrency_stamp = new_concurrency_stamp();
        state.tenants.push(tenant.clone());
        Ok(IdentityResult::success())
    }

    async fn update(&self, tenant: &mut Tenant, cancel: &CancellationToken) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        let Some(index) = state
            .tenants
            .iter()
            .position(|t| t.id == tenant.id && t.concurrency_stamp == tenant.concurrency_stamp)
        else {
            metrics::record_concurrency_failure("tenant");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        };

        if state
            .tenants
            .iter()
            .any(|t| t.id != tenant.id && t.normalized_name == tenant.normalized_name)
        {
            return Ok(IdentityResult::failed(vec![
                IdentityError::duplicate_tenant_name(&tenant.name),
            ]));
        }

        tenant.concurrency_stamp = new_concurrency_stamp();
        state.tenants[index] = tenant.clone();
        Ok(IdentityResult::success())
    }

    async fn delete(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<IdentityResult> {
        self.guard.check(cancel)?;
        let mut state = self.state.write().await;

        let Some(index) = state
            .tenants
            .iter()
            .position(|t| t.id == tenant.id && t.concurrency_stamp == tenant.concurrency_stamp)
        else {
            metrics::record_concurrency_failure("tenant");
            return Ok(IdentityResult::failed(vec![
                IdentityError::concurrency_failure(),
            ]));
        };

        state.tenants.remove(index);
        state.tenant_roles.retain(|tr| tr.tenant_id != tenant.id);
        // users.tenant_id is ON DELETE SET NULL
        for user in state.users.iter_mut() {
            if user.tenant_id == Some(tenant.id) {
                user.tenant_id = None;
            }
        }
        Ok(IdentityResult::success())
    }

    async fn find_by_id(&self, id: Key, cancel: &CancellationToken) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tenant>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .tenants
            .iter()
            .find(|t| t.normalized_name == normalized_name)
            .cloned())
    }

    async fn add_to_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let mut state = self.state.write().await;

        let role_id = state
            .role_by_name(normalized_role_name)
            .map(|r| r.id)
            .ok_or_else(|| role_not_found(normalized_role_name))?;
        if !state.tenants.iter().any(|t| t.id == tenant.id) {
            return Err(AppError::InvalidOperation(format!(
                "The tenant '{}' has not been persisted.",
                tenant.name
            )));
        }

        let link = TenantRole {
            tenant_id: tenant.id,
            role_id,
        };
        if state.tenant_roles.contains(&link) {
            return Err(AppError::Conflict(format!(
                "Tenant '{}' is already in role '{}'.",
                tenant.name, normalized_role_name
            )));
        }
        state.tenant_roles.push(link);
        Ok(())
    }

    async fn remove_from_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let mut state = self.state.write().await;

        if let Some(role_id) = state.role_by_name(normalized_role_name).map(|r| r.id) {
            state
                .tenant_roles
                .retain(|tr| !(tr.tenant_id == tenant.id && tr.role_id == role_id));
        }
        Ok(())
    }

    async fn get_roles(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .tenant_roles
            .iter()
            .filter(|tr| tr.tenant_id == tenant.id)
            .filter_map(|tr| state.role_by_id(tr.role_id))
            .map(|r| r.name.clone())
            .collect())
    }

    async fn get_role_ids(&self, tenant: &Tenant, cancel: &CancellationToken) -> Result<Vec<Key>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        Ok(state
            .tenant_roles
            .iter()
            .filter(|tr| tr.tenant_id == tenant.id)
            .map(|tr| tr.role_id)
            .collect())
    }

    async fn is_in_role(
        &self,
        tenant: &Tenant,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let state = self.state.read().await;

        Ok(match state.role_by_name(normalized_role_name) {
            Some(role) => state.tenant_roles.contains(&TenantRole {
                tenant_id: tenant.id,
                role_id: role.id,
            }),
            None => false,
        })
    }

    async fn get_tenants_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        require_role_name(normalized_role_name)?;
        let state = self.state.read().await;

        let Some(role_id) = state.role_by_name(normalized_role_name).map(|r| r.id) else {
            return Ok(Vec::new());
        };
        Ok(state
            .tenant_roles
            .iter()
            .filter(|tr| tr.role_id == role_id)
            .filter_map(|tr| state.tenants.iter().find(|t| t.id == tr.tenant_id))
            .cloned()
            .collect())
    }

    fn close(&self) {
        self.guard.close();
    }
}

#[async_trait]
impl QueryableTenantStore for MemoryTenantStore {
    async fn tenants(&self, cancel: &CancellationToken) -> Result<Vec<Tenant>> {
        self.guard.check(cancel)?;
        let state = self.state.read().await;
        let mut all = state.tenants.clone();
        all.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(all)
    }
}

pub struct MemoryUserDirectory {
    state: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let Some(id) = Key::parse(user_id) else {
            return Ok(None);
        };
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_roles(&self, user: &User) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user.id)
            .filter_map(|(_, r)| state.role_by_id(*r))
            .map(|r| r.name.clone())
            .collect())
    }

    async fn get_tenant_id(&self, user: &User) -> Result<Option<String>> {
        Ok(user.tenant_id.map(|id| id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryDatabase, MemoryPermissionStore, CancellationToken) {
        let db = MemoryDatabase::new();
        db.add_role("Employee", "EMPLOYEE").await.unwrap();
        let store = db.permission_store();
        (db, store, CancellationToken::new())
    }

    fn permission(name: &str) -> Permission {
        let mut p = Permission::new(name);
        p.normalized_name = name.to_uppercase();
        p
    }

    #[tokio::test]
    async fn test_create_assigns_stamp_and_rejects_duplicate_name() {
        let (_db, store, cancel) = seeded().await;

        let mut first = permission("Invoice.Read");
        let result = store.create(&mut first, &cancel).await.unwrap();
        assert!(result.succeeded());
        assert_eq!(first.concurrency_stamp.len(), 32);

        let mut second = permission("invoice.read");
        let result = store.create(&mut second, &cancel).await.unwrap();
        assert!(result.has_code(crate::error::ErrorCode::DuplicatePermissionName));

        let all = store.permissions(&cancel).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_recreating_same_permission_is_conflict() {
        let (_db, store, cancel) = seeded().await;
        let mut p = permission("Invoice.Read");
        store.create(&mut p, &cancel).await.unwrap();

        let err = store.create(&mut p, &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.permissions(&cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accented_names_are_distinct() {
        let (_db, store, cancel) = seeded().await;
        let mut plain = permission("resume");
        let mut accented = permission("résumé");
        assert!(store.create(&mut plain, &cancel).await.unwrap().succeeded());
        assert!(store.create(&mut accented, &cancel).await.unwrap().succeeded());
    }

    #[tokio::test]
    async fn test_stale_update_loses() {
        let (_db, store, cancel) = seeded().await;
        let mut original = permission("Invoice.Read");
        store.create(&mut original, &cancel).await.unwrap();

        let mut writer_a = original.clone();
        let mut writer_b = original.clone();

        writer_a.name = "Invoice.View".to_string();
        writer_a.normalized_name = "INVOICE.VIEW".to_string();
        assert!(store.update(&mut writer_a, &cancel).await.unwrap().succeeded());
        assert_ne!(writer_a.concurrency_stamp, original.concurrency_stamp);

        writer_b.name = "Invoice.Show".to_string();
        writer_b.normalized_name = "INVOICE.SHOW".to_string();
        let result = store.update(&mut writer_b, &cancel).await.unwrap();
        assert!(result.has_code(crate::error::ErrorCode::ConcurrencyFailure));
        assert_eq!(writer_b.concurrency_stamp, original.concurrency_stamp);

        let stored = store.find_by_id(original.id, &cancel).await.unwrap().unwrap();
        assert_eq!(stored.name, "Invoice.View");
    }

    #[tokio::test]
    async fn test_add_to_role_twice_conflicts() {
        let (_db, store, cancel) = seeded().await;
        let mut p = permission("Invoice.Read");
        store.create(&mut p, &cancel).await.unwrap();

        store.add_to_role(&p, "EMPLOYEE", &cancel).await.unwrap();
        let err = store.add_to_role(&p, "EMPLOYEE", &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_to_unknown_role_is_invalid_operation() {
        let (_db, store, cancel) = seeded().await;
        let mut p = permission("Invoice.Read");
        store.create(&mut p, &cancel).await.unwrap();

        let err = store.add_to_role(&p, "GHOST", &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(err.to_string(), "Invalid operation: The role 'GHOST' was not found.");
    }

    #[tokio::test]
    async fn test_add_unpersisted_permission_to_role() {
        let (_db, store, cancel) = seeded().await;
        let p = permission("Invoice.Read");

        let err = store.add_to_role(&p, "EMPLOYEE", &cancel).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid operation: The permission 'Invoice.Read' has not been persisted."
        );
    }

    #[tokio::test]
    async fn test_remove_role_cascades_associations() {
        let (db, store, cancel) = seeded().await;
        let mut p = permission("Invoice.Read");
        store.create(&mut p, &cancel).await.unwrap();
        store.add_to_role(&p, "EMPLOYEE", &cancel).await.unwrap();

        let role_id = store.get_role_ids(&p, &cancel).await.unwrap()[0];
        db.remove_role(role_id).await;

        assert!(store.get_roles(&p, &cancel).await.unwrap().is_empty());
        assert!(!store.is_in_role(&p, "EMPLOYEE", &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_store_fails_fast() {
        let (_db, store, cancel) = seeded().await;
        store.close();
        let err = store.find_by_name("X", &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Disposed("MemoryPermissionStore")));
    }

    #[tokio::test]
    async fn test_tenant_delete_clears_user_reference() {
        let db = MemoryDatabase::new();
        let cancel = CancellationToken::new();
        let store = db.tenant_store();

        let mut tenant = Tenant::new("acme", "Acme");
        tenant.normalized_name = "ACME".to_string();
        store.create(&mut tenant, &cancel).await.unwrap();
        let user = db.add_user(User::new("u1").in_tenant(tenant.id)).await.unwrap();

        assert!(store.delete(&tenant, &cancel).await.unwrap().succeeded());

        let directory = db.user_directory();
        let reloaded = directory
            .find_by_id(&user.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(directory.get_tenant_id(&reloaded).await.unwrap(), None);
    }
}
