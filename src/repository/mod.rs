//! Data access layer (Repository pattern)
//!
//! Stores own persistence of their entity and its direct association rows.
//! Every operation is checked at entry for cancellation and disposal, and
//! re-checked before each further round trip to the backing store.

pub mod memory;
pub mod permission;
pub mod tenant;
pub mod user;

pub use memory::MemoryDatabase;
pub use permission::{PermissionStore, PermissionStoreImpl, QueryablePermissionStore};
pub use tenant::{QueryableTenantStore, TenantStore, TenantStoreImpl};
pub use user::{UserDirectory, UserDirectoryImpl};

use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Entry check shared by all stores: cancellation first, then disposal.
#[derive(Debug)]
pub struct StoreGuard {
    name: &'static str,
    disposed: AtomicBool,
}

impl StoreGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn check(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.disposed.load(Ordering::Acquire) {
            return Err(AppError::Disposed(self.name));
        }
        Ok(())
    }

    pub fn close(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Role names handed to association operations must be non-blank.
pub(crate) fn require_role_name(normalized_role_name: &str) -> Result<()> {
    if normalized_role_name.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "normalized role name must not be blank".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn role_not_found(normalized_role_name: &str) -> AppError {
    AppError::InvalidOperation(format!(
        "The role '{}' was not found.",
        normalized_role_name
    ))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Unique violation raised by the named index rather than any other key.
pub(crate) fn violates_unique_index(err: &sqlx::Error, index: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.is_unique_violation() && names_key(db.message(), index)
    )
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// MySQL reports the key as `for key '<index>'`, table-qualified since 8.0.19.
fn names_key(message: &str, index: &str) -> bool {
    let Some((_, key)) = message.rsplit_once("for key '") else {
        return false;
    };
    let key = key.trim_end_matches('\'');
    key == index
        || key
            .rsplit_once('.')
            .is_some_and(|(_, unqualified)| unqualified == index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_reports_cancellation_before_disposal() {
        let guard = StoreGuard::new("TestStore");
        let cancel = CancellationToken::new();
        assert!(guard.check(&cancel).is_ok());

        guard.close();
        assert!(matches!(
            guard.check(&cancel),
            Err(AppError::Disposed("TestStore"))
        ));

        cancel.cancel();
        assert!(matches!(guard.check(&cancel), Err(AppError::Cancelled)));
    }

    #[test]
    fn test_require_role_name() {
        assert!(require_role_name("ADMIN").is_ok());
        assert!(matches!(
            require_role_name("   "),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_names_key_matches_only_the_violated_index() {
        let qualified = "Duplicate entry 'READ' for key 'permissions.idx_permissions_normalized_name'";
        assert!(names_key(qualified, "idx_permissions_normalized_name"));
        assert!(!names_key(qualified, "PRIMARY"));

        let primary = "Duplicate entry '5f0c…' for key 'permissions.PRIMARY'";
        assert!(names_key(primary, "PRIMARY"));
        assert!(!names_key(primary, "idx_permissions_normalized_name"));

        let unqualified = "Duplicate entry 'ACME' for key 'idx_tenants_normalized_name'";
        assert!(names_key(unqualified, "idx_tenants_normalized_name"));
    }

    #[test]
    fn test_names_key_ignores_key_text_inside_the_entry() {
        let message = "Duplicate entry 'x for key 'idx_permissions_normalized_name'' for key 'permissions.PRIMARY'";
        assert!(!names_key(message, "idx_permissions_normalized_name"));
        assert!(!names_key("Cannot add or update a child row", "PRIMARY"));
    }
}
