//! Business logic layer

pub mod claims;
pub mod normalizer;
pub mod permission;
pub mod tenant;
pub mod user_permissions;
pub mod validator;

pub use claims::{ClaimsIdentity, ClaimsProvider, PermissionClaimsPrincipalFactory};
pub use normalizer::{LookupNormalizer, UpperInvariantNormalizer};
pub use permission::PermissionManager;
pub use tenant::{TenantDirectory, TenantManager};
pub use user_permissions::UserPermissions;
pub use validator::{
    PermissionNameValidator, PermissionValidator, TenantNameValidator, TenantValidator,
};
