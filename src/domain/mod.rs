//! Domain models

pub mod claims;
pub mod key;
pub mod permission;
pub mod tenant;
pub mod user;

pub use claims::{claim_types, Claim, ClaimSet};
pub use key::{new_concurrency_stamp, Key};
pub use permission::{Permission, RolePermission, MAX_NAME_LENGTH};
pub use tenant::{Tenant, TenantRole};
pub use user::{Role, User};
