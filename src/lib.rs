//! Permissions and multi-tenancy for an identity system.
//!
//! Permissions and tenants attach to roles; [`service::ClaimsProvider`]
//! turns a user's roles (and their tenant's roles) into authorization claims.

pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
