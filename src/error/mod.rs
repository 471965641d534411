//! Unified error handling for the permissions engine
//!
//! Two channels exist. Hard failures (programmer errors, disposal,
//! cancellation, database faults) travel as `Err(AppError)`. Validation and
//! optimistic-concurrency outcomes are ordinary results and travel as
//! `Ok(IdentityResult)` so callers can branch on `succeeded()`.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Cannot access a disposed object: {0}")]
    Disposed(&'static str),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error belongs to the programmer-error class that callers
    /// must not retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::InvalidArgument(_)
                | AppError::InvalidOperation(_)
                | AppError::Disposed(_)
                | AppError::NotSupported(_)
        )
    }
}

/// Named error codes carried by a failed [`IdentityResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    InvalidPermissionName,
    DuplicatePermissionName,
    InvalidTenantName,
    DuplicateTenantName,
    ConcurrencyFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPermissionName => "InvalidPermissionName",
            ErrorCode::DuplicatePermissionName => "DuplicatePermissionName",
            ErrorCode::InvalidTenantName => "InvalidTenantName",
            ErrorCode::DuplicateTenantName => "DuplicateTenantName",
            ErrorCode::ConcurrencyFailure => "ConcurrencyFailure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single coded error with a human readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityError {
    pub code: ErrorCode,
    pub description: String,
}

impl IdentityError {
    pub fn invalid_permission_name(name: &str) -> Self {
        Self {
            code: ErrorCode::InvalidPermissionName,
            description: format!("Permission name '{}' is invalid.", name),
        }
    }

    pub fn duplicate_permission_name(name: &str) -> Self {
        Self {
            code: ErrorCode::DuplicatePermissionName,
            description: format!("Permission name '{}' is already taken.", name),
        }
    }

    pub fn invalid_tenant_name(name: &str) -> Self {
        Self {
            code: ErrorCode::InvalidTenantName,
            description: format!("Tenant name '{}' is invalid.", name),
        }
    }

    pub fn duplicate_tenant_name(name: &str) -> Self {
        Self {
            code: ErrorCode::DuplicateTenantName,
            description: format!("Tenant name '{}' is already taken.", name),
        }
    }

    pub fn concurrency_failure() -> Self {
        Self {
            code: ErrorCode::ConcurrencyFailure,
            description: "Optimistic concurrency failure, object has been modified.".to_string(),
        }
    }
}

/// Outcome of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityResult {
    succeeded: bool,
    errors: Vec<IdentityError>,
}

impl IdentityResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            errors: Vec::new(),
        }
    }

    /// A failed result. An empty error list still counts as a failure.
    pub fn failed(errors: Vec<IdentityError>) -> Self {
        Self {
            succeeded: false,
            errors,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn errors(&self) -> &[IdentityError] {
        &self.errors
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Error codes joined with `;`, the form used in log lines.
    pub fn joined_codes(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.code.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for IdentityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded {
            f.write_str("Succeeded")
        } else {
            write!(f, "Failed : {}", self.joined_codes())
        }
    }
}
