//! Metric definitions and recording helpers
//!
//! No recorder is installed by this crate; the embedding process decides
//! where metrics go. Without a recorder the macros are no-ops.

use metrics::{counter, describe_counter};

pub const CLAIMS_RESOLVED_TOTAL: &str = "identity_permissions_claims_resolved_total";
pub const VALIDATION_FAILURES_TOTAL: &str = "identity_permissions_validation_failures_total";
pub const CONCURRENCY_FAILURES_TOTAL: &str = "identity_permissions_concurrency_failures_total";

pub fn describe_metrics() {
    describe_counter!(
        CLAIMS_RESOLVED_TOTAL,
        "Total number of claim sets resolved for users"
    );
    describe_counter!(
        VALIDATION_FAILURES_TOTAL,
        "Create/update attempts rejected by a validator"
    );
    describe_counter!(
        CONCURRENCY_FAILURES_TOTAL,
        "Writes that lost the optimistic concurrency check"
    );

    counter!(CLAIMS_RESOLVED_TOTAL, "tenant" => "false").absolute(0);
    counter!(VALIDATION_FAILURES_TOTAL, "entity" => "permission").absolute(0);
    counter!(CONCURRENCY_FAILURES_TOTAL, "entity" => "permission").absolute(0);
}

/// `entity` is `"permission"` or `"tenant"`.
pub fn record_concurrency_failure(entity: &'static str) {
    counter!(CONCURRENCY_FAILURES_TOTAL, "entity" => entity).increment(1);
}

pub fn record_validation_failure(entity: &'static str) {
    counter!(VALIDATION_FAILURES_TOTAL, "entity" => entity).increment(1);
}

pub fn record_claims_resolved(with_tenant: bool) {
    let tenant = if with_tenant { "true" } else { "false" };
    counter!(CLAIMS_RESOLVED_TOTAL, "tenant" => tenant).increment(1);
}
