//! Name normalization used before every uniqueness check and persist

/// Canonicalizes names for case-insensitive comparison.
///
/// Implementations must be pure and idempotent.
pub trait LookupNormalizer: Send + Sync {
    fn normalize_name(&self, name: &str) -> String;
}

/// Trims surrounding whitespace and upper-cases the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperInvariantNormalizer;

impl LookupNormalizer for UpperInvariantNormalizer {
    fn normalize_name(&self, name: &str) -> String {
        name.trim().to_uppercase()
    }
}

/// Apply an optional normalizer; `None` passes the name through unchanged.
pub fn normalize(normalizer: Option<&dyn LookupNormalizer>, name: &str) -> String {
    match normalizer {
        Some(n) => n.normalize_name(name),
        None => name.to_string(),
    }
}
