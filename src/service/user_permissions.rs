//! Permission checks against an already-resolved claim list

use super::normalizer::{normalize, LookupNormalizer, UpperInvariantNormalizer};
use crate::domain::Claim;
use std::sync::Arc;

/// Answers "does this principal hold permission X" from its claims.
pub struct UserPermissions {
    normalizer: Option<Arc<dyn LookupNormalizer>>,
}

impl Default for UserPermissions {
    fn default() -> Self {
        Self::new(Some(Arc::new(UpperInvariantNormalizer)))
    }
}

impl UserPermissions {
    pub fn new(normalizer: Option<Arc<dyn LookupNormalizer>>) -> Self {
        Self { normalizer }
    }

    /// Values of every `permission` claim, in claim order.
    pub fn permissions_from<'a, I>(claims: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a Claim>,
    {
        claims
            .into_iter()
            .filter(|c| c.is_permission())
            .map(|c| c.value.as_str())
            .collect()
    }

    pub fn has_permission<'a, I>(&self, claims: I, permission: &str) -> bool
    where
        I: IntoIterator<Item = &'a Claim>,
    {
        let wanted = normalize(self.normalizer.as_deref(), permission);
        Self::permissions_from(claims)
            .into_iter()
            .any(|held| normalize(self.normalizer.as_deref(), held) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn claims() -> Vec<Claim> {
        vec![
            Claim::new("sub", "u1"),
            Claim::permission("Invoice.Read"),
            Claim::new("tenant-name", "Invoice.Delete"),
        ]
    }

    #[test]
    fn test_permissions_from_ignores_other_claim_types() {
        let claims = claims();
        assert_eq!(UserPermissions::permissions_from(&claims), vec!["Invoice.Read"]);
    }

    #[rstest]
    #[case("Invoice.Read", true)]
    #[case(" invoice.read ", true)]
    #[case("Invoice.Delete", false)]
    #[case("u1", false)]
    fn test_has_permission(#[case] permission: &str, #[case] expected: bool) {
        let claims = claims();
        assert_eq!(
            UserPermissions::default().has_permission(&claims, permission),
            expected
        );
    }

    #[test]
    fn test_without_normalizer_comparison_is_exact() {
        let claims = claims();
        let checker = UserPermissions::new(None);
        assert!(checker.has_permission(&claims, "Invoice.Read"));
        assert!(!checker.has_permission(&claims, "invoice.read"));
    }
}
