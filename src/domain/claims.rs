//! Claims emitted to downstream authorization checks

use serde::{Deserialize, Serialize};

/// Claim type names. These strings are a wire contract with every
/// authorization middleware that consumes the claims; never change them.
pub mod claim_types {
    pub const PERMISSION: &str = "permission";
    pub const TENANT_ID: &str = "tenant-id";
    pub const TENANT_NAME: &str = "tenant-name";
    pub const TENANT_DISPLAY_NAME: &str = "tenant-display-name";
    pub const USER_ID: &str = "sub";
    pub const USER_NAME: &str = "name";
}

/// A typed key/value fact about an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn permission(name: impl Into<String>) -> Self {
        Self::new(claim_types::PERMISSION, name)
    }

    pub fn is_permission(&self) -> bool {
        self.claim_type == claim_types::PERMISSION
    }
}

/// Resolved claims for one user. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
    pub(crate) fn from_vec(claims: Vec<Claim>) -> Self {
        Self(claims)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Claim] {
        &self.0
    }

    /// Values of every claim with the given type, in emission order.
    pub fn values_of<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// First value of the given claim type, if any.
    pub fn first_value<'a>(&'a self, claim_type: &str) -> Option<&'a str> {
        self.0
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ClaimSet {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
