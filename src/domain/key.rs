//! Deployment-wide entity key
//!
//! Every entity (permission, tenant, role, user) is keyed by a UUID. The
//! string form used by callers and stored in `CHAR(36)` columns goes through
//! `FromStr` / `Display`, so parsing and formatting are fixed at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub Uuid);

impl Key {
    pub fn new_v4() -> Self {
        Key(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Key(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse an id handed over as a string. Returns `None` for anything
    /// that is not a UUID; lookups treat that as a miss.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }
}

impl From<Uuid> for Key {
    fn from(uuid: Uuid) -> Self {
        Key(uuid)
    }
}

impl From<Key> for Uuid {
    fn from(k: Key) -> Self {
        k.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl std::str::FromStr for Key {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Key(Uuid::parse_str(s)?))
    }
}

impl sqlx::Type<sqlx::MySql> for Key {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for Key {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        Ok(Key(Uuid::parse_str(&s)?))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for Key {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Fresh optimistic-lock token: 32 lowercase hex digits, no dashes.
pub fn new_concurrency_stamp() -> String {
    Uuid::new_v4().simple().to_string()
}
