use crate::domain_model::{TokenMetadata, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque persistent-token identifier, carried in the cookie and used
/// as the store key.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    /// Fresh globally-unique id, prefixed when several applications
    /// share one cookie domain.
    pub fn generate(namespace: Option<&str>) -> Self {
        let id = uuid::Uuid::new_v4();
        match namespace {
            Some(ns) => TokenId(format!("{}-{}", ns, id)),
            None => TokenId(id.to_string()),
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        TokenId(s.to_string())
    }
}

/// A stored record failed shape validation. Tamper or corruption, not
/// user input: redemption aborts on this instead of failing open.
#[derive(Debug, thiserror::Error)]
#[error("corrupted token record: {0}")]
pub struct RecordIntegrityError(pub String);

/// Key/value clauses sufficient to re-resolve the owning account.
/// Exactly one clause keyed `id` is the only valid shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupClauses(pub BTreeMap<String, serde_json::Value>);

impl LookupClauses {
    pub fn for_user(user: &UserId) -> Self {
        let mut clauses = BTreeMap::new();
        clauses.insert("id".to_string(), serde_json::Value::String(user.0.clone()));
        LookupClauses(clauses)
    }

    /// Validate the single-`id`-clause shape and extract the account id.
    pub fn user_id(&self) -> Result<UserId, RecordIntegrityError> {
        if self.0.len() != 1 {
            return Err(RecordIntegrityError(format!(
                "expected exactly one lookup clause, found {}",
                self.0.len()
            )));
        }
        let (key, value) = self.0.iter().next().expect("len checked above");
        if key != "id" {
            return Err(RecordIntegrityError(format!(
                "unrecognized lookup clause key: {}",
                key
            )));
        }
        match value {
            serde_json::Value::String(s) => Ok(UserId(s.clone())),
            serde_json::Value::Number(n) => Ok(UserId(n.to_string())),
            other => Err(RecordIntegrityError(format!(
                "unsupported id clause value: {}",
                other
            ))),
        }
    }
}

/// Server-side record behind one token id. Expiry is not tracked here:
/// the store attaches the TTL and owns physical deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub lookup_clauses: LookupClauses,
    pub metadata: TokenMetadata,
}

impl TokenRecord {
    pub fn for_user(user: &UserId, metadata: TokenMetadata) -> Self {
        TokenRecord {
            lookup_clauses: LookupClauses::for_user(user),
            metadata,
        }
    }

    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StoredRecord::Current {
            lookup_clauses: self.lookup_clauses.clone(),
            metadata: self.metadata.clone(),
        })
    }

    pub fn from_wire(raw: &str) -> Result<TokenRecord, serde_json::Error> {
        let stored: StoredRecord = serde_json::from_str(raw)?;
        Ok(stored.migrate())
    }
}

/// Wire shapes a store may hold. Older deployments wrote the bare
/// lookup clauses without the envelope; only `Current` is ever written.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Current {
        lookup_clauses: LookupClauses,
        #[serde(default)]
        metadata: TokenMetadata,
    },
    LegacyClausesOnly(LookupClauses),
}

impl StoredRecord {
    /// Lift whichever shape was stored into the current record form.
    pub fn migrate(self) -> TokenRecord {
        match self {
            StoredRecord::Current {
                lookup_clauses,
                metadata,
            } => TokenRecord {
                lookup_clauses,
                metadata,
            },
            StoredRecord::LegacyClausesOnly(lookup_clauses) => TokenRecord {
                lookup_clauses,
                metadata: TokenMetadata::default(),
            },
        }
    }
}
