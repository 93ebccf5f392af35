//! Entity identity shared by every remote collection.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote service on creation.
///
/// Records created through different clients come back with either numeric
/// or string ids, so both shapes are accepted on the wire. Two ids are equal
/// when their textual forms are equal: `1` and `"1"` name the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id (json-server style auto-increment)
    Int(i64),
    /// Opaque string id
    Text(String),
}

impl EntityId {
    /// Parse user input into an id, preferring the numeric form.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => EntityId::Int(n),
            Err(_) => EntityId::Text(trimmed.to_string()),
        }
    }

    /// Common textual representation used for comparisons.
    pub fn normalized(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EntityId::Int(a), EntityId::Int(b)) => a == b,
            (EntityId::Text(a), EntityId::Text(b)) => a == b,
            _ => self.normalized() == other.normalized(),
        }
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Int(n)
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        EntityId::Int(i64::from(n))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Text(s)
    }
}

/// A record mirrored from a remote collection.
///
/// `Draft` is the record without its id: what a caller sends on creation,
/// before the service has assigned one.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Payload sent on creation.
    type Draft: Clone + Send + Sync + Serialize + 'static;

    /// Default remote collection name.
    const COLLECTION: &'static str;

    /// Service-assigned identity.
    fn id(&self) -> EntityId;
}
