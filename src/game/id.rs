//! Wire-stable entity identifiers
//!
//! Ships get their id from the client at creation, projectiles are minted
//! server-side. Both wrap a v4 UUID and carry a precomputed 22-character
//! URL-safe base64 form that is used as the broker routing key and on the
//! client wire.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Length of the base64 wire form of a 16-byte UUID
pub const WIRE_LEN: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("malformed entity id '{0}'")]
    Malformed(String),
}

#[derive(Clone, Copy)]
pub struct EntityId {
    uuid: Uuid,
    wire: [u8; WIRE_LEN],
}

impl EntityId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        let mut wire = [0u8; WIRE_LEN];
        let written = URL_SAFE_NO_PAD
            .encode_slice(uuid.as_bytes(), &mut wire)
            .unwrap_or_default();
        debug_assert_eq!(written, WIRE_LEN);
        Self { uuid, wire }
    }

    /// Fresh random id
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Accepts the 22-character wire form or canonical UUID text
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() == WIRE_LEN {
            let bytes = URL_SAFE_NO_PAD
                .decode(s)
                .map_err(|_| IdError::Malformed(s.to_string()))?;
            let uuid = Uuid::from_slice(&bytes).map_err(|_| IdError::Malformed(s.to_string()))?;
            return Ok(Self::from_uuid(uuid));
        }
        Uuid::parse_str(s)
            .map(Self::from_uuid)
            .map_err(|_| IdError::Malformed(s.to_string()))
    }

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Cached wire form
    #[inline]
    pub fn as_str(&self) -> &str {
        // base64 output is always ASCII
        std::str::from_utf8(&self.wire).unwrap_or("")
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.as_str())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EntityId::parse(&s).map_err(serde::de::Error::custom)
    }
}
