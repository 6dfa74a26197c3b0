use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a string is not a valid node id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("id must be a UUID hex string")]
pub struct InvalidNodeId;

/// Server-assigned identifier of a node.
///
/// Always a lowercase hex UUID in 8-4-4-4-12 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

impl NodeId {
    /// Validates and wraps `id`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidNodeId> {
        let id = id.into();
        if is_uuid_hex(&id) {
            Ok(Self(id))
        } else {
            Err(InvalidNodeId)
        }
    }

    /// Returns the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_uuid_hex(s: &str) -> bool {
    let mut groups = s.split('-');
    for len in GROUPS {
        match groups.next() {
            Some(g) if g.len() == len => {
                if !g.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    groups.next().is_none()
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeId::new(s).map_err(serde::de::Error::custom)
    }
}
