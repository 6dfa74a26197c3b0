use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::node_id::NodeId;

/// Free-form node attributes (a JSON object).
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// The server root document returned by `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A node as returned by the server.
///
/// Fields the client does not use (indexes, tags, linkage, timestamps)
/// are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub file: FileInformation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    /// Node level format; newer servers report it here rather than on `file`.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<String>,
}

impl NodeRecord {
    /// Declared file format, preferring the node level field.
    pub fn file_format(&self) -> Option<&str> {
        self.format.as_deref().or(self.file.format.as_deref())
    }
}

/// Information about the file stored at a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInformation {
    #[serde(default)]
    pub name: String,
    /// Size in bytes; 0 when the node has no file.
    #[serde(default)]
    pub size: u64,
    /// Checksums keyed by algorithm (e.g. `md5`).
    #[serde(default)]
    pub checksum: HashMap<String, String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<String>,
}

impl FileInformation {
    /// Returns the checksum for `algorithm`, if the server computed one.
    pub fn checksum(&self, algorithm: &str) -> Option<&str> {
        self.checksum.get(algorithm).map(String::as_str)
    }
}

/// A user entry in an ACL.
///
/// Older servers send a bare uuid string, newer ones a full record; both
/// decode to this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserIdRepr")]
pub struct UserId {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserIdRepr {
    Bare(String),
    Full {
        uuid: String,
        #[serde(default)]
        username: Option<String>,
    },
}

impl From<UserIdRepr> for UserId {
    fn from(repr: UserIdRepr) -> Self {
        match repr {
            UserIdRepr::Bare(uuid) => Self {
                uuid,
                username: None,
            },
            UserIdRepr::Full { uuid, username } => Self { uuid, username },
        }
    }
}

/// Access control lists of a node at fetch time.
///
/// List fields are `None` when the server omitted them from the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRecord {
    pub owner: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<HashMap<String, bool>>,
}

impl AclRecord {
    /// Whether anonymous users can read the node.
    pub fn is_publicly_readable(&self) -> bool {
        self.public
            .as_ref()
            .and_then(|p| p.get(AclType::Read.as_str()).copied())
            .unwrap_or(false)
    }
}

/// The kind of ACL an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclType {
    Read,
    Write,
    Owner,
    Delete,
    All,
}

impl AclType {
    /// Wire name of the ACL.
    pub fn as_str(&self) -> &'static str {
        match self {
            AclType::Read => "read",
            AclType::Write => "write",
            AclType::Owner => "owner",
            AclType::Delete => "delete",
            AclType::All => "all",
        }
    }

    /// Path fragment appended to a node path, e.g. `/acl/read/`.
    pub fn url_fragment(&self) -> String {
        format!("/acl/{}/", self.as_str())
    }
}

impl std::str::FromStr for AclType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AclType::Read),
            "write" => Ok(AclType::Write),
            "owner" => Ok(AclType::Owner),
            "delete" => Ok(AclType::Delete),
            "all" => Ok(AclType::All),
            other => Err(format!("unknown ACL type: {other}")),
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
