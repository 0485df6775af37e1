//! Node identifiers.
//!
//! A `NodeId` is a namespace index plus an identifier. It is immutable once
//! assigned and unique across the whole address space (the local store and
//! every federated store, partitioned by namespace index).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identifier part of a [`NodeId`].
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Opaque(Vec<u8>),
    Guid(Uuid),
}

/// Errors from parsing the textual form of a node id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeIdError {
    #[error("invalid namespace index '{0}'")]
    InvalidNamespace(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("missing identifier type in '{0}'")]
    MissingIdentifierType(String),
}

/// Identifies a node in the address space.
///
/// The textual form follows the usual `ns=<index>;<type>=<value>` notation,
/// where type is one of `i` (numeric), `s` (string), `b` (opaque, hex) or
/// `g` (guid). The `ns=0;` prefix may be omitted.
///
/// ```rust
/// use uaserver_address_space::NodeId;
///
/// let id: NodeId = "ns=1;i=42".parse().unwrap();
/// assert_eq!(id, NodeId::numeric(1, 42));
/// assert_eq!(id.to_string(), "ns=1;i=42");
/// ```
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    pub fn opaque(namespace: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace,
            identifier: Identifier::Opaque(value.into()),
        }
    }

    pub fn guid(namespace: u16, value: Uuid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(value),
        }
    }

    /// The null node id (`ns=0;i=0`).
    ///
    /// Used wherever "no node" is meant: an auto-assigned requested id, a
    /// missing parent or a missing type definition.
    pub fn null() -> Self {
        Self::numeric(0, 0)
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Parse the textual form. Same as `str::parse`.
    pub fn parse(s: &str) -> Result<Self, NodeIdError> {
        s.parse()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "i={}", n),
            Identifier::String(s) => write!(f, "s={}", s),
            Identifier::Opaque(bytes) => {
                write!(f, "b=")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Identifier::Guid(g) => write!(f, "g={}", g),
        }
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| NodeIdError::MissingIdentifierType(s.to_string()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| NodeIdError::InvalidNamespace(ns.to_string()))?;
                (ns, rest)
            }
            None => (0, s),
        };

        let (kind, value) = rest
            .split_once('=')
            .ok_or_else(|| NodeIdError::MissingIdentifierType(s.to_string()))?;

        let identifier = match kind {
            "i" => Identifier::Numeric(
                value
                    .parse()
                    .map_err(|_| NodeIdError::InvalidIdentifier(value.to_string()))?,
            ),
            "s" => Identifier::String(value.to_string()),
            "b" => Identifier::Opaque(parse_hex(value)?),
            "g" => Identifier::Guid(
                Uuid::parse_str(value)
                    .map_err(|_| NodeIdError::InvalidIdentifier(value.to_string()))?,
            ),
            _ => return Err(NodeIdError::MissingIdentifierType(s.to_string())),
        };

        Ok(NodeId {
            namespace,
            identifier,
        })
    }
}

fn parse_hex(value: &str) -> Result<Vec<u8>, NodeIdError> {
    if value.len() % 2 != 0 || !value.is_ascii() {
        return Err(NodeIdError::InvalidIdentifier(value.to_string()));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|_| NodeIdError::InvalidIdentifier(value.to_string()))
        })
        .collect()
}

/// A node id that may point into another namespace URI or another server.
///
/// Reference targets are expanded node ids: a reference may cross into a
/// federated namespace or even to a node on a different server.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: Option<String>,
    /// 0 means this server.
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Whether the target lives on this server.
    pub fn is_local_server(&self) -> bool {
        self.server_index == 0
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={};", uri)?;
        }
        write!(f, "{}", self.node_id)
    }
}
