//! Identity types for chatsync.
//!
//! Every cached entity is keyed by a natural identity that comes from the
//! backend. These newtypes keep the different string ids from being mixed up.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A globally unique channel identifier: channel type plus channel id.
///
/// Displayed and serialized as `type:id`, e.g. `messaging:general`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId {
    kind: String,
    id: String,
}

impl ChannelId {
    /// Create a channel id from its type and id parts.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// The channel type (`messaging`, `livestream`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id within the channel type.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl FromStr for ChannelId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(TypesError::InvalidChannelId(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChannelId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(cid: ChannelId) -> Self {
        cid.to_string()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a user.
    UserId
);

string_id!(
    /// Identifier of a message.
    MessageId
);

string_id!(
    /// Identifier of a push device registered for the current user.
    DeviceId
);

/// Identifier of an attachment: the owning message plus its position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentId {
    /// Channel the message lives in.
    pub cid: ChannelId,
    /// Owning message.
    pub message_id: MessageId,
    /// Position within the message's attachment list.
    pub index: usize,
}

impl AttachmentId {
    /// Create an attachment id.
    pub fn new(cid: ChannelId, message_id: MessageId, index: usize) -> Self {
        Self {
            cid,
            message_id,
            index,
        }
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cid, self.message_id, self.index)
    }
}

/// Stable hash of a channel list query's filter and sort.
///
/// 32 bytes of SHA-256, displayed as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHash(String);

impl QueryHash {
    /// Hash a canonical query description.
    pub fn digest(canonical: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"chatsync-query-v1");
        hasher.update(canonical);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed hash (e.g. loaded from storage).
    pub fn from_hex(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The hex form of the hash.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for QueryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "QueryHash({})", short)
    }
}
