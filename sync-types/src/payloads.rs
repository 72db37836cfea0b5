//! Payloads returned by the remote query API and carried by realtime events.
//!
//! Timestamps are Unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, DeviceId, MessageId, UserId};

/// A user as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    /// User id.
    pub id: UserId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Whether the user is online right now.
    #[serde(default)]
    pub online: bool,
    /// Last update of the user record.
    #[serde(default)]
    pub updated_at: Option<u64>,
}

impl UserPayload {
    /// A user with only an id.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            image_url: None,
            online: false,
            updated_at: None,
        }
    }
}

/// Unread counters of the current user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Channels with unread messages.
    pub channels: u32,
    /// Unread messages across all channels.
    pub messages: u32,
}

/// A push device registered for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayload {
    /// Device id (push token).
    pub id: DeviceId,
    /// Registration time.
    #[serde(default)]
    pub created_at: Option<u64>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUserPayload {
    /// The user itself.
    pub user: UserPayload,
    /// Registered devices.
    #[serde(default)]
    pub devices: Vec<DevicePayload>,
    /// Unread counters.
    #[serde(default)]
    pub unread_count: Option<UnreadCount>,
}

/// An attachment on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    /// Attachment kind (`image`, `file`, ...).
    pub kind: String,
    /// Title shown to users.
    #[serde(default)]
    pub title: Option<String>,
    /// Location of the asset.
    #[serde(default)]
    pub url: Option<String>,
}

/// A reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionPayload {
    /// Message the reaction belongs to.
    pub message_id: MessageId,
    /// Who reacted.
    pub user: UserPayload,
    /// Reaction kind (`like`, `love`, ...).
    pub kind: String,
    /// Score for cumulative reactions.
    #[serde(default = "default_score")]
    pub score: u32,
    /// When the reaction was added.
    #[serde(default)]
    pub created_at: Option<u64>,
}

fn default_score() -> u32 {
    1
}

/// A message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Message id.
    pub id: MessageId,
    /// Channel the message was posted to, when the backend includes it.
    #[serde(default)]
    pub cid: Option<ChannelId>,
    /// Author.
    pub user: UserPayload,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Creation time.
    pub created_at: u64,
    /// Last edit time.
    #[serde(default)]
    pub updated_at: Option<u64>,
    /// Set when the message was deleted.
    #[serde(default)]
    pub deleted_at: Option<u64>,
    /// Whether the message is pinned.
    #[serde(default)]
    pub pinned: bool,
    /// Attachments in display order.
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    /// Most recent reactions.
    #[serde(default)]
    pub latest_reactions: Vec<ReactionPayload>,
}

impl MessagePayload {
    /// A plain text message.
    pub fn new(id: impl Into<MessageId>, user: UserPayload, text: &str, created_at: u64) -> Self {
        Self {
            id: id.into(),
            cid: None,
            user,
            text: text.to_string(),
            created_at,
            updated_at: None,
            deleted_at: None,
            pinned: false,
            attachments: Vec::new(),
            latest_reactions: Vec::new(),
        }
    }
}

/// A member of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    /// The member.
    pub user: UserPayload,
    /// Channel role (`member`, `moderator`, ...).
    #[serde(default)]
    pub role: Option<String>,
    /// When the user joined.
    #[serde(default)]
    pub created_at: Option<u64>,
}

/// Read state of one user in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReadPayload {
    /// The reader.
    pub user: UserPayload,
    /// Last time the user read the channel.
    pub last_read_at: u64,
    /// Messages posted since.
    #[serde(default)]
    pub unread_messages: u32,
}

/// The bare descriptor of a channel, without its relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDetail {
    /// Channel id.
    pub cid: ChannelId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Time of the most recent message.
    #[serde(default)]
    pub last_message_at: Option<u64>,
    /// Set while the channel is hidden for the current user.
    #[serde(default)]
    pub hidden_at: Option<u64>,
    /// Messages before this time are truncated.
    #[serde(default)]
    pub truncated_at: Option<u64>,
    /// Number of members.
    #[serde(default)]
    pub member_count: u32,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<u64>,
    /// Last update of the descriptor.
    #[serde(default)]
    pub updated_at: Option<u64>,
}

impl ChannelDetail {
    /// A descriptor with only an id.
    pub fn new(cid: ChannelId) -> Self {
        Self {
            cid,
            name: None,
            last_message_at: None,
            hidden_at: None,
            truncated_at: None,
            member_count: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

/// A channel with its first page of relations, as returned by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPayload {
    /// The descriptor.
    pub channel: ChannelDetail,
    /// Members.
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    /// Users currently watching.
    #[serde(default)]
    pub watchers: Vec<UserPayload>,
    /// Latest messages, oldest first.
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
    /// Pinned messages.
    #[serde(default)]
    pub pinned_messages: Vec<MessagePayload>,
    /// Read states.
    #[serde(default)]
    pub reads: Vec<ChannelReadPayload>,
}

impl ChannelPayload {
    /// A payload with a descriptor and no relations.
    pub fn new(channel: ChannelDetail) -> Self {
        Self {
            channel,
            members: Vec::new(),
            watchers: Vec::new(),
            messages: Vec::new(),
            pinned_messages: Vec::new(),
            reads: Vec::new(),
        }
    }

    /// The channel id.
    pub fn cid(&self) -> &ChannelId {
        &self.channel.cid
    }
}

/// One page of a channel list query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelListPayload {
    /// Channels in list order.
    pub channels: Vec<ChannelPayload>,
}

impl ChannelListPayload {
    /// Wrap a page of channels.
    pub fn new(channels: Vec<ChannelPayload>) -> Self {
        Self { channels }
    }
}
