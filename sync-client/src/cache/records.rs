//! Records stored in the local cache.
//!
//! Relations are stored as id sets, so shared entities (users, in
//! particular) are never owned by the records that reference them.

use std::collections::BTreeSet;

use chatsync_types::{
    AttachmentId, AttachmentPayload, ChannelDetail, ChannelId, ChannelListQuery, DeviceId,
    MessageId, QueryHash, UnreadCount, UserId, UserPayload,
};
use serde::{Deserialize, Serialize};

/// A cached user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub image_url: Option<String>,
    /// Online at the last update.
    pub online: bool,
    /// Last update of the user.
    pub updated_at: Option<u64>,
}

impl UserRecord {
    pub(crate) fn apply(&mut self, payload: &UserPayload) {
        self.name = payload.name.clone();
        self.image_url = payload.image_url.clone();
        self.online = payload.online;
        self.updated_at = payload.updated_at;
    }
}

impl From<&UserPayload> for UserRecord {
    fn from(payload: &UserPayload) -> Self {
        Self {
            id: payload.id.clone(),
            name: payload.name.clone(),
            image_url: payload.image_url.clone(),
            online: payload.online,
            updated_at: payload.updated_at,
        }
    }
}

/// A push device of the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device id.
    pub id: DeviceId,
    /// Registration time.
    pub created_at: Option<u64>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUserRecord {
    /// The user this session belongs to.
    pub user_id: UserId,
    /// Registered devices.
    pub devices: Vec<DeviceRecord>,
    /// Unread counters.
    pub unread_count: UnreadCount,
    /// Creation time of the last realtime event saved.
    pub last_received_event_at: Option<u64>,
}

/// A cached channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel id.
    pub cid: ChannelId,
    /// Display name.
    pub name: Option<String>,
    /// Time of the most recent message.
    pub last_message_at: Option<u64>,
    /// Time of the oldest cached message.
    pub oldest_message_at: Option<u64>,
    /// Set while hidden for the current user.
    pub hidden_at: Option<u64>,
    /// Messages before this time are truncated.
    pub truncated_at: Option<u64>,
    /// Number of members.
    pub member_count: u32,
    /// Creation time.
    pub created_at: Option<u64>,
    /// Last update of the descriptor.
    pub updated_at: Option<u64>,
    /// Set when the channel's query links must be refreshed.
    pub needs_refresh_queries: bool,
    /// Members.
    pub members: BTreeSet<UserId>,
    /// Users watching.
    pub watchers: BTreeSet<UserId>,
    /// Users typing right now.
    pub typing_users: BTreeSet<UserId>,
    /// Cached messages.
    pub messages: BTreeSet<MessageId>,
    /// Pinned messages.
    pub pinned_messages: BTreeSet<MessageId>,
    /// Attachments of cached messages.
    pub attachments: BTreeSet<AttachmentId>,
    /// Users with a stored read state.
    pub reads: BTreeSet<UserId>,
    /// Queries this channel is linked to.
    pub queries: BTreeSet<QueryHash>,
}

impl ChannelRecord {
    /// An empty record for a channel seen for the first time.
    pub fn new(cid: ChannelId) -> Self {
        Self {
            cid,
            name: None,
            last_message_at: None,
            oldest_message_at: None,
            hidden_at: None,
            truncated_at: None,
            member_count: 0,
            created_at: None,
            updated_at: None,
            needs_refresh_queries: false,
            members: BTreeSet::new(),
            watchers: BTreeSet::new(),
            typing_users: BTreeSet::new(),
            messages: BTreeSet::new(),
            pinned_messages: BTreeSet::new(),
            attachments: BTreeSet::new(),
            reads: BTreeSet::new(),
            queries: BTreeSet::new(),
        }
    }

    pub(crate) fn apply_detail(&mut self, detail: &ChannelDetail) {
        self.name = detail.name.clone();
        self.last_message_at = detail.last_message_at.or(self.last_message_at);
        self.hidden_at = detail.hidden_at;
        self.truncated_at = detail.truncated_at;
        self.member_count = detail.member_count;
        self.created_at = detail.created_at;
        self.updated_at = detail.updated_at;
    }

    /// The descriptor as the backend would send it.
    pub fn detail(&self) -> ChannelDetail {
        ChannelDetail {
            cid: self.cid.clone(),
            name: self.name.clone(),
            last_message_at: self.last_message_at,
            hidden_at: self.hidden_at,
            truncated_at: self.truncated_at,
            member_count: self.member_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Drop every relation and local marker, keeping the identity and
    /// descriptor so the channel can be relinked by a later fetch.
    pub fn reset_local_data(&mut self) {
        self.messages.clear();
        self.pinned_messages.clear();
        self.watchers.clear();
        self.members.clear();
        self.attachments.clear();
        self.oldest_message_at = None;
        self.hidden_at = None;
        self.truncated_at = None;
        self.needs_refresh_queries = false;
        self.typing_users.clear();
        self.reads.clear();
        self.queries.clear();
    }
}

/// A cached message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message id.
    pub id: MessageId,
    /// Channel it was posted to.
    pub cid: ChannelId,
    /// Author.
    pub user_id: UserId,
    /// Text.
    pub text: String,
    /// Creation time.
    pub created_at: u64,
    /// Last edit time.
    pub updated_at: Option<u64>,
    /// Deletion time.
    pub deleted_at: Option<u64>,
    /// Whether the message is pinned.
    pub pinned: bool,
    /// Attachments in display order.
    pub attachments: Vec<AttachmentId>,
    /// Reactions on the message.
    pub reactions: BTreeSet<ReactionKey>,
}

/// Identity of a reaction: one kind per user per message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactionKey {
    /// Message reacted to.
    pub message_id: MessageId,
    /// Who reacted.
    pub user_id: UserId,
    /// Reaction kind.
    pub kind: String,
}

/// A cached reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    /// Identity.
    pub key: ReactionKey,
    /// Score for cumulative reactions.
    pub score: u32,
    /// When the reaction was added.
    pub created_at: Option<u64>,
}

/// A cached channel member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Channel.
    pub cid: ChannelId,
    /// Member.
    pub user_id: UserId,
    /// Channel role.
    pub role: Option<String>,
    /// Join time.
    pub created_at: Option<u64>,
}

/// A cached read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecord {
    /// Channel.
    pub cid: ChannelId,
    /// Reader.
    pub user_id: UserId,
    /// Last read time.
    pub last_read_at: u64,
    /// Messages posted since.
    pub unread_messages: u32,
}

/// A cached attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Identity.
    pub id: AttachmentId,
    /// Attachment kind.
    pub kind: String,
    /// Title.
    pub title: Option<String>,
    /// Asset location.
    pub url: Option<String>,
}

impl AttachmentRecord {
    pub(crate) fn new(id: AttachmentId, payload: &AttachmentPayload) -> Self {
        Self {
            id,
            kind: payload.kind.clone(),
            title: payload.title.clone(),
            url: payload.url.clone(),
        }
    }
}

/// A stored channel list query and the channels linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// The query, at its first page window.
    pub query: ChannelListQuery,
    /// Linked channels.
    pub channels: BTreeSet<ChannelId>,
}

impl QueryRecord {
    /// The query's stable hash.
    pub fn hash(&self) -> QueryHash {
        self.query.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_identity_and_descriptor() {
        let cid = ChannelId::new("messaging", "general");
        let mut record = ChannelRecord::new(cid.clone());
        record.name = Some("General".into());
        record.last_message_at = Some(42);
        record.hidden_at = Some(7);
        record.needs_refresh_queries = true;
        record.members.insert(UserId::new("alice"));
        record.messages.insert(MessageId::new("m1"));
        record.queries.insert(QueryHash::digest(b"q"));

        record.reset_local_data();

        assert_eq!(record.cid, cid);
        assert_eq!(record.name.as_deref(), Some("General"));
        assert_eq!(record.last_message_at, Some(42));
        assert!(record.hidden_at.is_none());
        assert!(!record.needs_refresh_queries);
        assert!(record.members.is_empty());
        assert!(record.messages.is_empty());
        assert!(record.queries.is_empty());
    }

    #[test]
    fn detail_keeps_known_last_message_time() {
        let cid = ChannelId::new("messaging", "general");
        let mut record = ChannelRecord::new(cid.clone());
        record.last_message_at = Some(100);

        record.apply_detail(&ChannelDetail::new(cid));

        assert_eq!(record.last_message_at, Some(100));
    }
}
