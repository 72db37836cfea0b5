//! The cached data set and its read side.

use std::collections::BTreeMap;

use chatsync_types::{
    AttachmentId, ChannelId, MessageId, MessagePayload, QueryHash, ReactionPayload, UserId,
    UserPayload,
};
use serde::{Deserialize, Serialize};

use super::records::{
    AttachmentRecord, ChannelRecord, CurrentUserRecord, MemberRecord, MessageRecord, QueryRecord,
    ReactionKey, ReactionRecord, ReadRecord, UserRecord,
};

/// Everything the cache holds.
///
/// Readers get an immutable snapshot of this through
/// [`LocalCache::snapshot`](super::LocalCache::snapshot); writers mutate a
/// private copy inside a write session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheState {
    pub(crate) users: BTreeMap<UserId, UserRecord>,
    pub(crate) current_user: Option<CurrentUserRecord>,
    pub(crate) channels: BTreeMap<ChannelId, ChannelRecord>,
    pub(crate) messages: BTreeMap<MessageId, MessageRecord>,
    pub(crate) reactions: BTreeMap<ReactionKey, ReactionRecord>,
    pub(crate) members: BTreeMap<(ChannelId, UserId), MemberRecord>,
    pub(crate) reads: BTreeMap<(ChannelId, UserId), ReadRecord>,
    pub(crate) attachments: BTreeMap<AttachmentId, AttachmentRecord>,
    pub(crate) queries: BTreeMap<QueryHash, QueryRecord>,
}

impl CacheState {
    /// A user by id.
    pub fn user(&self, id: &UserId) -> Option<&UserRecord> {
        self.users.get(id)
    }

    /// The authenticated user.
    pub fn current_user(&self) -> Option<&CurrentUserRecord> {
        self.current_user.as_ref()
    }

    /// A channel by id.
    pub fn channel(&self, cid: &ChannelId) -> Option<&ChannelRecord> {
        self.channels.get(cid)
    }

    /// A message by id.
    pub fn message(&self, id: &MessageId) -> Option<&MessageRecord> {
        self.messages.get(id)
    }

    /// A reaction by identity.
    pub fn reaction(&self, key: &ReactionKey) -> Option<&ReactionRecord> {
        self.reactions.get(key)
    }

    /// A member of a channel.
    pub fn member(&self, cid: &ChannelId, user: &UserId) -> Option<&MemberRecord> {
        self.members.get(&(cid.clone(), user.clone()))
    }

    /// The read state of one user in one channel.
    pub fn channel_read(&self, cid: &ChannelId, user: &UserId) -> Option<&ReadRecord> {
        self.reads.get(&(cid.clone(), user.clone()))
    }

    /// Every read state of one user.
    pub fn channel_reads(&self, user: &UserId) -> Vec<&ReadRecord> {
        self.reads
            .values()
            .filter(|read| &read.user_id == user)
            .collect()
    }

    /// An attachment by id.
    pub fn attachment(&self, id: &AttachmentId) -> Option<&AttachmentRecord> {
        self.attachments.get(id)
    }

    /// A stored query by hash.
    pub fn query(&self, hash: &QueryHash) -> Option<&QueryRecord> {
        self.queries.get(hash)
    }

    /// Every stored query.
    pub fn queries(&self) -> impl Iterator<Item = &QueryRecord> {
        self.queries.values()
    }

    /// Channels linked to a query, most recent message first.
    pub fn linked_channels(&self, hash: &QueryHash) -> Vec<&ChannelRecord> {
        let Some(query) = self.queries.get(hash) else {
            return Vec::new();
        };

        let mut channels: Vec<&ChannelRecord> = query
            .channels
            .iter()
            .filter_map(|cid| self.channels.get(cid))
            .collect();
        channels.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.cid.cmp(&b.cid))
        });
        channels
    }

    fn user_payload(&self, id: &UserId) -> UserPayload {
        match self.users.get(id) {
            Some(user) => UserPayload {
                id: user.id.clone(),
                name: user.name.clone(),
                image_url: user.image_url.clone(),
                online: user.online,
                updated_at: user.updated_at,
            },
            None => UserPayload::new(id.clone()),
        }
    }

    /// Rebuild the payload of a cached message.
    pub fn message_payload(&self, id: &MessageId) -> Option<MessagePayload> {
        let record = self.messages.get(id)?;

        let attachments = record
            .attachments
            .iter()
            .filter_map(|id| self.attachments.get(id))
            .map(|a| chatsync_types::AttachmentPayload {
                kind: a.kind.clone(),
                title: a.title.clone(),
                url: a.url.clone(),
            })
            .collect();
        let latest_reactions = record
            .reactions
            .iter()
            .filter_map(|key| self.reactions.get(key))
            .map(|r| ReactionPayload {
                message_id: r.key.message_id.clone(),
                user: self.user_payload(&r.key.user_id),
                kind: r.key.kind.clone(),
                score: r.score,
                created_at: r.created_at,
            })
            .collect();

        Some(MessagePayload {
            id: record.id.clone(),
            cid: Some(record.cid.clone()),
            user: self.user_payload(&record.user_id),
            text: record.text.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
            pinned: record.pinned,
            attachments,
            latest_reactions,
        })
    }

    /// Cached messages of a channel, oldest first.
    pub fn channel_messages(&self, cid: &ChannelId) -> Vec<MessagePayload> {
        let Some(channel) = self.channels.get(cid) else {
            return Vec::new();
        };

        let mut messages: Vec<MessagePayload> = channel
            .messages
            .iter()
            .filter_map(|id| self.message_payload(id))
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        messages
    }
}
