//! Narrow store capabilities and the write session implementing them.
//!
//! Callers depend on the capability they need ([`ChannelStore`],
//! [`MessageStore`], ...). [`Session`] is the composite used for aggregate
//! writes such as [`Session::save_event`].
//!
//! Every upsert is keyed by natural identity and idempotent. Lookups
//! return `None` for absent records; absence is not an error.

use std::collections::BTreeSet;

use chatsync_types::{
    AttachmentId, AttachmentPayload, ChannelDetail, ChannelId, ChannelListQuery,
    ChannelPayload, ChannelReadPayload, CurrentUserPayload, DeviceId, DevicePayload,
    EventPayload, EventType, MemberPayload, MessageId, MessagePayload, Pagination, QueryHash,
    ReactionPayload, UnreadCount, UserId, UserPayload,
};

use super::records::{
    AttachmentRecord, ChannelRecord, CurrentUserRecord, DeviceRecord, MemberRecord,
    MessageRecord, QueryRecord, ReactionKey, ReactionRecord, ReadRecord, UserRecord,
};
use super::state::CacheState;
use crate::error::CacheError;

/// Users.
pub trait UserStore {
    /// Insert or update a user.
    fn save_user(&mut self, payload: &UserPayload) -> Result<UserRecord, CacheError>;

    /// A user by id.
    fn user(&self, id: &UserId) -> Option<UserRecord>;
}

/// The authenticated user.
pub trait CurrentUserStore {
    /// Insert or update the current user.
    fn save_current_user(
        &mut self,
        payload: &CurrentUserPayload,
    ) -> Result<CurrentUserRecord, CacheError>;

    /// Replace the current user's unread counters.
    fn save_current_user_unread_count(
        &mut self,
        count: UnreadCount,
    ) -> Result<CurrentUserRecord, CacheError>;

    /// Save push devices, optionally dropping the ones not listed.
    fn save_current_user_devices(
        &mut self,
        devices: &[DevicePayload],
        clear_existing: bool,
    ) -> Result<Vec<DeviceRecord>, CacheError>;

    /// Remove one device.
    fn delete_device(&mut self, id: &DeviceId) -> Result<(), CacheError>;

    /// Record the creation time of the latest realtime event.
    fn save_last_received_event_at(&mut self, at: u64) -> Result<CurrentUserRecord, CacheError>;

    /// The current user.
    fn current_user(&self) -> Option<CurrentUserRecord>;
}

/// Channels.
pub trait ChannelStore {
    /// Save a channel with its relations, linking it to `query` if given.
    fn save_channel(
        &mut self,
        payload: &ChannelPayload,
        query: Option<&ChannelListQuery>,
    ) -> Result<ChannelRecord, CacheError>;

    /// Save a bare channel descriptor, linking it to `query` if given.
    fn save_channel_detail(
        &mut self,
        detail: &ChannelDetail,
        query: Option<&ChannelListQuery>,
    ) -> Result<ChannelRecord, CacheError>;

    /// Clear a channel's relations and local markers, keeping the record.
    fn reset_channel(&mut self, cid: &ChannelId) -> Result<ChannelRecord, CacheError>;

    /// A channel by id.
    fn channel(&self, cid: &ChannelId) -> Option<ChannelRecord>;

    /// Delete the channels linked only to `query`, with their messages,
    /// members and reads. Returns how many were deleted.
    fn delete_channels(&mut self, query: &QueryHash) -> Result<usize, CacheError>;
}

/// Messages and reactions.
pub trait MessageStore {
    /// Save a message into an existing channel.
    fn save_message(
        &mut self,
        payload: &MessagePayload,
        cid: &ChannelId,
    ) -> Result<MessageRecord, CacheError>;

    /// A message by id.
    fn message(&self, id: &MessageId) -> Option<MessageRecord>;

    /// Delete a message with its reactions and attachments.
    fn delete_message(&mut self, id: &MessageId) -> Result<(), CacheError>;

    /// Pin a message.
    fn pin_message(&mut self, id: &MessageId) -> Result<MessageRecord, CacheError>;

    /// Unpin a message.
    fn unpin_message(&mut self, id: &MessageId) -> Result<MessageRecord, CacheError>;

    /// Save a reaction on an existing message.
    fn save_reaction(&mut self, payload: &ReactionPayload) -> Result<ReactionRecord, CacheError>;

    /// A reaction by identity.
    fn reaction(&self, key: &ReactionKey) -> Option<ReactionRecord>;

    /// Delete a reaction.
    fn delete_reaction(&mut self, key: &ReactionKey) -> Result<(), CacheError>;
}

/// Read states.
pub trait ReadStore {
    /// Save the read state of a user in an existing channel.
    fn save_channel_read(
        &mut self,
        payload: &ChannelReadPayload,
        cid: &ChannelId,
    ) -> Result<ReadRecord, CacheError>;

    /// The read state of one user in one channel.
    fn load_channel_read(&self, cid: &ChannelId, user: &UserId) -> Option<ReadRecord>;

    /// Every read state of one user.
    fn load_channel_reads(&self, user: &UserId) -> Vec<ReadRecord>;
}

/// Channel members.
pub trait MemberStore {
    /// Save a member of an existing channel.
    fn save_member(
        &mut self,
        payload: &MemberPayload,
        cid: &ChannelId,
    ) -> Result<MemberRecord, CacheError>;

    /// A member of a channel.
    fn member(&self, cid: &ChannelId, user: &UserId) -> Option<MemberRecord>;
}

/// Message attachments.
pub trait AttachmentStore {
    /// Save an attachment of an existing message.
    fn save_attachment(
        &mut self,
        payload: &AttachmentPayload,
        id: &AttachmentId,
    ) -> Result<AttachmentRecord, CacheError>;

    /// An attachment by id.
    fn attachment(&self, id: &AttachmentId) -> Option<AttachmentRecord>;
}

/// Stored channel list queries and their channel links.
pub trait QueryStore {
    /// Store a query at its first page window. Existing links are kept.
    fn save_query(&mut self, query: &ChannelListQuery) -> Result<QueryRecord, CacheError>;

    /// A stored query by hash.
    fn channel_list_query(&self, hash: &QueryHash) -> Option<QueryRecord>;

    /// Every stored query.
    fn load_channel_list_queries(&self) -> Vec<QueryRecord>;

    /// Delete a query and its links. Linked channels are kept.
    fn delete_query(&mut self, hash: &QueryHash) -> Result<(), CacheError>;

    /// Link an existing channel to a stored query.
    fn link_channel(&mut self, hash: &QueryHash, cid: &ChannelId) -> Result<(), CacheError>;

    /// Remove every link of a stored query. Returns the unlinked channels.
    fn unlink_channels(&mut self, hash: &QueryHash) -> Result<BTreeSet<ChannelId>, CacheError>;

    /// Remove a channel from every query. Returns the queries it left.
    fn unlink_channel(&mut self, cid: &ChannelId) -> Result<BTreeSet<QueryHash>, CacheError>;
}

/// Every store capability at once.
pub trait Session:
    UserStore
    + CurrentUserStore
    + ChannelStore
    + MessageStore
    + ReadStore
    + MemberStore
    + AttachmentStore
    + QueryStore
{
    /// Save everything a realtime event carries.
    ///
    /// Sub-saves run in a fixed order: user, channel, current user, unread
    /// count, event time, message. A message needs its channel to exist.
    /// A deleted channel is unlinked from every query.
    /// Optional linkage that cannot be resolved (a message without channel
    /// id, unread counters without a current user) is logged and skipped.
    fn save_event(&mut self, event: &EventPayload) -> Result<(), CacheError> {
        if let Some(user) = &event.user {
            self.save_user(user)?;
        }
        if let Some(channel) = &event.channel {
            self.save_channel_detail(channel, None)?;
        }
        if let (EventType::ChannelDeleted, Some(cid)) = (&event.kind, event.channel_id()) {
            self.unlink_channel(cid)?;
        }
        if let Some(current) = &event.current_user {
            self.save_current_user(current)?;
        }

        let has_current_user = self.current_user().is_some();
        if let Some(count) = event.unread_count {
            if has_current_user {
                self.save_current_user_unread_count(count)?;
            } else {
                tracing::warn!("Skipping unread count of {:?}: no current user", event.kind);
            }
        }
        if let (Some(at), true) = (event.created_at, has_current_user) {
            self.save_last_received_event_at(at)?;
        }

        if let Some(message) = &event.message {
            match message.cid.clone().or_else(|| event.channel_id().cloned()) {
                Some(cid) => {
                    self.save_message(message, &cid)?;
                }
                None => tracing::warn!(
                    "Skipping message {} of {:?}: no channel id",
                    message.id,
                    event.kind
                ),
            }
        }

        Ok(())
    }
}

impl<S> Session for S where
    S: UserStore
        + CurrentUserStore
        + ChannelStore
        + MessageStore
        + ReadStore
        + MemberStore
        + AttachmentStore
        + QueryStore
{
}

/// A unit of work over a private copy of the cache.
///
/// Created by [`LocalCache::write`](super::LocalCache::write); its changes
/// become visible only if the whole closure succeeds.
#[derive(Debug)]
pub struct WriteSession<'a> {
    state: &'a mut CacheState,
}

impl<'a> WriteSession<'a> {
    pub(crate) fn new(state: &'a mut CacheState) -> Self {
        Self { state }
    }

    /// Read access to the working copy.
    pub fn state(&self) -> &CacheState {
        self.state
    }

    fn channel_mut(&mut self, cid: &ChannelId) -> Result<&mut ChannelRecord, CacheError> {
        self.state
            .channels
            .get_mut(cid)
            .ok_or_else(|| CacheError::ChannelNotFound(cid.clone()))
    }

    fn message_mut(&mut self, id: &MessageId) -> Result<&mut MessageRecord, CacheError> {
        self.state
            .messages
            .get_mut(id)
            .ok_or_else(|| CacheError::MessageNotFound(id.clone()))
    }

    fn current_user_mut(&mut self) -> Result<&mut CurrentUserRecord, CacheError> {
        self.state
            .current_user
            .as_mut()
            .ok_or(CacheError::MissingCurrentUser)
    }

    fn set_pinned(&mut self, id: &MessageId, pinned: bool) -> Result<MessageRecord, CacheError> {
        let message = self.message_mut(id)?;
        message.pinned = pinned;
        let record = message.clone();

        let channel = self.channel_mut(&record.cid)?;
        if pinned {
            channel.pinned_messages.insert(id.clone());
        } else {
            channel.pinned_messages.remove(id);
        }
        Ok(record)
    }
}

impl UserStore for WriteSession<'_> {
    fn save_user(&mut self, payload: &UserPayload) -> Result<UserRecord, CacheError> {
        let record = self
            .state
            .users
            .entry(payload.id.clone())
            .and_modify(|user| user.apply(payload))
            .or_insert_with(|| UserRecord::from(payload));
        Ok(record.clone())
    }

    fn user(&self, id: &UserId) -> Option<UserRecord> {
        self.state.user(id).cloned()
    }
}

impl CurrentUserStore for WriteSession<'_> {
    fn save_current_user(
        &mut self,
        payload: &CurrentUserPayload,
    ) -> Result<CurrentUserRecord, CacheError> {
        self.save_user(&payload.user)?;

        let record = self
            .state
            .current_user
            .get_or_insert_with(|| CurrentUserRecord {
                user_id: payload.user.id.clone(),
                devices: Vec::new(),
                unread_count: UnreadCount::default(),
                last_received_event_at: None,
            });
        record.user_id = payload.user.id.clone();
        if let Some(count) = payload.unread_count {
            record.unread_count = count;
        }

        if !payload.devices.is_empty() {
            self.save_current_user_devices(&payload.devices, true)?;
        }
        self.current_user_mut().map(|user| user.clone())
    }

    fn save_current_user_unread_count(
        &mut self,
        count: UnreadCount,
    ) -> Result<CurrentUserRecord, CacheError> {
        let user = self.current_user_mut()?;
        user.unread_count = count;
        Ok(user.clone())
    }

    fn save_current_user_devices(
        &mut self,
        devices: &[DevicePayload],
        clear_existing: bool,
    ) -> Result<Vec<DeviceRecord>, CacheError> {
        let user = self.current_user_mut()?;
        if clear_existing {
            user.devices.clear();
        }

        for device in devices {
            let record = DeviceRecord {
                id: device.id.clone(),
                created_at: device.created_at,
            };
            match user.devices.iter_mut().find(|d| d.id == device.id) {
                Some(existing) => *existing = record,
                None => user.devices.push(record),
            }
        }
        Ok(user.devices.clone())
    }

    fn delete_device(&mut self, id: &DeviceId) -> Result<(), CacheError> {
        let user = self.current_user_mut()?;
        user.devices.retain(|device| &device.id != id);
        Ok(())
    }

    fn save_last_received_event_at(&mut self, at: u64) -> Result<CurrentUserRecord, CacheError> {
        let user = self.current_user_mut()?;
        user.last_received_event_at = Some(user.last_received_event_at.map_or(at, |t| t.max(at)));
        Ok(user.clone())
    }

    fn current_user(&self) -> Option<CurrentUserRecord> {
        self.state.current_user().cloned()
    }
}

impl ChannelStore for WriteSession<'_> {
    fn save_channel(
        &mut self,
        payload: &ChannelPayload,
        query: Option<&ChannelListQuery>,
    ) -> Result<ChannelRecord, CacheError> {
        let cid = payload.cid().clone();
        self.save_channel_detail(&payload.channel, query)?;

        for member in &payload.members {
            self.save_member(member, &cid)?;
        }

        let mut watchers = BTreeSet::new();
        for watcher in &payload.watchers {
            watchers.insert(self.save_user(watcher)?.id);
        }
        self.channel_mut(&cid)?.watchers = watchers;

        for message in &payload.messages {
            self.save_message(message, &cid)?;
        }
        for message in &payload.pinned_messages {
            self.save_message(message, &cid)?;
            self.pin_message(&message.id)?;
        }
        for read in &payload.reads {
            self.save_channel_read(read, &cid)?;
        }

        self.channel_mut(&cid).map(|channel| channel.clone())
    }

    fn save_channel_detail(
        &mut self,
        detail: &ChannelDetail,
        query: Option<&ChannelListQuery>,
    ) -> Result<ChannelRecord, CacheError> {
        self.state
            .channels
            .entry(detail.cid.clone())
            .or_insert_with(|| ChannelRecord::new(detail.cid.clone()))
            .apply_detail(detail);

        if let Some(query) = query {
            let hash = self.save_query(query)?.hash();
            self.link_channel(&hash, &detail.cid)?;
        }

        self.channel_mut(&detail.cid).map(|channel| channel.clone())
    }

    fn reset_channel(&mut self, cid: &ChannelId) -> Result<ChannelRecord, CacheError> {
        let channel = self.channel_mut(cid)?;
        let queries = std::mem::take(&mut channel.queries);
        channel.reset_local_data();
        let record = channel.clone();

        for hash in queries {
            if let Some(query) = self.state.queries.get_mut(&hash) {
                query.channels.remove(cid);
            }
        }
        Ok(record)
    }

    fn channel(&self, cid: &ChannelId) -> Option<ChannelRecord> {
        self.state.channel(cid).cloned()
    }

    fn delete_channels(&mut self, query: &QueryHash) -> Result<usize, CacheError> {
        let linked = self.unlink_channels(query)?;
        let mut deleted = 0;

        for cid in linked {
            let exclusive = self
                .state
                .channels
                .get(&cid)
                .is_some_and(|channel| channel.queries.is_empty());
            if !exclusive {
                continue;
            }

            if let Some(channel) = self.state.channels.remove(&cid) {
                for id in &channel.messages {
                    self.delete_message(id)?;
                }
                self.state.members.retain(|(member_cid, _), _| member_cid != &cid);
                self.state.reads.retain(|(read_cid, _), _| read_cid != &cid);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl MessageStore for WriteSession<'_> {
    fn save_message(
        &mut self,
        payload: &MessagePayload,
        cid: &ChannelId,
    ) -> Result<MessageRecord, CacheError> {
        if !self.state.channels.contains_key(cid) {
            return Err(CacheError::ChannelNotFound(cid.clone()));
        }
        self.save_user(&payload.user)?;

        let previous = self.state.messages.get(&payload.id).cloned();
        let mut record = MessageRecord {
            id: payload.id.clone(),
            cid: cid.clone(),
            user_id: payload.user.id.clone(),
            text: payload.text.clone(),
            created_at: payload.created_at,
            updated_at: payload.updated_at,
            deleted_at: payload.deleted_at,
            pinned: payload.pinned,
            attachments: Vec::new(),
            reactions: previous
                .as_ref()
                .map(|m| m.reactions.clone())
                .unwrap_or_default(),
        };
        record.attachments = (0..payload.attachments.len())
            .map(|index| AttachmentId::new(cid.clone(), payload.id.clone(), index))
            .collect();

        // Attachments the new payload no longer carries.
        if let Some(previous) = &previous {
            for stale in previous.attachments.iter().skip(payload.attachments.len()) {
                self.state.attachments.remove(stale);
                self.channel_mut(cid)?.attachments.remove(stale);
            }
        }
        self.state.messages.insert(payload.id.clone(), record);

        for (attachment, id) in payload.attachments.iter().zip(
            (0..payload.attachments.len())
                .map(|index| AttachmentId::new(cid.clone(), payload.id.clone(), index)),
        ) {
            self.save_attachment(attachment, &id)?;
        }
        for reaction in &payload.latest_reactions {
            self.save_reaction(reaction)?;
        }

        let channel = self.channel_mut(cid)?;
        channel.messages.insert(payload.id.clone());
        if payload.pinned {
            channel.pinned_messages.insert(payload.id.clone());
        } else {
            channel.pinned_messages.remove(&payload.id);
        }
        channel.last_message_at = Some(
            channel
                .last_message_at
                .map_or(payload.created_at, |t| t.max(payload.created_at)),
        );
        channel.oldest_message_at = Some(
            channel
                .oldest_message_at
                .map_or(payload.created_at, |t| t.min(payload.created_at)),
        );

        self.message_mut(&payload.id).map(|message| message.clone())
    }

    fn message(&self, id: &MessageId) -> Option<MessageRecord> {
        self.state.message(id).cloned()
    }

    fn delete_message(&mut self, id: &MessageId) -> Result<(), CacheError> {
        let Some(message) = self.state.messages.remove(id) else {
            return Ok(());
        };

        for key in &message.reactions {
            self.state.reactions.remove(key);
        }
        for attachment in &message.attachments {
            self.state.attachments.remove(attachment);
        }
        if let Some(channel) = self.state.channels.get_mut(&message.cid) {
            channel.messages.remove(id);
            channel.pinned_messages.remove(id);
            for attachment in &message.attachments {
                channel.attachments.remove(attachment);
            }
        }
        Ok(())
    }

    fn pin_message(&mut self, id: &MessageId) -> Result<MessageRecord, CacheError> {
        self.set_pinned(id, true)
    }

    fn unpin_message(&mut self, id: &MessageId) -> Result<MessageRecord, CacheError> {
        self.set_pinned(id, false)
    }

    fn save_reaction(&mut self, payload: &ReactionPayload) -> Result<ReactionRecord, CacheError> {
        if !self.state.messages.contains_key(&payload.message_id) {
            return Err(CacheError::MessageNotFound(payload.message_id.clone()));
        }
        self.save_user(&payload.user)?;

        let key = ReactionKey {
            message_id: payload.message_id.clone(),
            user_id: payload.user.id.clone(),
            kind: payload.kind.clone(),
        };
        let record = ReactionRecord {
            key: key.clone(),
            score: payload.score,
            created_at: payload.created_at,
        };
        self.state.reactions.insert(key.clone(), record.clone());
        self.message_mut(&payload.message_id)?.reactions.insert(key);
        Ok(record)
    }

    fn reaction(&self, key: &ReactionKey) -> Option<ReactionRecord> {
        self.state.reaction(key).cloned()
    }

    fn delete_reaction(&mut self, key: &ReactionKey) -> Result<(), CacheError> {
        self.state.reactions.remove(key);
        if let Some(message) = self.state.messages.get_mut(&key.message_id) {
            message.reactions.remove(key);
        }
        Ok(())
    }
}

impl ReadStore for WriteSession<'_> {
    fn save_channel_read(
        &mut self,
        payload: &ChannelReadPayload,
        cid: &ChannelId,
    ) -> Result<ReadRecord, CacheError> {
        self.channel_mut(cid)?;
        self.save_user(&payload.user)?;

        let record = ReadRecord {
            cid: cid.clone(),
            user_id: payload.user.id.clone(),
            last_read_at: payload.last_read_at,
            unread_messages: payload.unread_messages,
        };
        self.state
            .reads
            .insert((cid.clone(), payload.user.id.clone()), record.clone());
        self.channel_mut(cid)?.reads.insert(payload.user.id.clone());
        Ok(record)
    }

    fn load_channel_read(&self, cid: &ChannelId, user: &UserId) -> Option<ReadRecord> {
        self.state.channel_read(cid, user).cloned()
    }

    fn load_channel_reads(&self, user: &UserId) -> Vec<ReadRecord> {
        self.state.channel_reads(user).into_iter().cloned().collect()
    }
}

impl MemberStore for WriteSession<'_> {
    fn save_member(
        &mut self,
        payload: &MemberPayload,
        cid: &ChannelId,
    ) -> Result<MemberRecord, CacheError> {
        self.channel_mut(cid)?;
        self.save_user(&payload.user)?;

        let record = MemberRecord {
            cid: cid.clone(),
            user_id: payload.user.id.clone(),
            role: payload.role.clone(),
            created_at: payload.created_at,
        };
        self.state
            .members
            .insert((cid.clone(), payload.user.id.clone()), record.clone());
        self.channel_mut(cid)?.members.insert(payload.user.id.clone());
        Ok(record)
    }

    fn member(&self, cid: &ChannelId, user: &UserId) -> Option<MemberRecord> {
        self.state.member(cid, user).cloned()
    }
}

impl AttachmentStore for WriteSession<'_> {
    fn save_attachment(
        &mut self,
        payload: &AttachmentPayload,
        id: &AttachmentId,
    ) -> Result<AttachmentRecord, CacheError> {
        self.message_mut(&id.message_id)?;

        let record = AttachmentRecord::new(id.clone(), payload);
        self.state.attachments.insert(id.clone(), record.clone());
        if let Some(channel) = self.state.channels.get_mut(&id.cid) {
            channel.attachments.insert(id.clone());
        }
        Ok(record)
    }

    fn attachment(&self, id: &AttachmentId) -> Option<AttachmentRecord> {
        self.state.attachment(id).cloned()
    }
}

impl QueryStore for WriteSession<'_> {
    fn save_query(&mut self, query: &ChannelListQuery) -> Result<QueryRecord, CacheError> {
        let first = query.with_pagination(Pagination::first_page(query.pagination.limit));
        let record = self
            .state
            .queries
            .entry(first.hash())
            .and_modify(|record| record.query = first.clone())
            .or_insert_with(|| QueryRecord {
                query: first.clone(),
                channels: BTreeSet::new(),
            });
        Ok(record.clone())
    }

    fn channel_list_query(&self, hash: &QueryHash) -> Option<QueryRecord> {
        self.state.query(hash).cloned()
    }

    fn load_channel_list_queries(&self) -> Vec<QueryRecord> {
        self.state.queries().cloned().collect()
    }

    fn delete_query(&mut self, hash: &QueryHash) -> Result<(), CacheError> {
        self.unlink_channels(hash)?;
        self.state.queries.remove(hash);
        Ok(())
    }

    fn link_channel(&mut self, hash: &QueryHash, cid: &ChannelId) -> Result<(), CacheError> {
        self.channel_mut(cid)?.queries.insert(hash.clone());
        if let Some(query) = self.state.queries.get_mut(hash) {
            query.channels.insert(cid.clone());
        }
        Ok(())
    }

    fn unlink_channels(&mut self, hash: &QueryHash) -> Result<BTreeSet<ChannelId>, CacheError> {
        let Some(query) = self.state.queries.get_mut(hash) else {
            return Ok(BTreeSet::new());
        };

        let unlinked = std::mem::take(&mut query.channels);
        for cid in &unlinked {
            if let Some(channel) = self.state.channels.get_mut(cid) {
                channel.queries.remove(hash);
            }
        }
        Ok(unlinked)
    }

    fn unlink_channel(&mut self, cid: &ChannelId) -> Result<BTreeSet<QueryHash>, CacheError> {
        let Some(channel) = self.state.channels.get_mut(cid) else {
            return Ok(BTreeSet::new());
        };

        let left = std::mem::take(&mut channel.queries);
        for hash in &left {
            if let Some(query) = self.state.queries.get_mut(hash) {
                query.channels.remove(cid);
            }
        }
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_types::Filter;

    fn cid(id: &str) -> ChannelId {
        ChannelId::new("messaging", id)
    }

    fn query() -> ChannelListQuery {
        ChannelListQuery::new(Filter::none(), vec![], 25)
    }

    fn message(id: &str, at: u64) -> MessagePayload {
        MessagePayload::new(id, UserPayload::new("bob"), "hello", at)
    }

    fn channel_payload(id: &str) -> ChannelPayload {
        let mut payload = ChannelPayload::new(ChannelDetail::new(cid(id)));
        payload.members.push(MemberPayload {
            user: UserPayload::new("alice"),
            role: Some("member".into()),
            created_at: None,
        });
        payload.watchers.push(UserPayload::new("carol"));
        payload.messages.push(message("m1", 10));
        payload.reads.push(ChannelReadPayload {
            user: UserPayload::new("alice"),
            last_read_at: 5,
            unread_messages: 1,
        });
        payload
    }

    fn current_user() -> CurrentUserPayload {
        CurrentUserPayload {
            user: UserPayload::new("alice"),
            devices: vec![],
            unread_count: None,
        }
    }

    #[test]
    fn save_channel_is_idempotent() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        let payload = channel_payload("a");

        let first = session.save_channel(&payload, Some(&query())).unwrap();
        let second = session.save_channel(&payload, Some(&query())).unwrap();

        assert_eq!(first, second);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.members.len(), 1);
    }

    #[test]
    fn save_channel_stores_relations_and_link() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);

        let record = session
            .save_channel(&channel_payload("a"), Some(&query()))
            .unwrap();

        assert!(record.members.contains(&UserId::new("alice")));
        assert!(record.watchers.contains(&UserId::new("carol")));
        assert!(record.messages.contains(&MessageId::new("m1")));
        assert!(record.reads.contains(&UserId::new("alice")));
        assert_eq!(record.last_message_at, Some(10));
        assert!(record.queries.contains(&query().hash()));
        assert!(session
            .channel_list_query(&query().hash())
            .unwrap()
            .channels
            .contains(&cid("a")));
    }

    #[test]
    fn message_requires_existing_channel() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);

        let err = session.save_message(&message("m1", 1), &cid("ghost")).unwrap_err();
        assert!(matches!(err, CacheError::ChannelNotFound(_)));
    }

    #[test]
    fn delete_message_removes_children_but_not_users() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session
            .save_channel_detail(&ChannelDetail::new(cid("a")), None)
            .unwrap();
        let mut payload = message("m1", 1);
        payload.attachments.push(AttachmentPayload {
            kind: "image".into(),
            title: None,
            url: Some("https://cdn/x.png".into()),
        });
        payload.latest_reactions.push(ReactionPayload {
            message_id: MessageId::new("m1"),
            user: UserPayload::new("carol"),
            kind: "like".into(),
            score: 1,
            created_at: None,
        });
        session.save_message(&payload, &cid("a")).unwrap();

        session.delete_message(&MessageId::new("m1")).unwrap();

        assert!(state.messages.is_empty());
        assert!(state.attachments.is_empty());
        assert!(state.reactions.is_empty());
        assert!(state.users.contains_key(&UserId::new("carol")));
        assert!(state.channels[&cid("a")].messages.is_empty());
        assert!(state.channels[&cid("a")].attachments.is_empty());
    }

    #[test]
    fn pin_and_unpin_track_channel() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session
            .save_channel_detail(&ChannelDetail::new(cid("a")), None)
            .unwrap();
        session.save_message(&message("m1", 1), &cid("a")).unwrap();

        assert!(session.pin_message(&MessageId::new("m1")).unwrap().pinned);
        assert!(session.channel(&cid("a")).unwrap().pinned_messages.len() == 1);

        assert!(!session.unpin_message(&MessageId::new("m1")).unwrap().pinned);
        assert!(session.channel(&cid("a")).unwrap().pinned_messages.is_empty());
    }

    #[test]
    fn unread_count_requires_current_user() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);

        let err = session
            .save_current_user_unread_count(UnreadCount::default())
            .unwrap_err();
        assert!(matches!(err, CacheError::MissingCurrentUser));
    }

    #[test]
    fn devices_can_be_replaced_or_merged() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session.save_current_user(&current_user()).unwrap();
        let device = |id: &str| DevicePayload {
            id: DeviceId::new(id),
            created_at: None,
        };

        session
            .save_current_user_devices(&[device("d1")], false)
            .unwrap();
        let merged = session
            .save_current_user_devices(&[device("d2")], false)
            .unwrap();
        assert_eq!(merged.len(), 2);

        let replaced = session
            .save_current_user_devices(&[device("d3")], true)
            .unwrap();
        assert_eq!(replaced.len(), 1);

        session.delete_device(&DeviceId::new("d3")).unwrap();
        assert!(session.current_user().unwrap().devices.is_empty());
    }

    #[test]
    fn save_event_applies_every_part() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session.save_current_user(&current_user()).unwrap();

        let event = EventPayload::new(EventType::MessageNew)
            .with_cid(cid("a"))
            .with_channel(ChannelDetail::new(cid("a")))
            .with_user(UserPayload::new("bob"))
            .with_message(message("m9", 90))
            .with_unread_count(UnreadCount {
                channels: 1,
                messages: 3,
            })
            .at(95);

        session.save_event(&event).unwrap();

        let current = session.current_user().unwrap();
        assert_eq!(current.unread_count.messages, 3);
        assert_eq!(current.last_received_event_at, Some(95));
        assert_eq!(session.message(&MessageId::new("m9")).unwrap().cid, cid("a"));
        assert_eq!(session.channel(&cid("a")).unwrap().last_message_at, Some(90));
    }

    #[test]
    fn channel_deleted_event_unlinks_channel() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session.save_channel(&channel_payload("a"), Some(&query())).unwrap();
        session.save_channel(&channel_payload("b"), Some(&query())).unwrap();

        let event = EventPayload::new(EventType::ChannelDeleted).with_cid(cid("a"));
        session.save_event(&event).unwrap();

        let linked = session.channel_list_query(&query().hash()).unwrap().channels;
        assert_eq!(linked, BTreeSet::from([cid("b")]));
        assert!(session.channel(&cid("a")).unwrap().queries.is_empty());
    }

    #[test]
    fn save_event_skips_message_without_channel_id() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);

        let event = EventPayload::new(EventType::MessageNew).with_message(message("m1", 1));

        session.save_event(&event).unwrap();
        assert!(session.message(&MessageId::new("m1")).is_none());
    }

    #[test]
    fn save_event_without_current_user_skips_unread_count() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);

        let event = EventPayload::new(EventType::NotificationMarkRead)
            .with_unread_count(UnreadCount::default())
            .at(5);

        session.save_event(&event).unwrap();
        assert!(session.current_user().is_none());
    }

    #[test]
    fn reset_channel_unlinks_every_query() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        let other = ChannelListQuery::new(Filter::new(serde_json::json!({"frozen": true})), vec![], 5);
        session.save_channel(&channel_payload("a"), Some(&query())).unwrap();
        session.save_channel(&channel_payload("a"), Some(&other)).unwrap();

        let record = session.reset_channel(&cid("a")).unwrap();

        assert!(record.queries.is_empty());
        assert!(record.messages.is_empty());
        assert!(session.channel_list_query(&query().hash()).unwrap().channels.is_empty());
        assert!(session.channel_list_query(&other.hash()).unwrap().channels.is_empty());
    }

    #[test]
    fn delete_channels_spares_shared_channels() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        let other = ChannelListQuery::new(Filter::new(serde_json::json!({"frozen": true})), vec![], 5);
        session.save_channel(&channel_payload("only"), Some(&query())).unwrap();
        session
            .save_channel_detail(&ChannelDetail::new(cid("shared")), Some(&query()))
            .unwrap();
        session
            .save_channel_detail(&ChannelDetail::new(cid("shared")), Some(&other))
            .unwrap();

        let deleted = session.delete_channels(&query().hash()).unwrap();

        assert_eq!(deleted, 1);
        assert!(session.channel(&cid("only")).is_none());
        assert!(session.channel(&cid("shared")).is_some());
        assert!(session.message(&MessageId::new("m1")).is_none());
        assert!(session.member(&cid("only"), &UserId::new("alice")).is_none());
    }

    #[test]
    fn save_query_normalizes_window_and_keeps_links() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session
            .save_channel_detail(&ChannelDetail::new(cid("a")), Some(&query()))
            .unwrap();

        let later = query().with_pagination(Pagination {
            offset: 50,
            limit: 25,
        });
        let record = session.save_query(&later).unwrap();

        assert_eq!(record.query.pagination, Pagination::first_page(25));
        assert!(record.channels.contains(&cid("a")));
        assert_eq!(session.load_channel_list_queries().len(), 1);
    }

    #[test]
    fn delete_query_keeps_channels() {
        let mut state = CacheState::default();
        let mut session = WriteSession::new(&mut state);
        session
            .save_channel_detail(&ChannelDetail::new(cid("a")), Some(&query()))
            .unwrap();

        session.delete_query(&query().hash()).unwrap();

        assert!(session.channel_list_query(&query().hash()).is_none());
        assert!(session.channel(&cid("a")).unwrap().queries.is_empty());
    }
}
