//! Per-channel sub-presenter.
//!
//! Each list row holds a [`ChannelPresenter`]: a cheap, cloneable handle to
//! one channel's descriptor, its latest messages and its unread marker.
//! Clones share state, so the row and the list owner see the same updates.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatsync_core::ListEntry;
use chatsync_types::{
    ChannelDetail, ChannelId, ChannelPayload, EventPayload, EventType, MessagePayload, UserId,
};

use crate::cache::{CacheState, ChannelRecord};

/// Handle to one channel's presentation state.
#[derive(Clone)]
pub struct ChannelPresenter {
    cid: ChannelId,
    current_user: Option<UserId>,
    inner: Arc<Mutex<ChannelPresenterInner>>,
}

#[derive(Debug)]
struct ChannelPresenterInner {
    detail: ChannelDetail,
    messages: Vec<MessagePayload>,
    unread_since: Option<u64>,
    messages_pending: bool,
}

impl ChannelPresenter {
    fn new(
        detail: ChannelDetail,
        messages: Vec<MessagePayload>,
        messages_pending: bool,
        current_user: Option<UserId>,
    ) -> Self {
        Self {
            cid: detail.cid.clone(),
            current_user,
            inner: Arc::new(Mutex::new(ChannelPresenterInner {
                detail,
                messages,
                unread_since: None,
                messages_pending,
            })),
        }
    }

    /// A presenter initialized from a fetched channel.
    pub fn from_payload(payload: &ChannelPayload, current_user: Option<UserId>) -> Self {
        Self::new(
            payload.channel.clone(),
            payload.messages.clone(),
            false,
            current_user,
        )
    }

    /// A presenter for a bare descriptor whose messages are not loaded yet.
    pub fn from_detail(detail: ChannelDetail, current_user: Option<UserId>) -> Self {
        Self::new(detail, Vec::new(), true, current_user)
    }

    /// A presenter initialized from the cache.
    pub fn from_record(
        record: &ChannelRecord,
        cache: &CacheState,
        current_user: Option<UserId>,
    ) -> Self {
        Self::new(
            record.detail(),
            cache.channel_messages(&record.cid),
            false,
            current_user,
        )
    }

    fn inner(&self) -> MutexGuard<'_, ChannelPresenterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The channel id.
    pub fn cid(&self) -> &ChannelId {
        &self.cid
    }

    /// The current descriptor.
    pub fn detail(&self) -> ChannelDetail {
        self.inner().detail.clone()
    }

    /// Loaded messages, oldest first.
    pub fn messages(&self) -> Vec<MessagePayload> {
        self.inner().messages.clone()
    }

    /// The most recent message.
    pub fn latest_message(&self) -> Option<MessagePayload> {
        self.inner().messages.last().cloned()
    }

    /// Creation time of the oldest unread message from someone else.
    pub fn unread_since(&self) -> Option<u64> {
        self.inner().unread_since
    }

    /// Whether the first page of messages has not arrived yet.
    pub fn is_messages_pending(&self) -> bool {
        self.inner().messages_pending
    }

    /// Take the first page of messages from a channel query.
    pub fn load_first_messages(&self, payload: &ChannelPayload) {
        let mut inner = self.inner();
        inner.detail = payload.channel.clone();
        inner.messages = payload.messages.clone();
        inner.messages_pending = false;
    }

    /// Clear the unread marker.
    pub fn clear_unread_marker(&self) {
        self.inner().unread_since = None;
    }

    /// Apply a realtime event. Returns the message it touched, if any.
    pub fn apply_event(&self, event: &EventPayload) -> Option<MessagePayload> {
        let mut inner = self.inner();

        match event.kind {
            EventType::MessageNew => {
                let message = event.message.clone()?;
                let from_other = self.current_user.as_ref() != Some(&message.user.id);
                if from_other && inner.unread_since.is_none() {
                    inner.unread_since = Some(message.created_at);
                }
                inner.detail.last_message_at = Some(
                    inner
                        .detail
                        .last_message_at
                        .map_or(message.created_at, |t| t.max(message.created_at)),
                );
                upsert_message(&mut inner.messages, message.clone());
                Some(message)
            }
            EventType::MessageDeleted => {
                let message = event.message.clone()?;
                upsert_message(&mut inner.messages, message.clone());
                Some(message)
            }
            _ => None,
        }
    }
}

fn upsert_message(messages: &mut Vec<MessagePayload>, message: MessagePayload) {
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => *existing = message,
        None => {
            let at = messages.partition_point(|m| m.created_at <= message.created_at);
            messages.insert(at, message);
        }
    }
}

impl ListEntry for ChannelPresenter {
    fn cid(&self) -> &ChannelId {
        &self.cid
    }
}

impl std::fmt::Debug for ChannelPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner();
        f.debug_struct("ChannelPresenter")
            .field("cid", &self.cid)
            .field("messages", &inner.messages.len())
            .field("unread_since", &inner.unread_since)
            .field("messages_pending", &inner.messages_pending)
            .finish()
    }
}
