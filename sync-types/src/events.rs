//! Realtime event payloads.
//!
//! Events arrive in receipt order over the realtime connection. Each one
//! may carry a channel id, a channel descriptor, a message, the acting user,
//! the current user and unread counters; which fields are set depends on
//! the event type.

use serde::{Deserialize, Serialize};

use crate::{ChannelDetail, ChannelId, CurrentUserPayload, MessagePayload, UnreadCount, UserPayload};

/// Event type discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A channel was deleted.
    #[serde(rename = "channel.deleted")]
    ChannelDeleted,
    /// A channel descriptor changed.
    #[serde(rename = "channel.updated")]
    ChannelUpdated,
    /// A message was posted.
    #[serde(rename = "message.new")]
    MessageNew,
    /// A message was edited.
    #[serde(rename = "message.updated")]
    MessageUpdated,
    /// A message was deleted.
    #[serde(rename = "message.deleted")]
    MessageDeleted,
    /// The current user was added to a channel.
    #[serde(rename = "notification.added_to_channel")]
    NotificationAddedToChannel,
    /// The current user read a channel.
    #[serde(rename = "notification.mark_read")]
    NotificationMarkRead,
    /// Someone started typing.
    #[serde(rename = "typing.start")]
    TypingStart,
    /// Someone stopped typing.
    #[serde(rename = "typing.stop")]
    TypingStop,
    /// Any event type this client does not interpret.
    #[serde(other)]
    Unknown,
}

/// A realtime notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Channel the event refers to.
    #[serde(default)]
    pub cid: Option<ChannelId>,
    /// Acting user.
    #[serde(default)]
    pub user: Option<UserPayload>,
    /// Channel descriptor.
    #[serde(default)]
    pub channel: Option<ChannelDetail>,
    /// The current user, when the event updates it.
    #[serde(default)]
    pub current_user: Option<CurrentUserPayload>,
    /// Unread counters of the current user.
    #[serde(default)]
    pub unread_count: Option<UnreadCount>,
    /// Message payload.
    #[serde(default)]
    pub message: Option<MessagePayload>,
    /// When the backend emitted the event.
    #[serde(default)]
    pub created_at: Option<u64>,
}

impl EventPayload {
    /// An event with only a type.
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            cid: None,
            user: None,
            channel: None,
            current_user: None,
            unread_count: None,
            message: None,
            created_at: None,
        }
    }

    /// Set the channel id.
    pub fn with_cid(mut self, cid: ChannelId) -> Self {
        self.cid = Some(cid);
        self
    }

    /// Set the channel descriptor.
    pub fn with_channel(mut self, channel: ChannelDetail) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set the message payload.
    pub fn with_message(mut self, message: MessagePayload) -> Self {
        self.message = Some(message);
        self
    }

    /// Set the acting user.
    pub fn with_user(mut self, user: UserPayload) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the unread counters.
    pub fn with_unread_count(mut self, unread: UnreadCount) -> Self {
        self.unread_count = Some(unread);
        self
    }

    /// Set the emission time.
    pub fn at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// The channel the event refers to: the explicit id, else the descriptor's.
    pub fn channel_id(&self) -> Option<&ChannelId> {
        self.cid
            .as_ref()
            .or_else(|| self.channel.as_ref().map(|c| &c.cid))
    }
}
