//! Realtime event reconciliation.
//!
//! Every event is saved to the cache once, then applied to each live list:
//!
//! | Event | Effect on the list |
//! |---|---|
//! | `channel.deleted` | row removed |
//! | `message.new`, channel listed | row moved to the front |
//! | `message.new`, channel unknown but attached | staged as a new channel |
//! | `message.deleted` | row updated |
//! | `notification.added_to_channel` | staged as a new channel |
//! | `notification.mark_read`, nothing unread | unread marker cleared |
//!
//! Anything else, or an event naming a channel the list does not hold,
//! yields [`ViewChange::None`].

use std::sync::Arc;
use std::time::Instant;

use chatsync_core::ViewChange;
use chatsync_types::{ChannelDetail, ChannelId, EventPayload, EventType};

use crate::cache::{LocalCache, Session};
use crate::error::CacheError;
use crate::presenter::{ChannelPresenter, ListState};

/// What an event did to a list.
#[derive(Debug, Clone)]
pub enum Reconciliation {
    /// A change to publish.
    Change(ViewChange<ChannelPresenter>),
    /// A new channel was staged; its first messages must be loaded before
    /// it is inserted.
    Staged(ChannelId),
}

impl Reconciliation {
    /// The change carried, or `None` for a staged channel.
    pub fn into_change(self) -> ViewChange<ChannelPresenter> {
        match self {
            Self::Change(change) => change,
            Self::Staged(_) => ViewChange::None,
        }
    }
}

/// Applies realtime events to the cache and to lists.
#[derive(Debug, Clone)]
pub struct EventReconciler {
    cache: Arc<LocalCache>,
}

impl EventReconciler {
    /// Create a reconciler writing through `cache`.
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self { cache }
    }

    /// Save everything `event` carries in one write session.
    pub async fn save(&self, event: &EventPayload) -> Result<(), CacheError> {
        self.cache.write(|session| session.save_event(event)).await
    }

    /// Apply `event` to `state` without touching the cache.
    pub fn apply(state: &mut ListState, event: &EventPayload, now: Instant) -> Reconciliation {
        let Some(cid) = event.channel_id().cloned() else {
            tracing::debug!("Ignoring {:?} event without channel", event.kind);
            return Reconciliation::Change(ViewChange::None);
        };

        match event.kind {
            EventType::ChannelDeleted => {
                state.staged.commit(&cid);
                let change = state.items.remove(&cid);
                if !change.is_none() {
                    state.cursor.on_item_removed();
                }
                Reconciliation::Change(change)
            }
            EventType::MessageNew if state.items.position(&cid).is_some() => {
                Reconciliation::Change(state.items.move_to_front(&cid, |entry| {
                    entry.apply_event(event);
                }))
            }
            EventType::MessageNew => match &event.channel {
                Some(detail) => Self::stage(state, detail.clone(), now),
                None => Reconciliation::Change(ViewChange::None),
            },
            EventType::MessageDeleted => {
                let messages = event.message.iter().cloned().collect();
                Reconciliation::Change(state.items.update(&cid, messages, |entry| {
                    entry.apply_event(event);
                }))
            }
            EventType::NotificationAddedToChannel => {
                let detail = event
                    .channel
                    .clone()
                    .unwrap_or_else(|| ChannelDetail::new(cid.clone()));
                Self::stage(state, detail, now)
            }
            EventType::NotificationMarkRead
                if event.unread_count.is_some_and(|count| count.messages == 0) =>
            {
                Reconciliation::Change(state.items.update(&cid, Vec::new(), |entry| {
                    entry.clear_unread_marker();
                }))
            }
            _ => Reconciliation::Change(ViewChange::None),
        }
    }

    fn stage(state: &mut ListState, detail: ChannelDetail, now: Instant) -> Reconciliation {
        let cid = detail.cid.clone();
        if state.items.position(&cid).is_some() {
            return Reconciliation::Change(ViewChange::None);
        }

        let entry = ChannelPresenter::from_detail(detail, state.current_user.clone());
        if state.staged.stage(entry, now) {
            tracing::debug!("Staged new channel {}", cid);
            Reconciliation::Staged(cid)
        } else {
            Reconciliation::Change(ViewChange::None)
        }
    }
}
