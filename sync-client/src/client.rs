//! ChatSyncClient - the main entry point of chatsync.
//!
//! The client ties the pieces together: one [`LocalCache`], one remote
//! [`ChannelApi`], one realtime event fan-out, and any number of list
//! presenters.
//!
//! ```text
//! realtime events ─► LocalCache ◄── ResyncWorker
//!        │                ▲
//!        ▼                │
//! ChannelListPresenter ◄── ChannelApi
//!        │
//!        ▼
//!  ViewChange feed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chatsync_client::{ChatSyncClient, ClientConfig, MockChannelApi};
//!
//! let client = ChatSyncClient::new(ClientConfig::default(), MockChannelApi::new())?;
//! let list = client.channel_list(query);
//! let mut changes = list.changes();
//! list.request_next_page()?;
//! while let Ok(change) = changes.recv().await {
//!     render(change);
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chatsync_types::{ChannelId, ChannelListQuery, CurrentUserPayload, EventPayload};
use tokio::sync::broadcast;

use crate::cache::{CurrentUserStore, LocalCache};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::presenter::ChannelListPresenter;
use crate::reconciler::EventReconciler;
use crate::remote::ChannelApi;
use crate::resync::ResyncWorker;

/// Local-first channel list client.
#[derive(Debug)]
pub struct ChatSyncClient<A> {
    config: ClientConfig,
    api: Arc<A>,
    cache: Arc<LocalCache>,
    reconciler: EventReconciler,
    events: broadcast::Sender<EventPayload>,
}

impl<A> ChatSyncClient<A>
where
    A: ChannelApi + 'static,
{
    /// Create a client, opening the cache snapshot named in `config`.
    ///
    /// Without a snapshot path the cache lives in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be loaded.
    pub fn new(config: ClientConfig, api: A) -> Result<Self, ClientError> {
        let cache = match &config.cache.snapshot_path {
            Some(path) => LocalCache::open(path)?,
            None => LocalCache::in_memory(),
        };
        Ok(Self::with_cache(config, api, Arc::new(cache)))
    }

    /// Create a client over an existing cache.
    pub fn with_cache(config: ClientConfig, api: A, cache: Arc<LocalCache>) -> Self {
        let (events, _) = broadcast::channel(config.feed.change_buffer.max(1));
        Self {
            config,
            api: Arc::new(api),
            reconciler: EventReconciler::new(Arc::clone(&cache)),
            cache,
            events,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The local cache.
    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    /// The remote API.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Store the authenticated user.
    ///
    /// List presenters created afterwards use it to tell own messages from
    /// others' for unread markers.
    pub async fn set_current_user(&self, payload: &CurrentUserPayload) -> Result<(), ClientError> {
        self.cache
            .write(|session| session.save_current_user(payload).map(|_| ()))
            .await?;
        Ok(())
    }

    /// Start a presenter for `query`. Must be called within a Tokio runtime.
    pub fn channel_list(&self, query: ChannelListQuery) -> ChannelListPresenter {
        ChannelListPresenter::spawn(
            query,
            Arc::clone(&self.api),
            Arc::clone(&self.cache),
            self.events.subscribe(),
            &self.config,
        )
    }

    /// Save a realtime event, then deliver it to every live list presenter.
    ///
    /// The event is saved once, whatever the number of lists. Lists are
    /// updated even when the save fails.
    ///
    /// # Errors
    ///
    /// Returns the cache error of a failed save.
    pub async fn publish_event(&self, event: EventPayload) -> Result<(), ClientError> {
        let saved = self.reconciler.save(&event).await;
        if let Err(e) = &saved {
            tracing::warn!("Failed to save {:?} event: {}", event.kind, e);
        }

        tracing::debug!("Publishing {:?} event", event.kind);
        // No live list is fine.
        let _ = self.events.send(event);
        saved?;
        Ok(())
    }

    /// A resync worker sharing this client's API and cache.
    pub fn resync_worker(&self) -> ResyncWorker<A> {
        ResyncWorker::new(
            Arc::clone(&self.api),
            Arc::clone(&self.cache),
            self.config.resync.max_concurrent_fetches,
        )
    }

    /// Refresh every stored query after a connectivity gap.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resync`] naming the queries that failed.
    pub async fn resync(&self, synced: &BTreeSet<ChannelId>) -> Result<(), ClientError> {
        self.resync_worker().resync(synced).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryStore;
    use crate::error::ResyncError;
    use crate::remote::MockChannelApi;
    use chatsync_core::ViewChange;
    use chatsync_types::{
        ChannelDetail, ChannelListPayload, ChannelPayload, EventType, Filter, MessageId,
        MessagePayload, UserPayload,
    };
    use serde_json::json;
    use std::time::Duration;

    fn cid(id: &str) -> ChannelId {
        ChannelId::new("messaging", id)
    }

    fn query() -> ChannelListQuery {
        ChannelListQuery::new(Filter::new(json!({ "members": { "$in": ["alice"] } })), vec![], 25)
    }

    fn page(ids: &[&str]) -> ChannelListPayload {
        ChannelListPayload::new(
            ids.iter()
                .map(|id| ChannelPayload::new(ChannelDetail::new(cid(id))))
                .collect(),
        )
    }

    fn alice() -> CurrentUserPayload {
        CurrentUserPayload {
            user: UserPayload::new("alice"),
            devices: vec![],
            unread_count: None,
        }
    }

    fn message_from(user: &str, channel: &str, id: &str, at: u64) -> EventPayload {
        let mut message = MessagePayload::new(id, UserPayload::new(user), "hi", at);
        message.cid = Some(cid(channel));
        EventPayload::new(EventType::MessageNew)
            .with_cid(cid(channel))
            .with_message(message)
    }

    #[tokio::test]
    async fn events_reach_live_lists() {
        let api = MockChannelApi::new();
        api.set_page(&query(), page(&["a", "b"]));
        let client = ChatSyncClient::new(ClientConfig::default(), api).unwrap();
        client.set_current_user(&alice()).await.unwrap();

        let list = client.channel_list(query());
        let mut changes = list.changes();
        list.request_next_page().unwrap();
        let loaded = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(loaded, ViewChange::Reloaded { .. }));

        client
            .publish_event(message_from("alice", "b", "m1", 10))
            .await
            .unwrap();
        let moved = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();

        match moved {
            ViewChange::ItemMoved { from, to, items } => {
                assert_eq!((from, to), (1, 0));
                // Own message: no unread marker.
                assert_eq!(items[0].channel().unwrap().unread_since(), None);
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[tokio::test]
    async fn events_without_lists_are_saved() {
        let client = ChatSyncClient::new(ClientConfig::default(), MockChannelApi::new()).unwrap();
        let event = EventPayload::new(EventType::ChannelUpdated)
            .with_channel(ChannelDetail::new(cid("a")));

        client.publish_event(event).await.unwrap();

        assert!(client.cache().snapshot().channel(&cid("a")).is_some());
    }

    #[tokio::test]
    async fn events_are_saved_even_when_lists_lag() {
        let mut config = ClientConfig::default();
        config.feed.change_buffer = 4;
        let client = ChatSyncClient::new(config, MockChannelApi::new()).unwrap();
        client
            .publish_event(
                EventPayload::new(EventType::ChannelUpdated)
                    .with_channel(ChannelDetail::new(cid("a"))),
            )
            .await
            .unwrap();
        let _list = client.channel_list(query());

        for i in 0..20 {
            client
                .publish_event(message_from("bob", "a", &format!("m{}", i), i))
                .await
                .unwrap();
        }

        let snapshot = client.cache().snapshot();
        let saved = (0..20)
            .filter(|i| snapshot.message(&MessageId::new(format!("m{}", i))).is_some())
            .count();
        assert_eq!(saved, 20);
    }

    #[tokio::test]
    async fn snapshot_path_persists_between_clients() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.cache.snapshot_path = Some(dir.path().join("cache.msgpack"));

        {
            let client = ChatSyncClient::new(config.clone(), MockChannelApi::new()).unwrap();
            client.set_current_user(&alice()).await.unwrap();
            client
                .publish_event(
                    EventPayload::new(EventType::ChannelUpdated)
                        .with_channel(ChannelDetail::new(cid("a"))),
                )
                .await
                .unwrap();
            client
                .publish_event(message_from("bob", "a", "m1", 3))
                .await
                .unwrap();
        }

        let reopened = ChatSyncClient::new(config, MockChannelApi::new()).unwrap();
        let snapshot = reopened.cache().snapshot();
        assert!(snapshot.message(&MessageId::new("m1")).is_some());
        assert_eq!(
            snapshot.current_user().map(|user| user.user_id.as_str().to_string()),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn resync_failure_names_failed_queries() {
        let api = MockChannelApi::new();
        api.fail_query(&query(), "offline");
        let client = ChatSyncClient::new(ClientConfig::default(), api).unwrap();
        client
            .cache()
            .write(|session| session.save_query(&query()).map(|_| ()))
            .await
            .unwrap();

        let err = client.resync(&BTreeSet::new()).await.unwrap_err();

        match err {
            ClientError::Resync(ResyncError::QueriesRefetchFailed { failed }) => {
                assert_eq!(failed.len(), 1);
                assert!(failed.contains(&query().hash()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
