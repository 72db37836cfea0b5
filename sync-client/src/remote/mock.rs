//! Mock channel API for testing.
//!
//! Allows queueing pages per query, forcing failures, pausing requests and
//! capturing every request for verification.

use super::ChannelApi;
use crate::error::RemoteError;
use async_trait::async_trait;
use chatsync_types::{
    ChannelDetail, ChannelId, ChannelListPayload, ChannelListQuery, ChannelPayload, QueryHash,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Mock channel API for testing.
///
/// Pages are keyed by query hash. A queued page is returned once; the page
/// set with [`set_page`](Self::set_page) is returned whenever the queue is
/// empty. Unknown queries return an empty page.
#[derive(Debug)]
pub struct MockChannelApi {
    inner: Arc<Mutex<MockChannelApiInner>>,
    fetch_gate: Arc<watch::Sender<bool>>,
    channel_gate: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Default)]
struct MockChannelApiInner {
    queued_pages: HashMap<QueryHash, VecDeque<ChannelListPayload>>,
    pages: HashMap<QueryHash, ChannelListPayload>,
    failing_queries: HashMap<QueryHash, String>,
    fail_next_fetches: Option<(u32, String)>,
    fetch_requests: Vec<ChannelListQuery>,
    channels: HashMap<ChannelId, ChannelPayload>,
    failing_channels: HashSet<ChannelId>,
    channel_requests: Vec<ChannelId>,
    hidden: Vec<ChannelId>,
    fail_next_hide: Option<String>,
}

impl MockChannelApi {
    /// Create a new mock API.
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            fetch_gate: Arc::new(watch::channel(true).0),
            channel_gate: Arc::new(watch::channel(true).0),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MockChannelApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `page` for every fetch of `query` once the queue is empty.
    pub fn set_page(&self, query: &ChannelListQuery, page: ChannelListPayload) {
        self.inner().pages.insert(query.hash(), page);
    }

    /// Queue a page to be returned by the next fetch of `query`.
    pub fn queue_page(&self, query: &ChannelListQuery, page: ChannelListPayload) {
        self.inner()
            .queued_pages
            .entry(query.hash())
            .or_default()
            .push_back(page);
    }

    /// Cause every fetch of `query` to fail until cleared.
    pub fn fail_query(&self, query: &ChannelListQuery, error: &str) {
        self.inner()
            .failing_queries
            .insert(query.hash(), error.to_string());
    }

    /// Let fetches of `query` succeed again.
    pub fn clear_query_failure(&self, query: &ChannelListQuery) {
        self.inner().failing_queries.remove(&query.hash());
    }

    /// Cause the next `count` fetches of any query to fail.
    pub fn fail_next_fetches(&self, count: u32, error: &str) {
        self.inner().fail_next_fetches = Some((count, error.to_string()));
    }

    /// Every fetch request received, in order.
    pub fn fetch_requests(&self) -> Vec<ChannelListQuery> {
        self.inner().fetch_requests.clone()
    }

    /// Make `query_channel` return `payload` for its channel.
    pub fn set_channel(&self, payload: ChannelPayload) {
        self.inner()
            .channels
            .insert(payload.cid().clone(), payload);
    }

    /// Cause every `query_channel` for `cid` to fail.
    pub fn fail_channel(&self, cid: &ChannelId) {
        self.inner().failing_channels.insert(cid.clone());
    }

    /// Channels requested through `query_channel`, in order.
    pub fn channel_requests(&self) -> Vec<ChannelId> {
        self.inner().channel_requests.clone()
    }

    /// Channels hidden successfully, in order.
    pub fn hidden_channels(&self) -> Vec<ChannelId> {
        self.inner().hidden.clone()
    }

    /// Cause the next `hide_channel` to fail with the given error.
    pub fn fail_next_hide(&self, error: &str) {
        self.inner().fail_next_hide = Some(error.to_string());
    }

    /// Hold every fetch until [`resume_fetches`](Self::resume_fetches).
    pub fn pause_fetches(&self) {
        self.fetch_gate.send_replace(false);
    }

    /// Release held fetches.
    pub fn resume_fetches(&self) {
        self.fetch_gate.send_replace(true);
    }

    /// Hold every `query_channel` until [`resume_channels`](Self::resume_channels).
    pub fn pause_channels(&self) {
        self.channel_gate.send_replace(false);
    }

    /// Release held `query_channel` calls.
    pub fn resume_channels(&self) {
        self.channel_gate.send_replace(true);
    }

    /// Clear all state (pages, failures, captured requests).
    pub fn reset(&self) {
        *self.inner() = MockChannelApiInner::default();
        self.resume_fetches();
        self.resume_channels();
    }
}

impl Default for MockChannelApi {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockChannelApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            fetch_gate: Arc::clone(&self.fetch_gate),
            channel_gate: Arc::clone(&self.channel_gate),
        }
    }
}

async fn wait_open(gate: &watch::Sender<bool>) {
    let mut open = gate.subscribe();
    // The sender outlives this call, so the wait cannot fail.
    let _ = open.wait_for(|open| *open).await;
}

#[async_trait]
impl ChannelApi for MockChannelApi {
    async fn fetch_channels(
        &self,
        query: &ChannelListQuery,
    ) -> Result<ChannelListPayload, RemoteError> {
        self.inner().fetch_requests.push(query.clone());
        wait_open(&self.fetch_gate).await;

        let mut inner = self.inner();
        let hash = query.hash();

        // Check for forced failure
        if let Some((count, error)) = inner.fail_next_fetches.take() {
            if count > 1 {
                inner.fail_next_fetches = Some((count - 1, error.clone()));
            }
            if count > 0 {
                return Err(RemoteError::RequestFailed(error));
            }
        }
        if let Some(error) = inner.failing_queries.get(&hash) {
            return Err(RemoteError::RequestFailed(error.clone()));
        }

        if let Some(page) = inner
            .queued_pages
            .get_mut(&hash)
            .and_then(VecDeque::pop_front)
        {
            return Ok(page);
        }
        Ok(inner.pages.get(&hash).cloned().unwrap_or_default())
    }

    async fn hide_channel(&self, cid: &ChannelId) -> Result<(), RemoteError> {
        let mut inner = self.inner();

        if let Some(error) = inner.fail_next_hide.take() {
            return Err(RemoteError::RequestFailed(error));
        }

        inner.hidden.push(cid.clone());
        Ok(())
    }

    async fn query_channel(
        &self,
        cid: &ChannelId,
        message_limit: usize,
    ) -> Result<ChannelPayload, RemoteError> {
        self.inner().channel_requests.push(cid.clone());
        wait_open(&self.channel_gate).await;

        let inner = self.inner();
        if inner.failing_channels.contains(cid) {
            return Err(RemoteError::ChannelNotFound(cid.clone()));
        }

        let mut payload = inner
            .channels
            .get(cid)
            .cloned()
            .unwrap_or_else(|| ChannelPayload::new(ChannelDetail::new(cid.clone())));
        let skip = payload.messages.len().saturating_sub(message_limit);
        payload.messages.drain(..skip);
        Ok(payload)
    }
}
