//! Remote query API abstraction.
//!
//! The wire transport and authentication belong to the application; this
//! crate only needs request/response access to channel lists:
//! - `fetch_channels()` returns one page of a query
//! - `fetch_first_page()` returns the first page, whatever window the query holds
//! - `hide_channel()` hides a channel for the current user
//! - `query_channel()` returns one channel with its latest messages
//!
//! # Example
//!
//! ```ignore
//! let api = MockChannelApi::new();
//! api.set_page(&query, ChannelListPayload::new(channels));
//! let page = fetch_with_retry(&api, &query, RetryPolicy::default()).await?;
//! ```

mod mock;

pub use mock::MockChannelApi;

use async_trait::async_trait;
use chatsync_core::RetryPolicy;
use chatsync_types::{ChannelId, ChannelListPayload, ChannelListQuery, ChannelPayload, Pagination};

use crate::error::RemoteError;

/// Request/response access to the backend's channel queries.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Fetch the page of channels selected by the query's pagination window.
    async fn fetch_channels(
        &self,
        query: &ChannelListQuery,
    ) -> Result<ChannelListPayload, RemoteError>;

    /// Hide a channel for the current user.
    async fn hide_channel(&self, cid: &ChannelId) -> Result<(), RemoteError>;

    /// Fetch one channel with up to `message_limit` latest messages.
    async fn query_channel(
        &self,
        cid: &ChannelId,
        message_limit: usize,
    ) -> Result<ChannelPayload, RemoteError>;

    /// Fetch the first page of a query.
    async fn fetch_first_page(
        &self,
        query: &ChannelListQuery,
    ) -> Result<ChannelListPayload, RemoteError> {
        let first = query.with_pagination(Pagination::first_page(query.pagination.limit));
        self.fetch_channels(&first).await
    }
}

/// Fetch a page, retrying failures up to the policy's attempt bound.
pub async fn fetch_with_retry<A>(
    api: &A,
    query: &ChannelListQuery,
    policy: RetryPolicy,
) -> Result<ChannelListPayload, RemoteError>
where
    A: ChannelApi + ?Sized,
{
    let mut attempt = 1;
    loop {
        match api.fetch_channels(query).await {
            Ok(page) => return Ok(page),
            Err(e) if policy.should_retry(attempt) => {
                tracing::debug!(
                    "Fetch of {:?} failed (attempt {}/{}): {}",
                    query.hash(),
                    attempt,
                    policy.max_attempts(),
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_types::{ChannelDetail, Filter};

    fn query() -> ChannelListQuery {
        ChannelListQuery::new(Filter::none(), vec![], 10)
    }

    fn page(ids: &[&str]) -> ChannelListPayload {
        ChannelListPayload::new(
            ids.iter()
                .map(|id| ChannelPayload::new(ChannelDetail::new(ChannelId::new("messaging", *id))))
                .collect(),
        )
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let api = MockChannelApi::new();
        api.set_page(&query(), page(&["a"]));
        api.fail_next_fetches(2, "offline");

        let result = fetch_with_retry(&api, &query(), RetryPolicy::default()).await;

        assert_eq!(result.unwrap().channels.len(), 1);
        assert_eq!(api.fetch_requests().len(), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let api = MockChannelApi::new();
        api.fail_next_fetches(5, "offline");

        let result = fetch_with_retry(&api, &query(), RetryPolicy::default()).await;

        assert_eq!(
            result.unwrap_err(),
            RemoteError::RequestFailed("offline".into())
        );
        assert_eq!(api.fetch_requests().len(), 3);
    }

    #[tokio::test]
    async fn first_page_ignores_current_window() {
        let api = MockChannelApi::new();
        let later = query().with_pagination(Pagination {
            offset: 30,
            limit: 10,
        });

        api.fetch_first_page(&later).await.unwrap();

        let sent = api.fetch_requests();
        assert_eq!(sent[0].pagination, Pagination::first_page(10));
    }
}
