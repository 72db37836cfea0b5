//! Reconciliation of cached queries after a connectivity gap.
//!
//! The worker refetches the first page of every stored query with bounded
//! concurrency, waits for all of them, then rewrites the query links in
//! one cache session:
//!
//! 1. Channels linked to a query that are not both in its fresh first page
//!    and in the caller's already-synced set lose their local data (the
//!    record itself is kept).
//! 2. The query is unlinked from everything and relinked to exactly the
//!    channels of its first page.
//!
//! A query that fails to refetch keeps its links; a query deleted while
//! the fetches were running is skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chatsync_types::{ChannelId, ChannelListPayload, ChannelListQuery, QueryHash};
use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::{ChannelStore, LocalCache, QueryStore};
use crate::error::{CacheError, RemoteError, ResyncError};
use crate::remote::ChannelApi;

type FirstPages = BTreeMap<QueryHash, Result<ChannelListPayload, RemoteError>>;

/// Outcome of one resync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Channels each refreshed query is now linked to.
    pub relinked: BTreeMap<QueryHash, BTreeSet<ChannelId>>,
    /// Channels whose local data was reset.
    pub reset: BTreeSet<ChannelId>,
    /// Queries deleted before the write ran.
    pub skipped: BTreeSet<QueryHash>,
    /// Queries whose first page could not be fetched.
    pub failed: BTreeSet<QueryHash>,
}

/// Refreshes every stored channel list query.
#[derive(Debug)]
pub struct ResyncWorker<A> {
    id: Uuid,
    api: Arc<A>,
    cache: Arc<LocalCache>,
    max_concurrent: usize,
}

impl<A: ChannelApi> ResyncWorker<A> {
    /// Create a worker running at most `max_concurrent` fetches at once.
    pub fn new(api: Arc<A>, cache: Arc<LocalCache>, max_concurrent: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            api,
            cache,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Unique id of this worker, used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run a resync pass.
    ///
    /// `synced` names channels already known to be fresh, e.g. updated
    /// over the realtime connection during the gap.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::QueriesRefetchFailed`] naming every query
    /// that could not be refetched; all other queries are updated anyway.
    pub async fn resync(&self, synced: &BTreeSet<ChannelId>) -> Result<(), ResyncError> {
        let report = self.resync_detailed(synced).await?;
        if report.failed.is_empty() {
            Ok(())
        } else {
            Err(ResyncError::QueriesRefetchFailed {
                failed: report.failed,
            })
        }
    }

    /// Run a resync pass and report what it did.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reconciling write fails.
    pub async fn resync_detailed(
        &self,
        synced: &BTreeSet<ChannelId>,
    ) -> Result<ResyncReport, CacheError> {
        let queries: Vec<ChannelListQuery> = self
            .cache
            .snapshot()
            .queries()
            .map(|record| record.query.clone())
            .collect();
        tracing::debug!(
            "Resync {} refreshing {} queries ({} channels synced)",
            self.id,
            queries.len(),
            synced.len()
        );

        let pages = self.fetch_first_pages(queries).await;
        let report = self
            .cache
            .write(|session| {
                let mut report = ResyncReport::default();

                for (hash, result) in &pages {
                    let Some(record) = session.channel_list_query(hash) else {
                        tracing::debug!("Query {} no longer exists", hash);
                        report.skipped.insert(hash.clone());
                        continue;
                    };

                    let page = match result {
                        Ok(page) => page,
                        Err(e) => {
                            tracing::error!("Failed to refetch query {}: {}", hash, e);
                            report.failed.insert(hash.clone());
                            continue;
                        }
                    };

                    let fresh: BTreeSet<&ChannelId> = page
                        .channels
                        .iter()
                        .map(|payload| payload.cid())
                        .filter(|cid| synced.contains(*cid))
                        .collect();
                    for cid in &record.channels {
                        if fresh.contains(cid) || session.channel(cid).is_none() {
                            continue;
                        }
                        session.reset_channel(cid)?;
                        report.reset.insert(cid.clone());
                    }

                    session.unlink_channels(hash)?;
                    let mut relinked = BTreeSet::new();
                    for payload in &page.channels {
                        match session.save_channel(payload, Some(&record.query)) {
                            Ok(channel) => {
                                relinked.insert(channel.cid);
                            }
                            Err(e) => tracing::warn!(
                                "Failed to relink {} to query {}: {}",
                                payload.cid(),
                                hash,
                                e
                            ),
                        }
                    }
                    report.relinked.insert(hash.clone(), relinked);
                }

                Ok(report)
            })
            .await?;

        tracing::debug!(
            "Resync {} done: {} relinked, {} reset, {} failed",
            self.id,
            report.relinked.len(),
            report.reset.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn fetch_first_pages(&self, queries: Vec<ChannelListQuery>) -> FirstPages {
        let pages = Mutex::new(FirstPages::new());

        stream::iter(queries)
            .for_each_concurrent(self.max_concurrent, |query| {
                let pages = &pages;
                async move {
                    let result = self.api.fetch_first_page(&query).await;
                    pages.lock().await.insert(query.hash(), result);
                }
            })
            .await;

        pages.into_inner()
    }
}
