//! Channel list presenter.
//!
//! One [`ChannelListPresenter`] per query. The list itself lives in a
//! single worker task that owns it exclusively; three producers feed that
//! task through channels:
//!
//! - commands from the handle (next page, reload, hide, shutdown)
//! - completions of spawned remote calls (page fetches, hides, first
//!   message loads of staged channels)
//! - the realtime event stream, already saved to the cache by the client
//!
//! A worker that falls behind the event stream reloads its list from the
//! first page. Every change to the list is published on a broadcast feed of
//! [`ViewChange`]s, each carrying the complete resulting list.

use std::sync::Arc;
use std::time::Duration;

use chatsync_core::{
    FetchAction, FetchEvent, FetchState, ItemList, PaginationCursor, RetryPolicy, StagedChannels,
    ViewChange,
};
use chatsync_types::{
    ChannelId, ChannelListQuery, ChannelPayload, EventPayload, EventType, Pagination, QueryHash,
    UserId,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use super::ChannelPresenter;
use crate::cache::{ChannelStore, LocalCache, QueryStore};
use crate::config::ClientConfig;
use crate::error::{ClientError, RemoteError};
use crate::executor::SerialExecutor;
use crate::reconciler::{EventReconciler, Reconciliation};
use crate::remote::{fetch_with_retry, ChannelApi};

/// Everything the list worker owns for one query.
#[derive(Debug)]
pub struct ListState {
    pub(crate) items: ItemList<ChannelPresenter>,
    pub(crate) cursor: PaginationCursor,
    pub(crate) fetch: FetchState,
    pub(crate) staged: StagedChannels<ChannelPresenter>,
    pub(crate) current_user: Option<UserId>,
}

impl ListState {
    /// Empty state with the cursor at the first page.
    pub fn new(page_size: usize, staging_timeout: Duration, current_user: Option<UserId>) -> Self {
        Self {
            items: ItemList::new(),
            cursor: PaginationCursor::new(page_size),
            fetch: FetchState::new(),
            staged: StagedChannels::new(staging_timeout),
            current_user,
        }
    }

    /// The list rows.
    pub fn items(&self) -> &ItemList<ChannelPresenter> {
        &self.items
    }

    /// The pagination cursor.
    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    /// The paging state.
    pub fn fetch_state(&self) -> &FetchState {
        &self.fetch
    }

    /// Channels waiting for their first messages.
    pub fn staged(&self) -> &StagedChannels<ChannelPresenter> {
        &self.staged
    }

    /// The authenticated user, if known.
    pub fn current_user(&self) -> Option<&UserId> {
        self.current_user.as_ref()
    }
}

enum Command {
    RequestNextPage,
    Reload,
    Hide {
        cid: ChannelId,
        reply: oneshot::Sender<Result<(), RemoteError>>,
    },
    Shutdown,
}

enum Completion {
    Fetched {
        first_page: bool,
        result: Result<Vec<ChannelPayload>, RemoteError>,
    },
    Hidden {
        cid: ChannelId,
        result: Result<(), RemoteError>,
        reply: oneshot::Sender<Result<(), RemoteError>>,
    },
    MessagesLoaded {
        cid: ChannelId,
        result: Result<ChannelPayload, RemoteError>,
    },
}

/// Handle to the presenter of one channel list query.
///
/// Dropping every handle stops the worker task.
#[derive(Debug, Clone)]
pub struct ChannelListPresenter {
    query: ChannelListQuery,
    commands: mpsc::UnboundedSender<Command>,
    changes: broadcast::Sender<ViewChange<ChannelPresenter>>,
}

impl ChannelListPresenter {
    /// Start the worker task for `query`.
    ///
    /// The query's window and message limit are taken from `config`. If
    /// the cache already links channels to the query, they are published
    /// as the first change, before any remote fetch. Must be called within
    /// a Tokio runtime.
    pub fn spawn<A>(
        query: ChannelListQuery,
        api: Arc<A>,
        cache: Arc<LocalCache>,
        events: broadcast::Receiver<EventPayload>,
        config: &ClientConfig,
    ) -> Self
    where
        A: ChannelApi + 'static,
    {
        let query = query
            .with_pagination(Pagination::first_page(config.page_size()))
            .with_message_limit(config.pagination.message_limit);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(config.feed.change_buffer.max(1));
        let (completions, completion_rx) = mpsc::unbounded_channel();

        let worker = ListWorker {
            hash: query.hash(),
            query: query.clone(),
            api,
            cache,
            loader: SerialExecutor::new("channel-loader"),
            retry: config.retry_policy(),
            state: ListState::new(config.page_size(), config.first_messages_timeout(), None),
            changes: changes.clone(),
            completions,
        };
        tokio::spawn(worker.run(command_rx, completion_rx, events));

        Self {
            query,
            commands,
            changes,
        }
    }

    /// The query this presenter lists.
    pub fn query(&self) -> &ChannelListQuery {
        &self.query
    }

    /// Subscribe to the change feed.
    ///
    /// Each subscription sees the changes published after it was made.
    pub fn changes(&self) -> broadcast::Receiver<ViewChange<ChannelPresenter>> {
        self.changes.subscribe()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::PresenterClosed)
    }

    /// Ask for the next page. Ignored while a fetch is in flight or after
    /// the last page.
    pub fn request_next_page(&self) -> Result<(), ClientError> {
        self.send(Command::RequestNextPage)
    }

    /// Rebuild the list from the first page.
    pub fn reload(&self) -> Result<(), ClientError> {
        self.send(Command::Reload)
    }

    /// Hide a channel remotely and, once that succeeds, drop its row.
    ///
    /// # Errors
    ///
    /// Returns the remote error if hiding failed; the row is kept then.
    pub async fn hide(&self, cid: &ChannelId) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Hide {
            cid: cid.clone(),
            reply,
        })?;
        response.await.map_err(|_| ClientError::PresenterClosed)??;
        Ok(())
    }

    /// Stop the worker task. In-flight requests complete into nothing.
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

struct ListWorker<A> {
    hash: QueryHash,
    query: ChannelListQuery,
    api: Arc<A>,
    cache: Arc<LocalCache>,
    loader: SerialExecutor,
    retry: RetryPolicy,
    state: ListState,
    changes: broadcast::Sender<ViewChange<ChannelPresenter>>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<A> ListWorker<A>
where
    A: ChannelApi + 'static,
{
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut events: broadcast::Receiver<EventPayload>,
    ) {
        self.start().await;
        let mut events_open = true;

        loop {
            let deadline = self.state.staged.next_deadline();
            let wake = deadline.map_or_else(Instant::now, Instant::from_std);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },

                Some(completion) = completions.recv() => self.on_completion(completion).await,

                event = events.recv(), if events_open => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("List {} skipped {} events, reloading", self.hash, skipped);
                        self.drive(FetchEvent::ReloadRequested);
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Event stream of list {} closed", self.hash);
                        events_open = false;
                    }
                },

                () = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    self.on_staging_deadline();
                }
            }
        }

        tracing::debug!("List presenter {} stopped", self.hash);
    }

    async fn start(&mut self) {
        let query = self.query.clone();
        if let Err(e) = self
            .cache
            .write(move |session| session.save_query(&query).map(|_| ()))
            .await
        {
            tracing::error!("Failed to store query {}: {}", self.hash, e);
        }

        let snapshot = self.cache.snapshot();
        self.state.current_user = snapshot.current_user().map(|user| user.user_id.clone());

        let cached: Vec<ChannelPresenter> = snapshot
            .linked_channels(&self.hash)
            .into_iter()
            .map(|record| {
                ChannelPresenter::from_record(record, &snapshot, self.state.current_user.clone())
            })
            .collect();
        if !cached.is_empty() {
            tracing::debug!("List {} starts with {} cached channels", self.hash, cached.len());
            let more_available = !self.state.cursor.is_exhausted();
            let change = self.state.items.apply_page(true, cached, more_available);
            self.emit(change);
        }
    }

    fn emit(&self, change: ViewChange<ChannelPresenter>) {
        if change.is_none() {
            return;
        }
        // No subscribers is fine; changes are not replayed.
        let _ = self.changes.send(change);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::RequestNextPage => self.drive(FetchEvent::NextPageRequested),
            Command::Reload => self.drive(FetchEvent::ReloadRequested),
            Command::Hide { cid, reply } => self.spawn_hide(cid, reply),
            Command::Shutdown => {}
        }
    }

    fn drive(&mut self, event: FetchEvent) {
        let (next, actions) = std::mem::take(&mut self.state.fetch).on_event(event);
        self.state.fetch = next;

        for action in actions {
            match action {
                FetchAction::Fetch { first_page } => self.spawn_fetch(first_page),
                FetchAction::EmitError { error } => self.emit(ViewChange::Error { message: error }),
            }
        }
    }

    fn spawn_fetch(&mut self, first_page: bool) {
        if first_page {
            self.state.cursor.reset();
        }

        let request = self.query.with_pagination(self.state.cursor.window());
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let retry = self.retry;
        let completions = self.completions.clone();

        tracing::debug!("List {} fetching {:?}", self.hash, request.pagination);
        tokio::spawn(async move {
            let result = fetch_with_retry(api.as_ref(), &request, retry)
                .await
                .map(|page| page.channels);
            if let Ok(channels) = &result {
                persist_page(&cache, &request, channels, first_page).await;
            }
            let _ = completions.send(Completion::Fetched { first_page, result });
        });
    }

    fn spawn_hide(&self, cid: ChannelId, reply: oneshot::Sender<Result<(), RemoteError>>) {
        let api = Arc::clone(&self.api);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let result = api.hide_channel(&cid).await;
            let _ = completions.send(Completion::Hidden { cid, result, reply });
        });
    }

    fn load_first_messages(&self, cid: ChannelId) {
        let api = Arc::clone(&self.api);
        let message_limit = self.query.message_limit;
        let completions = self.completions.clone();

        let queued = self.loader.spawn(async move {
            let result = api.query_channel(&cid, message_limit).await;
            let _ = completions.send(Completion::MessagesLoaded { cid, result });
        });
        if !queued {
            tracing::warn!("Loader {} is gone", self.loader.label());
        }
    }

    async fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { first_page, result } => self.on_fetched(first_page, result),
            Completion::Hidden { cid, result, reply } => {
                match &result {
                    Ok(()) => {
                        let change = self.state.items.remove(&cid);
                        if !change.is_none() {
                            self.state.cursor.on_item_removed();
                        }
                        self.state.staged.commit(&cid);
                        self.emit(change);
                    }
                    Err(e) => tracing::warn!("Failed to hide {}: {}", cid, e),
                }
                let _ = reply.send(result);
            }
            Completion::MessagesLoaded { cid, result } => {
                self.on_messages_loaded(cid, result).await
            }
        }
    }

    fn on_fetched(&mut self, first_page: bool, result: Result<Vec<ChannelPayload>, RemoteError>) {
        match result {
            Ok(channels) => {
                self.state.cursor.advance(channels.len());
                let exhausted = self.state.cursor.is_exhausted();

                let entries = channels
                    .iter()
                    .map(|payload| {
                        ChannelPresenter::from_payload(payload, self.state.current_user.clone())
                    })
                    .collect();
                let change = self.state.items.apply_page(first_page, entries, !exhausted);

                self.drive(FetchEvent::FetchSucceeded { exhausted });
                self.emit(change);
            }
            Err(e) => {
                tracing::warn!("List {} fetch failed: {}", self.hash, e);
                self.drive(FetchEvent::FetchFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn holds(&self, cid: &ChannelId) -> bool {
        self.state.staged.contains(cid) || self.state.items.position(cid).is_some()
    }

    async fn on_messages_loaded(
        &mut self,
        cid: ChannelId,
        result: Result<ChannelPayload, RemoteError>,
    ) {
        if !self.holds(&cid) {
            tracing::debug!("Dropping first messages of {}: no longer listed", cid);
            return;
        }
        if let Ok(payload) = &result {
            self.persist_channel(payload).await;
        }

        if let Some(entry) = self.state.staged.commit(&cid) {
            match &result {
                Ok(payload) => entry.load_first_messages(payload),
                Err(e) => tracing::warn!("First messages of {} failed: {}, inserting empty", cid, e),
            }
            self.insert_staged(entry);
            return;
        }

        // Inserted empty after its deadline; fill it in now.
        if let Ok(payload) = result {
            let change = self
                .state
                .items
                .update(&cid, payload.messages.clone(), |entry| {
                    entry.load_first_messages(&payload)
                });
            self.emit(change);
        }
    }

    fn insert_staged(&mut self, entry: ChannelPresenter) {
        let change = self.state.items.insert_front(entry);
        if !change.is_none() {
            self.state.cursor.on_item_inserted_locally();
        }
        self.emit(change);
    }

    fn on_staging_deadline(&mut self) {
        for entry in self.state.staged.expired(Instant::now().into_std()) {
            tracing::warn!("First messages of {} timed out, inserting empty", entry.cid());
            self.insert_staged(entry);
        }
    }

    async fn persist_channel(&self, payload: &ChannelPayload) {
        let query = &self.query;
        let stored = self
            .cache
            .write(|session| session.save_channel(payload, Some(query)).map(|_| ()))
            .await;
        if let Err(e) = stored {
            tracing::error!("Failed to cache channel {}: {}", payload.cid(), e);
        }
    }

    async fn on_event(&mut self, event: EventPayload) {
        let deleted = match (&event.kind, event.channel_id()) {
            (EventType::ChannelDeleted, Some(cid)) if self.holds(cid) => Some(cid.clone()),
            _ => None,
        };

        let now = Instant::now().into_std();
        match EventReconciler::apply(&mut self.state, &event, now) {
            Reconciliation::Change(change) => self.emit(change),
            Reconciliation::Staged(cid) => self.load_first_messages(cid),
        }

        // The first messages of this channel may have been cached after the
        // event was saved.
        if let Some(cid) = deleted {
            let unlinked = self
                .cache
                .write(|session| session.unlink_channel(&cid).map(|_| ()))
                .await;
            if let Err(e) = unlinked {
                tracing::error!("Failed to unlink deleted channel {}: {}", cid, e);
            }
        }
    }
}

async fn persist_page(
    cache: &LocalCache,
    query: &ChannelListQuery,
    channels: &[ChannelPayload],
    first_page: bool,
) {
    let hash = query.hash();
    let result = cache
        .write(|session| {
            if first_page {
                session.unlink_channels(&hash)?;
            }
            for payload in channels {
                session.save_channel(payload, Some(query))?;
            }
            Ok(())
        })
        .await;

    if let Err(e) = result {
        tracing::error!("Failed to cache page of list {}: {}", hash, e);
    }
}
