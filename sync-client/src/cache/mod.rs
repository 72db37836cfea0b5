//! Local cache for chatsync.
//!
//! The cache is the sole mutation path into durable state. Writes go
//! through one serialized writer: each [`LocalCache::write`] runs its
//! closure against a private copy and publishes the result only if the
//! closure succeeds, so no reader ever observes a partial session. Reads
//! take a cheap snapshot and may run concurrently with a write.
//!
//! With a snapshot path, every committed session is written to disk as
//! MessagePack (temp file + rename).

mod records;
mod session;
mod state;

pub use records::{
    AttachmentRecord, ChannelRecord, CurrentUserRecord, DeviceRecord, MemberRecord,
    MessageRecord, QueryRecord, ReactionKey, ReactionRecord, ReadRecord, UserRecord,
};
pub use session::{
    AttachmentStore, ChannelStore, CurrentUserStore, MemberStore, MessageStore, QueryStore,
    ReadStore, Session, UserStore, WriteSession,
};
pub use state::CacheState;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::error::CacheError;

/// Transactional store for channels, messages, users and queries.
#[derive(Debug)]
pub struct LocalCache {
    writer: Mutex<()>,
    current: RwLock<Arc<CacheState>>,
    snapshot_path: Option<PathBuf>,
}

impl LocalCache {
    /// A cache that lives in memory only.
    pub fn in_memory() -> Self {
        Self::with_state(CacheState::default(), None)
    }

    /// Open a cache backed by a snapshot file, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();

        let state = match std::fs::read(&path) {
            Ok(bytes) => {
                rmp_serde::from_slice(&bytes).map_err(|e| CacheError::SnapshotDecode {
                    path: path.clone(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache snapshot at {}, starting empty", path.display());
                CacheState::default()
            }
            Err(e) => return Err(CacheError::SnapshotIo { path, source: e }),
        };

        Ok(Self::with_state(state, Some(path)))
    }

    fn with_state(state: CacheState, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(state)),
            snapshot_path,
        }
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<CacheState> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Run one atomic write session.
    ///
    /// Sessions are serialized. Either every change made by `f` is
    /// committed (and persisted) or none is.
    ///
    /// A session works on a full copy of the committed state, so each
    /// write costs time and memory in proportion to the whole cache, plus
    /// a full snapshot rewrite when a snapshot path is set. Group related
    /// changes into one session.
    pub async fn write<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&mut WriteSession<'_>) -> Result<R, CacheError> + Send,
        R: Send,
    {
        let _writer = self.writer.lock().await;

        let mut working = CacheState::clone(&self.snapshot());
        let result = f(&mut WriteSession::new(&mut working))?;

        if let Some(path) = &self.snapshot_path {
            persist(path, &working).await?;
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(working);
        Ok(result)
    }
}

async fn persist(path: &Path, state: &CacheState) -> Result<(), CacheError> {
    let bytes = rmp_serde::to_vec_named(state)?;
    let temp = path.with_extension("tmp");
    let io_error = |source| CacheError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&temp, &bytes).await.map_err(io_error)?;
    tokio::fs::rename(&temp, path).await.map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_types::{
        ChannelDetail, ChannelId, ChannelListQuery, ChannelPayload, Filter, MessagePayload,
        UserPayload,
    };

    fn payload(id: &str) -> ChannelPayload {
        let mut payload = ChannelPayload::new(ChannelDetail::new(ChannelId::new("messaging", id)));
        payload
            .messages
            .push(MessagePayload::new("m1", UserPayload::new("bob"), "hi", 7));
        payload
    }

    #[tokio::test]
    async fn committed_write_is_visible() {
        let cache = LocalCache::in_memory();

        let record = cache
            .write(|session| session.save_channel(&payload("a"), None))
            .await
            .unwrap();

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.channel(&record.cid), Some(&record));
        assert_eq!(snapshot.channel_messages(&record.cid).len(), 1);
    }

    #[tokio::test]
    async fn failed_session_commits_nothing() {
        let cache = LocalCache::in_memory();
        let cid = ChannelId::new("messaging", "a");

        let result = cache
            .write(|session| {
                session.save_channel_detail(&ChannelDetail::new(cid.clone()), None)?;
                session.save_message(
                    &MessagePayload::new("m1", UserPayload::new("bob"), "hi", 1),
                    &ChannelId::new("messaging", "ghost"),
                )
            })
            .await;

        assert!(matches!(result, Err(CacheError::ChannelNotFound(_))));
        assert!(cache.snapshot().channel(&cid).is_none());
    }

    #[tokio::test]
    async fn snapshot_held_by_reader_is_stable() {
        let cache = LocalCache::in_memory();
        let before = cache.snapshot();

        cache
            .write(|session| session.save_channel(&payload("a"), None))
            .await
            .unwrap();

        assert!(before.channel(&ChannelId::new("messaging", "a")).is_none());
        assert!(cache
            .snapshot()
            .channel(&ChannelId::new("messaging", "a"))
            .is_some());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.msgpack");
        let query = ChannelListQuery::new(Filter::none(), vec![], 25);

        {
            let cache = LocalCache::open(&path).unwrap();
            cache
                .write(|session| session.save_channel(&payload("a"), Some(&query)))
                .await
                .unwrap();
        }

        let reopened = LocalCache::open(&path).unwrap();
        let snapshot = reopened.snapshot();
        let linked = snapshot.linked_channels(&query.hash());
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].cid, ChannelId::new("messaging", "a"));
        assert_eq!(snapshot.channel_messages(&linked[0].cid)[0].text, "hi");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.msgpack");
        std::fs::write(&path, b"\xc1 not msgpack").unwrap();

        let err = LocalCache::open(&path).unwrap_err();
        assert!(matches!(err, CacheError::SnapshotDecode { .. }));
    }
}
