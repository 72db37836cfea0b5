//! Error types for chatsync-client.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chatsync_types::{ChannelId, MessageId, QueryHash};
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for chatsync-client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Remote API error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Local cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Resync error.
    #[error("resync error: {0}")]
    Resync(#[from] ResyncError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The list presenter task has shut down.
    #[error("list presenter closed")]
    PresenterClosed,
}

/// Remote query API errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request could not be completed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The backend does not know the channel.
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// The request timed out.
    #[error("request timeout")]
    Timeout,
}

/// Local cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An operation needs the current user, but none is stored.
    #[error("no current user is stored")]
    MissingCurrentUser,

    /// The channel does not exist locally.
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// The message does not exist locally.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Snapshot file could not be read or written.
    #[error("failed to access snapshot {path}: {source}")]
    SnapshotIo {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    /// Snapshot file is corrupt.
    #[error("failed to decode snapshot {path}: {source}")]
    SnapshotDecode {
        /// Snapshot location.
        path: PathBuf,
        /// Underlying decode error.
        source: rmp_serde::decode::Error,
    },
}

/// Resync errors.
#[derive(Debug, Error)]
pub enum ResyncError {
    /// Some queries could not be refetched. Every other query was updated.
    #[error("failed to refetch {} channel list queries", failed.len())]
    QueriesRefetchFailed {
        /// Hashes of the failed queries.
        failed: BTreeSet<QueryHash>,
    },

    /// The reconciling write failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refetch_failure_counts_queries() {
        let failed: BTreeSet<_> = [QueryHash::digest(b"a"), QueryHash::digest(b"b")]
            .into_iter()
            .collect();
        let error = ResyncError::QueriesRefetchFailed { failed };
        assert_eq!(error.to_string(), "failed to refetch 2 channel list queries");
    }

    #[test]
    fn remote_error_converts_into_client_error() {
        let error: ClientError = RemoteError::Timeout.into();
        assert!(matches!(error, ClientError::Remote(RemoteError::Timeout)));
        assert_eq!(error.to_string(), "remote error: request timeout");
    }
}
