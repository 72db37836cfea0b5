//! # chatsync-client
//!
//! Async orchestration of the chatsync channel list.
//!
//! This is the crate applications use. It drives the pure logic from
//! `chatsync-core` with real I/O: remote page fetches, the realtime event
//! stream and the local cache.
//!
//! ## Features
//!
//! - **Local-first lists**: cached channels are shown before the network answers
//! - **Single-owner presenters**: each list is mutated by one task only
//! - **Transactional cache**: write sessions commit all or nothing
//! - **Resync**: stored queries are reconciled after a connectivity gap
//! - **API Abstraction**: pluggable remote API (real backend, mock)
//!
//! ## Example
//!
//! ```ignore
//! use chatsync_client::{ChatSyncClient, ClientConfig};
//!
//! let config = ClientConfig::from_file(Path::new("chatsync.toml"))?;
//! let client = ChatSyncClient::new(config, api)?;
//!
//! let list = client.channel_list(query);
//! let mut changes = list.changes();
//! list.request_next_page()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod presenter;
pub mod reconciler;
pub mod remote;
pub mod resync;

pub use cache::{CacheState, LocalCache, Session, WriteSession};
pub use client::ChatSyncClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{CacheError, ClientError, RemoteError, ResyncError};
pub use executor::SerialExecutor;
pub use presenter::{ChannelListPresenter, ChannelPresenter, ListState};
pub use reconciler::{EventReconciler, Reconciliation};
pub use remote::{fetch_with_retry, ChannelApi, MockChannelApi};
pub use resync::{ResyncReport, ResyncWorker};
