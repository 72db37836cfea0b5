//! # chatsync-core
//!
//! Pure logic for the chatsync channel list (no I/O, instant tests).
//!
//! This crate implements the paging state machine and the list algorithms
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`PaginationCursor`] tracks the next page window of a query
//! - [`ItemList`] owns presentation order and emits [`ViewChange`]s
//! - [`DiffConflictDetector`] decides incremental apply vs. full reload
//! - [`FetchState`] keeps at most one fetch in flight
//! - [`StagedChannels`] holds new channels until their messages load
//!
//! The actual I/O (remote fetches, cache writes, timers) is performed by
//! `chatsync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod diff;
pub mod list;
pub mod retry;
pub mod staging;
pub mod state;

pub use cursor::PaginationCursor;
pub use diff::{BatchPlan, Conflict, DiffConflictDetector, ListChange};
pub use list::{ItemList, ListEntry, ListItem, ViewChange};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use staging::StagedChannels;
pub use state::{FetchAction, FetchEvent, FetchState};
