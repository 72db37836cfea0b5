//! Presentation state for channel lists.
//!
//! - [`ChannelPresenter`]: one row, a shared handle to a channel's state
//! - [`ChannelListPresenter`]: one query's list, owned by a single task
//!   that merges fetch completions, realtime events and staging deadlines
//!   into one feed of [`ViewChange`](chatsync_core::ViewChange)s

mod channel;
mod list;

pub use channel::ChannelPresenter;
pub use list::{ChannelListPresenter, ListState};
