//! # chatsync-types
//!
//! Shared types for the chatsync channel list core.
//!
//! This crate provides the foundational types used across all chatsync crates:
//! - [`ChannelId`], [`UserId`], [`MessageId`], [`QueryHash`] - Identity types
//! - [`ChannelListQuery`], [`Pagination`] - What a paginated list asks for
//! - [`ChannelPayload`], [`MessagePayload`], ... - What the backend returns
//! - [`EventPayload`] - Realtime notifications
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod payloads;
mod query;

pub use error::TypesError;
pub use events::{EventPayload, EventType};
pub use ids::{AttachmentId, ChannelId, DeviceId, MessageId, QueryHash, UserId};
pub use payloads::{
    AttachmentPayload, ChannelDetail, ChannelListPayload, ChannelPayload, ChannelReadPayload,
    CurrentUserPayload, DevicePayload, MemberPayload, MessagePayload, ReactionPayload,
    UnreadCount, UserPayload,
};
pub use query::{ChannelListQuery, Filter, Pagination, SortDirection, Sorting};
