//! Two-phase insertion of channels that appeared through events.
//!
//! A channel the current user was just added to is staged first and only
//! committed into the list once its first page of messages is available.
//! Every staged channel carries a deadline; past it the caller inserts the
//! channel anyway in an empty state. A timeout too large to add to the
//! staging instant means no deadline at all.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chatsync_types::ChannelId;

use crate::list::ListEntry;

#[derive(Debug, Clone)]
struct Staged<T> {
    entry: T,
    deadline: Option<Instant>,
}

/// Channels waiting for their first message page.
#[derive(Debug, Clone)]
pub struct StagedChannels<T> {
    timeout: Duration,
    pending: HashMap<ChannelId, Staged<T>>,
}

impl<T: ListEntry> StagedChannels<T> {
    /// Create an empty stage whose entries expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: HashMap::new(),
        }
    }

    /// Stage an entry. Returns `false` if its channel is already staged.
    pub fn stage(&mut self, entry: T, now: Instant) -> bool {
        let cid = entry.cid().clone();
        if self.pending.contains_key(&cid) {
            return false;
        }

        self.pending.insert(
            cid,
            Staged {
                entry,
                deadline: now.checked_add(self.timeout),
            },
        );
        true
    }

    /// Take the staged entry of a channel for insertion.
    pub fn commit(&mut self, cid: &ChannelId) -> Option<T> {
        self.pending.remove(cid).map(|staged| staged.entry)
    }

    /// Take every entry whose deadline has passed, earliest first.
    pub fn expired(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<(Instant, ChannelId)> = self
            .pending
            .iter()
            .filter_map(|(cid, staged)| staged.deadline.map(|deadline| (deadline, cid)))
            .filter(|(deadline, _)| *deadline <= now)
            .map(|(deadline, cid)| (deadline, cid.clone()))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, cid)| self.commit(&cid))
            .collect()
    }

    /// The earliest deadline among staged entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().filter_map(|staged| staged.deadline).min()
    }

    /// Whether a channel is staged.
    pub fn contains(&self, cid: &ChannelId) -> bool {
        self.pending.contains_key(cid)
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every staged entry.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
