//! Ordered item list and the view changes it emits.
//!
//! [`ItemList`] owns the presentation order of a channel list. Every
//! mutation returns a [`ViewChange`] carrying the complete resulting list,
//! so a consumer that drops a delta can still render the right state.
//!
//! Invariants:
//! - at most one [`ListItem::Loading`] sentinel, always the last element
//! - a channel id appears at most once

use chatsync_types::{ChannelId, MessagePayload};

/// An entry that can be placed in an [`ItemList`].
pub trait ListEntry: Clone {
    /// The channel this entry presents.
    fn cid(&self) -> &ChannelId;
}

/// One row of a channel list.
#[derive(Debug, Clone)]
pub enum ListItem<T> {
    /// A channel.
    Channel(T),
    /// More pages are available and loading.
    Loading,
}

impl<T> ListItem<T> {
    /// The channel entry, if this row is one.
    pub fn channel(&self) -> Option<&T> {
        match self {
            Self::Channel(entry) => Some(entry),
            Self::Loading => None,
        }
    }

    /// Whether this row is the loading sentinel.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// One unit of the output feed.
#[derive(Debug, Clone)]
pub enum ViewChange<T> {
    /// Nothing to render.
    None,
    /// Rows from `row` on were (re)loaded.
    Reloaded {
        /// First row with new content.
        row: usize,
        /// The complete list.
        items: Vec<ListItem<T>>,
    },
    /// A row was inserted.
    ItemInserted {
        /// Inserted row.
        row: usize,
        /// The complete list.
        items: Vec<ListItem<T>>,
    },
    /// A row was removed.
    ItemRemoved {
        /// Removed row.
        row: usize,
        /// The complete list.
        items: Vec<ListItem<T>>,
    },
    /// Rows changed in place.
    ItemUpdated {
        /// Changed rows.
        rows: Vec<usize>,
        /// Messages behind the change, if any.
        messages: Vec<MessagePayload>,
        /// The complete list.
        items: Vec<ListItem<T>>,
    },
    /// A row moved.
    ItemMoved {
        /// Row before the move.
        from: usize,
        /// Row after the move.
        to: usize,
        /// The complete list.
        items: Vec<ListItem<T>>,
    },
    /// A request failed; the list is unchanged.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl<T> ViewChange<T> {
    /// The complete list carried by this change, if any.
    pub fn items(&self) -> Option<&[ListItem<T>]> {
        match self {
            Self::Reloaded { items, .. }
            | Self::ItemInserted { items, .. }
            | Self::ItemRemoved { items, .. }
            | Self::ItemUpdated { items, .. }
            | Self::ItemMoved { items, .. } => Some(items),
            Self::None | Self::Error { .. } => None,
        }
    }

    /// Whether this is the empty change.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The ordered rows of one channel list.
#[derive(Debug, Clone)]
pub struct ItemList<T> {
    items: Vec<ListItem<T>>,
}

impl<T: ListEntry> ItemList<T> {
    /// An empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// All rows, sentinel included.
    pub fn items(&self) -> &[ListItem<T>] {
        &self.items
    }

    /// Number of rows, sentinel included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no rows at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the last row is the loading sentinel.
    pub fn has_loading_sentinel(&self) -> bool {
        self.items.last().is_some_and(ListItem::is_loading)
    }

    /// Row of the channel with the given id.
    pub fn position(&self, cid: &ChannelId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.channel().is_some_and(|entry| entry.cid() == cid))
    }

    /// The channel entry at `row`.
    pub fn get(&self, row: usize) -> Option<&T> {
        self.items.get(row).and_then(ListItem::channel)
    }

    /// The channel entry with the given id.
    pub fn find(&self, cid: &ChannelId) -> Option<&T> {
        self.position(cid).and_then(|row| self.get(row))
    }

    /// Channel entries in order.
    pub fn channels(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(ListItem::channel)
    }

    fn snapshot(&self) -> Vec<ListItem<T>> {
        self.items.clone()
    }

    fn strip_sentinel(&mut self) {
        if self.has_loading_sentinel() {
            self.items.pop();
        }
    }

    /// Append a fetched page.
    ///
    /// A first page replaces the whole list. Entries already present are
    /// skipped. A sentinel is appended when more pages are available.
    pub fn apply_page(
        &mut self,
        first_page: bool,
        entries: Vec<T>,
        more_available: bool,
    ) -> ViewChange<T> {
        if first_page {
            self.items.clear();
        }
        self.strip_sentinel();

        let row = self.items.len();
        for entry in entries {
            if self.position(entry.cid()).is_none() {
                self.items.push(ListItem::Channel(entry));
            }
        }
        if more_available {
            self.items.push(ListItem::Loading);
        }

        ViewChange::Reloaded {
            row,
            items: self.snapshot(),
        }
    }

    /// Remove the channel with the given id.
    pub fn remove(&mut self, cid: &ChannelId) -> ViewChange<T> {
        match self.position(cid) {
            Some(row) => {
                self.items.remove(row);
                ViewChange::ItemRemoved {
                    row,
                    items: self.snapshot(),
                }
            }
            None => ViewChange::None,
        }
    }

    /// Move the channel with the given id to row 0, letting `touch` update
    /// the entry on the way.
    pub fn move_to_front(&mut self, cid: &ChannelId, touch: impl FnOnce(&T)) -> ViewChange<T> {
        let Some(from) = self.position(cid) else {
            return ViewChange::None;
        };

        let item = self.items.remove(from);
        if let ListItem::Channel(entry) = &item {
            touch(entry);
        }
        self.items.insert(0, item);

        ViewChange::ItemMoved {
            from,
            to: 0,
            items: self.snapshot(),
        }
    }

    /// Insert an entry at row 0 unless its channel is already listed.
    pub fn insert_front(&mut self, entry: T) -> ViewChange<T> {
        if self.position(entry.cid()).is_some() {
            return ViewChange::None;
        }

        self.items.insert(0, ListItem::Channel(entry));
        ViewChange::ItemInserted {
            row: 0,
            items: self.snapshot(),
        }
    }

    /// Update the channel with the given id in place.
    pub fn update(
        &mut self,
        cid: &ChannelId,
        messages: Vec<MessagePayload>,
        touch: impl FnOnce(&T),
    ) -> ViewChange<T> {
        let Some(row) = self.position(cid) else {
            return ViewChange::None;
        };

        if let Some(entry) = self.get(row) {
            touch(entry);
        }

        ViewChange::ItemUpdated {
            rows: vec![row],
            messages,
            items: self.snapshot(),
        }
    }
}

impl<T: ListEntry> Default for ItemList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry(ChannelId);

    impl ListEntry for Entry {
        fn cid(&self) -> &ChannelId {
            &self.0
        }
    }

    fn entry(id: &str) -> Entry {
        Entry(ChannelId::new("messaging", id))
    }

    fn cid(id: &str) -> ChannelId {
        ChannelId::new("messaging", id)
    }

    fn ids(list: &ItemList<Entry>) -> Vec<String> {
        list.items()
            .iter()
            .map(|item| match item {
                ListItem::Channel(e) => e.0.id().to_string(),
                ListItem::Loading => "…".to_string(),
            })
            .collect()
    }

    fn page(range: std::ops::Range<usize>) -> Vec<Entry> {
        range.map(|i| entry(&format!("c{}", i))).collect()
    }

    #[test]
    fn first_page_with_more_adds_sentinel() {
        let mut list = ItemList::new();
        let change = list.apply_page(true, page(0..3), true);

        assert_eq!(ids(&list), vec!["c0", "c1", "c2", "…"]);
        assert!(matches!(change, ViewChange::Reloaded { row: 0, .. }));
        assert!(list.has_loading_sentinel());
    }

    #[test]
    fn next_page_replaces_sentinel_and_reports_insertion_row() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..3), true);
        let change = list.apply_page(false, page(3..5), false);

        assert_eq!(ids(&list), vec!["c0", "c1", "c2", "c3", "c4"]);
        assert!(matches!(change, ViewChange::Reloaded { row: 3, .. }));
        assert!(!list.has_loading_sentinel());
    }

    #[test]
    fn first_page_replaces_existing_rows() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..3), true);
        list.apply_page(true, page(7..8), false);
        assert_eq!(ids(&list), vec!["c7"]);
    }

    #[test]
    fn duplicate_entries_in_next_page_are_skipped() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..2), true);
        list.apply_page(false, page(1..3), false);
        assert_eq!(ids(&list), vec!["c0", "c1", "c2"]);
    }

    #[test]
    fn remove_reports_row() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..3), true);
        let change = list.remove(&cid("c1"));

        assert!(matches!(change, ViewChange::ItemRemoved { row: 1, .. }));
        assert_eq!(ids(&list), vec!["c0", "c2", "…"]);
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut list: ItemList<Entry> = ItemList::new();
        assert!(list.remove(&cid("ghost")).is_none());
    }

    #[test]
    fn move_to_front_touches_entry() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..4), true);
        let touched = Cell::new(false);

        let change = list.move_to_front(&cid("c2"), |_| touched.set(true));

        assert!(touched.get());
        assert!(matches!(change, ViewChange::ItemMoved { from: 2, to: 0, .. }));
        assert_eq!(ids(&list), vec!["c2", "c0", "c1", "c3", "…"]);
    }

    #[test]
    fn insert_front_keeps_sentinel_last() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..1), true);
        let change = list.insert_front(entry("new"));

        assert!(matches!(change, ViewChange::ItemInserted { row: 0, .. }));
        assert_eq!(ids(&list), vec!["new", "c0", "…"]);
    }

    #[test]
    fn insert_front_of_listed_channel_is_none() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..2), false);
        assert!(list.insert_front(entry("c1")).is_none());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn update_reports_row_and_messages() {
        let mut list = ItemList::new();
        list.apply_page(true, page(0..3), false);

        let change = list.update(&cid("c2"), vec![], |_| {});
        match change {
            ViewChange::ItemUpdated { rows, messages, items } => {
                assert_eq!(rows, vec![2]);
                assert!(messages.is_empty());
                assert_eq!(items.len(), 3);
            }
            other => panic!("expected ItemUpdated, got {:?}", other),
        }
    }

    #[test]
    fn every_change_carries_full_list() {
        let mut list = ItemList::new();
        let change = list.apply_page(true, page(0..2), true);
        assert_eq!(change.items().map(<[_]>::len), Some(3));

        let none: ViewChange<Entry> = ViewChange::None;
        assert!(none.items().is_none());
    }
}
