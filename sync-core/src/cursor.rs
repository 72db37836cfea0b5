//! Pagination cursor for channel list queries.
//!
//! The cursor tracks the offset/limit window of the next page request and
//! whether the list has been exhausted. It also compensates the offset for
//! items that were removed or inserted locally, so the next page neither
//! skips nor repeats a channel that shifted position.

use chatsync_types::Pagination;

/// Tracks the next page window of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    page_size: usize,
    offset: usize,
    limit: usize,
    exhausted: bool,
}

impl PaginationCursor {
    /// Create a cursor at the initial window `{offset: 0, limit: page_size}`.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            offset: 0,
            limit: page_size,
            exhausted: false,
        }
    }

    /// The configured page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offset of the next request.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Limit of the next request.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the last fetch returned fewer items than requested.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the next request is for the first page.
    pub fn is_initial(&self) -> bool {
        self.offset == 0 && self.limit == self.page_size
    }

    /// The window of the next request.
    pub fn window(&self) -> Pagination {
        Pagination {
            offset: self.offset,
            limit: self.limit,
        }
    }

    /// Record the number of items a fetch returned.
    ///
    /// A full page moves the window forward by `limit`. A short page marks
    /// the list exhausted and resets the window, so the next request starts
    /// over from the first page.
    pub fn advance(&mut self, returned: usize) {
        if returned >= self.limit {
            self.offset += self.limit;
            self.exhausted = false;
        } else {
            self.offset = 0;
            self.limit = self.page_size;
            self.exhausted = true;
        }
    }

    /// Compensate for an item removed from the loaded list.
    pub fn on_item_removed(&mut self) {
        if !self.is_initial() {
            self.offset = self.offset.saturating_sub(1);
        }
    }

    /// Compensate for an item inserted locally that the server has not
    /// accounted for in its ordering yet.
    pub fn on_item_inserted_locally(&mut self) {
        if !self.is_initial() {
            self.offset += 1;
        }
    }

    /// Go back to the initial window.
    pub fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }
}
