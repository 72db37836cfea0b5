//! Channel list queries.
//!
//! A query is an opaque filter expression plus a sort specification and the
//! pagination window for the next request. The filter language itself
//! belongs to the backend; chatsync only needs a stable identity for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{QueryHash, TypesError};

/// Opaque filter expression, e.g. `{"members": {"$in": ["alice"]}}`.
///
/// Object keys are kept sorted, so two filters with the same content
/// always render the same canonical JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Value);

impl Filter {
    /// A filter that matches every channel.
    pub fn none() -> Self {
        Self(Value::Object(Default::default()))
    }

    /// Wrap a JSON filter expression.
    pub fn new(expr: Value) -> Self {
        Self(expr)
    }

    /// The raw expression.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::none()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sorting {
    /// Field name understood by the backend.
    pub key: String,
    /// Direction.
    pub direction: SortDirection,
}

impl Sorting {
    /// Sort descending by `key`.
    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Sort ascending by `key`.
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// The offset/limit window of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of items to skip.
    pub offset: usize,
    /// Maximum number of items to return.
    pub limit: usize,
}

impl Pagination {
    /// The first page of `page_size` items.
    pub fn first_page(page_size: usize) -> Self {
        Self {
            offset: 0,
            limit: page_size,
        }
    }
}

/// A filter + sort specification for one paginated channel list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelListQuery {
    /// Which channels belong to the list.
    pub filter: Filter,
    /// How they are ordered. Empty means most recent message first.
    #[serde(default)]
    pub sort: Vec<Sorting>,
    /// Window for the next request.
    pub pagination: Pagination,
    /// How many messages to include per channel.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

fn default_message_limit() -> usize {
    25
}

#[derive(Serialize)]
struct CanonicalQuery<'a> {
    filter: &'a Filter,
    sort: &'a [Sorting],
}

impl ChannelListQuery {
    /// Create a query for the first page of `page_size` channels.
    pub fn new(filter: Filter, sort: Vec<Sorting>, page_size: usize) -> Self {
        Self {
            filter,
            sort,
            pagination: Pagination::first_page(page_size),
            message_limit: default_message_limit(),
        }
    }

    /// Set how many messages each returned channel carries.
    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.message_limit = limit;
        self
    }

    /// Copy of this query requesting a different window.
    pub fn with_pagination(&self, pagination: Pagination) -> Self {
        Self {
            pagination,
            ..self.clone()
        }
    }

    /// Render the filter and sort as canonical JSON.
    ///
    /// Pagination and message limit are excluded: they do not change which
    /// channels the list contains.
    pub fn canonical(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(&CanonicalQuery {
            filter: &self.filter,
            sort: &self.sort,
        })
        .map_err(TypesError::QuerySerialization)
    }

    /// Stable hash identifying this query in storage.
    pub fn hash(&self) -> QueryHash {
        // Serializing a JSON value and plain structs cannot fail.
        let canonical = self.canonical().unwrap_or_default();
        QueryHash::digest(&canonical)
    }
}
