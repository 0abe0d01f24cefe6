//! Persistent URL storage.
//!
//! Holds the candidate destination URLs and the singleton selection record
//! that points at the active one.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored destination URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
}

/// A stored URL together with whether it is the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UrlListing {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub selected: bool,
}

/// The one selection record of a store.
///
/// There is no way to build a second record: the store hands these out and
/// its schema only admits the row with [`Selection::SINGLETON_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    id: i64,
    selected_url_id: Option<i64>,
}

impl Selection {
    pub const SINGLETON_ID: i64 = 0;

    pub(crate) fn singleton(selected_url_id: Option<i64>) -> Self {
        Self {
            id: Self::SINGLETON_ID,
            selected_url_id,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn selected_url_id(&self) -> Option<i64> {
        self.selected_url_id
    }
}

/// Input for a new URL row. Validation happens before it reaches the store.
#[derive(Debug, Clone)]
pub struct NewUrl {
    pub url: String,
    pub name: String,
}

#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Create the selection record if it does not exist yet. An existing
    /// selection is left as it is.
    async fn ensure_selection(&self) -> Result<Selection>;

    async fn list_urls(&self) -> Result<Vec<UrlListing>>;

    async fn insert_url(&self, url: NewUrl) -> Result<UrlRecord>;

    /// Remove a URL, clearing the selection in the same transaction when it
    /// pointed at the removed row. Unknown ids yield `NotFound`.
    async fn delete_url(&self, id: i64) -> Result<UrlRecord>;

    /// Point the selection at `id`. The id is not checked against `urls`.
    async fn select_url(&self, id: i64) -> Result<Selection>;

    /// The URL the selection points at, if any. A reference to a row that no
    /// longer exists reads as `None`.
    async fn selected_url(&self) -> Result<Option<UrlRecord>>;
}
