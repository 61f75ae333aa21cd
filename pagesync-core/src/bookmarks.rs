use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{DocumentId, SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: String,
    pub document: DocumentId,
    pub page: u32,
    pub added_on: NaiveDateTime,
    pub description: String,
    #[serde(default)]
    pub deleted_on: Option<NaiveDateTime>,
}

/// Body of an add-bookmark request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    pub page: u32,
    pub description: String,
}

impl NewBookmark {
    pub fn new(page: u32, description: impl Into<String>) -> SessionResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(SessionError::EmptyBookmarkDescription);
        }
        Ok(Self { page, description })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Page,
    AddedDate,
}

impl SortKey {
    fn compare(self, a: &BookmarkRecord, b: &BookmarkRecord) -> Ordering {
        match self {
            SortKey::Page => a.page.cmp(&b.page),
            SortKey::AddedDate => a.added_on.cmp(&b.added_on),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Returns the bookmarks ordered by `key`. Equal keys keep their input order
/// in both directions.
pub fn sort(bookmarks: &[BookmarkRecord], key: SortKey, order: SortOrder) -> Vec<BookmarkRecord> {
    let mut sorted = bookmarks.to_vec();
    sorted.sort_by(|a, b| order.apply(key.compare(a, b)));
    sorted
}

pub fn visible(bookmarks: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    bookmarks
        .iter()
        .filter(|b| b.deleted_on.is_none())
        .cloned()
        .collect()
}

/// The sort a bookmark list is shown in. Picking the active key again flips
/// the order; picking another key starts it ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSelection {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortSelection {
    pub fn select(&mut self, key: SortKey) {
        if self.key == key {
            self.order = self.order.flipped();
        } else {
            self.key = key;
            self.order = SortOrder::Ascending;
        }
    }

    pub fn apply(&self, bookmarks: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
        sort(&visible(bookmarks), self.key, self.order)
    }
}
