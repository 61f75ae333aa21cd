//! Contracts for the services the session talks to over the network.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BookmarkRecord, DocumentId, DocumentRef, NewBookmark};

#[async_trait]
pub trait DocumentLister: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>>;
}

#[async_trait]
pub trait PageUpdater: Send + Sync {
    async fn update_page(&self, document: &str, page: u32) -> Result<()>;
}

#[async_trait]
pub trait BookmarkService: Send + Sync {
    async fn list_bookmarks(&self, document: &str) -> Result<Vec<BookmarkRecord>>;
    async fn add_bookmark(&self, document: &str, bookmark: &NewBookmark) -> Result<BookmarkRecord>;
    async fn delete_bookmark(&self, document: &str, bookmark_id: &str) -> Result<()>;
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, document: &str, query: &str) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub page: u32,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Identifies one issued search so its response can be matched to the query
/// that is current when it arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    document: DocumentId,
    query: String,
}

impl SearchTicket {
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Generation counter for search requests. Only the latest ticket's response
/// is accepted; anything older is stale.
#[derive(Debug, Default)]
pub struct SearchRequests {
    generation: u64,
}

impl SearchRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, document: impl Into<DocumentId>, query: impl Into<String>) -> SearchTicket {
        self.generation += 1;
        SearchTicket {
            generation: self.generation,
            document: document.into(),
            query: query.into(),
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn accept<T>(&self, ticket: &SearchTicket, response: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(response)
        } else {
            tracing::debug!(query = ticket.query(), "dropping stale search response");
            None
        }
    }

    /// Invalidates every outstanding ticket.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_search_is_accepted() {
        let mut requests = SearchRequests::new();
        let first = requests.begin("doc", "rust");
        let second = requests.begin("doc", "rust lang");

        assert_eq!(requests.accept(&first, vec![1]), None);
        assert_eq!(requests.accept(&second, vec![2]), Some(vec![2]));
        assert_eq!(second.query(), "rust lang");
    }

    #[test]
    fn cancel_invalidates_outstanding_tickets() {
        let mut requests = SearchRequests::new();
        let ticket = requests.begin("doc", "query");
        requests.cancel();
        assert!(!requests.is_current(&ticket));
    }

    #[test]
    fn search_hit_snippet_is_optional() {
        let hits: Vec<SearchHit> = serde_json::from_str(
            r#"[{"score": 1.5, "page": 3, "snippet": "a <b>b</b>"}, {"score": 0.2, "page": 9}]"#,
        )
        .unwrap();
        assert_eq!(hits[0].snippet.as_deref(), Some("a <b>b</b>"));
        assert_eq!(hits[1].snippet, None);
    }
}
