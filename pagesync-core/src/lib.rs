use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};

pub mod bookmarks;
pub mod config;
pub mod highlight;
pub mod navigator;
pub mod persist;
pub mod remote;
pub mod session;
pub mod store;

mod error;

pub use bookmarks::{BookmarkRecord, NewBookmark, SortKey, SortOrder, SortSelection};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use highlight::HighlightRun;
pub use navigator::{Direction, PageNavigator};
pub use persist::PagePersister;
pub use remote::{
    BookmarkService, DocumentLister, PageUpdater, SearchHit, SearchRequests, SearchService,
    SearchTicket,
};
pub use session::{Session, SessionOptions, SessionState};
pub use store::{FileLastDocumentStore, LastDocumentStore, MemoryLastDocumentStore};

pub type DocumentId = String;

/// A document as listed by the server. Only `current_page` is ever written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub name: String,
    #[serde(default = "first_page", deserialize_with = "deserialize_page")]
    pub current_page: u32,
}

impl DocumentRef {
    pub fn new(id: impl Into<DocumentId>, name: impl Into<String>, current_page: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            current_page: current_page.max(1),
        }
    }

    fn normalized(mut self) -> Self {
        self.current_page = self.current_page.max(1);
        self
    }
}

fn first_page() -> u32 {
    1
}

fn deserialize_page<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let page = Option::<u32>::deserialize(deserializer)?;
    Ok(page.unwrap_or(1).max(1))
}

#[derive(Debug, Clone)]
pub enum Command {
    StepPage { direction: Direction },
    GotoPage { page: u32 },
    JumpBack,
    ToggleDualPane,
    ToggleFitToHeight,
    SelectDocument { id: DocumentId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DocumentsRefreshed { count: usize },
    DocumentSelected(DocumentId),
    PageChanged { document: DocumentId, page: u32 },
    LayoutChanged,
    PagePersisted { document: DocumentId, page: u32 },
    PersistFailed {
        document: DocumentId,
        page: u32,
        reason: String,
    },
    LastDocumentStoreFailed { reason: String },
}

pub type EventLog = Arc<Mutex<Vec<SessionEvent>>>;
