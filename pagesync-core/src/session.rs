use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::navigator::{Direction, PageNavigator};
use crate::persist::PagePersister;
use crate::remote::{DocumentLister, PageUpdater};
use crate::store::LastDocumentStore;
use crate::{
    Command, Config, DocumentId, DocumentRef, EventLog, SessionError, SessionEvent, SessionResult,
};

/// Snapshot of what the viewer shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub selected_document: Option<DocumentRef>,
    pub current_page: u32,
    pub previous_page: u32,
    /// 0 until the renderer reports the page count.
    pub num_pages: u32,
    pub dual_pane: bool,
    pub fit_to_height: bool,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub dual_pane: bool,
    pub fit_to_height: bool,
    pub persist_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dual_pane: false,
            fit_to_height: true,
            persist_debounce: Duration::ZERO,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            dual_pane: config.start_dual_pane,
            fit_to_height: config.fit_to_height,
            persist_debounce: config.persist_debounce,
        }
    }
}

pub struct Session {
    documents: Vec<DocumentRef>,
    selected: Option<DocumentRef>,
    navigator: PageNavigator,
    fit_to_height: bool,
    store: Arc<dyn LastDocumentStore>,
    persister: PagePersister,
    events: EventLog,
}

impl Session {
    pub fn new(
        store: Arc<dyn LastDocumentStore>,
        updater: Arc<dyn PageUpdater>,
        options: SessionOptions,
    ) -> Self {
        let events = EventLog::default();
        Self {
            documents: Vec::new(),
            selected: None,
            navigator: PageNavigator::new(options.dual_pane),
            fit_to_height: options.fit_to_height,
            store,
            persister: PagePersister::new(updater, options.persist_debounce, Arc::clone(&events)),
            events,
        }
    }

    pub fn events(&self) -> EventLog {
        Arc::clone(&self.events)
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn documents(&self) -> &[DocumentRef] {
        &self.documents
    }

    pub fn selected(&self) -> Option<&DocumentRef> {
        self.selected.as_ref()
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            selected_document: self.selected.clone(),
            current_page: self.navigator.current(),
            previous_page: self.navigator.previous(),
            num_pages: self.navigator.num_pages(),
            dual_pane: self.navigator.dual_pane(),
            fit_to_height: self.fit_to_height,
        }
    }

    /// Makes `id` the active document and restores its persisted page.
    /// Selecting the active document again re-applies the same restoration.
    #[instrument(skip(self))]
    pub fn select_document(&mut self, id: &str) -> SessionResult<SessionState> {
        let Some(document) = self.documents.iter().find(|d| d.id == id).cloned() else {
            warn!("document not found in list of known documents");
            return Err(SessionError::DocumentNotFound(id.to_owned()));
        };

        let reselected = self.selected.as_ref().is_some_and(|s| s.id == document.id);
        if !reselected {
            self.navigator.reset_num_pages();
        }
        self.navigator.restore(document.current_page);

        let id = document.id.clone();
        self.selected = Some(document);
        if let Err(err) = self.store.save(&id) {
            warn!("failed to remember last active document: {err:#}");
            self.events.lock().push(SessionEvent::LastDocumentStoreFailed {
                reason: format!("{err:#}"),
            });
        }
        self.events.lock().push(SessionEvent::DocumentSelected(id));
        Ok(self.state())
    }

    /// Replaces the cached document list and, when the remembered last
    /// document is part of it, restores that document and its page.
    ///
    /// If the remembered document is already active its page is only
    /// restored when the refreshed record carries a different page than the
    /// cached one, so local navigation survives a refresh.
    pub fn refresh_documents(&mut self, documents: Vec<DocumentRef>) {
        self.documents = documents.into_iter().map(DocumentRef::normalized).collect();
        info!(count = self.documents.len(), "document list refreshed");
        self.events.lock().push(SessionEvent::DocumentsRefreshed {
            count: self.documents.len(),
        });

        let mut unchanged_selection = None;
        if let Some(selected) = self.selected.as_mut() {
            if let Some(fresh) = self.documents.iter().find(|d| d.id == selected.id) {
                if fresh.current_page == selected.current_page {
                    unchanged_selection = Some(selected.id.clone());
                }
                *selected = fresh.clone();
            }
        }

        let last = match self.store.load() {
            Ok(last) => last,
            Err(err) => {
                warn!("failed to read last active document: {err:#}");
                self.events.lock().push(SessionEvent::LastDocumentStoreFailed {
                    reason: format!("{err:#}"),
                });
                None
            }
        };
        let Some(last) = last else {
            return;
        };
        if !self.documents.iter().any(|d| d.id == last) {
            warn!(document = %last, "last active document is missing from the document list");
            return;
        }
        if unchanged_selection.as_deref() == Some(last.as_str()) {
            debug!(document = %last, "active document record unchanged, keeping local page");
            return;
        }
        if let Err(err) = self.select_document(&last) {
            warn!("failed to restore last active document: {err}");
        }
    }

    /// Fetches the document list and reconciles the selection against it.
    /// On failure the cached list and the session are left as they were.
    #[instrument(skip_all)]
    pub async fn reload_documents<L>(&mut self, lister: &L) -> SessionResult<SessionState>
    where
        L: DocumentLister + ?Sized,
    {
        let documents = lister.list_documents().await?;
        self.refresh_documents(documents);
        Ok(self.state())
    }

    pub fn request_page(&mut self, target: u32) -> SessionResult<SessionState> {
        let document = self.active_document()?;
        let accepted = self.navigator.jump(target);
        Ok(self.finish_navigation(document, accepted))
    }

    pub fn step_page(&mut self, direction: Direction) -> SessionResult<SessionState> {
        let document = self.active_document()?;
        let accepted = self.navigator.step(direction);
        Ok(self.finish_navigation(document, accepted))
    }

    pub fn jump_back(&mut self) -> SessionResult<SessionState> {
        let document = self.active_document()?;
        let accepted = self.navigator.jump_back();
        Ok(self.finish_navigation(document, accepted))
    }

    pub fn toggle_dual_pane(&mut self) -> SessionState {
        self.navigator.toggle_dual_pane();
        self.events.lock().push(SessionEvent::LayoutChanged);
        self.state()
    }

    pub fn toggle_fit_to_height(&mut self) -> SessionState {
        self.fit_to_height = !self.fit_to_height;
        self.events.lock().push(SessionEvent::LayoutChanged);
        self.state()
    }

    /// Page count reported by the renderer for the active document.
    pub fn set_num_pages(&mut self, num_pages: u32) -> SessionState {
        if self.navigator.num_pages() != num_pages {
            debug!(num_pages, "renderer reported page count");
            self.navigator.set_num_pages(num_pages);
        }
        self.state()
    }

    pub fn apply(&mut self, command: Command) -> SessionResult<SessionState> {
        match command {
            Command::StepPage { direction } => self.step_page(direction),
            Command::GotoPage { page } => self.request_page(page),
            Command::JumpBack => self.jump_back(),
            Command::ToggleDualPane => Ok(self.toggle_dual_pane()),
            Command::ToggleFitToHeight => Ok(self.toggle_fit_to_height()),
            Command::SelectDocument { id } => self.select_document(&id),
        }
    }

    /// Waits for outstanding page writes.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    fn active_document(&self) -> SessionResult<DocumentId> {
        self.selected
            .as_ref()
            .map(|d| d.id.clone())
            .ok_or(SessionError::NoActiveDocument)
    }

    fn finish_navigation(&mut self, document: DocumentId, accepted: bool) -> SessionState {
        if accepted {
            let page = self.navigator.current();
            debug!(document = %document, page, "page changed");
            self.events.lock().push(SessionEvent::PageChanged {
                document: document.clone(),
                page,
            });
            self.persister.persist(&document, page);
        }
        self.state()
    }
}
