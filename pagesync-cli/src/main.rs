use std::fs;
use std::future::Future;
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use pagesync_core::bookmarks::SortOrder;
use pagesync_core::highlight;
use pagesync_core::{
    config, BookmarkRecord, BookmarkService, Command, Config, DocumentId, DocumentLister,
    DocumentRef, FileLastDocumentStore, LastDocumentStore, NewBookmark, SearchHit,
    SearchRequests, SearchService, SearchTicket, Session, SessionEvent, SessionOptions, SortKey,
    SortSelection,
};
use pagesync_remote::HttpRemote;
use pagesync_tty::{format_runs, format_status, write_status_line, EventMapper, InputMode, UiEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "pagesync",
    version,
    about = "terminal front-end for a remote document reader"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Reader server base url, overrides the configuration
    #[arg(short = 's', long = "server")]
    server: Option<String>,

    /// Page count of the opened document
    #[arg(short = 'p', long = "pages")]
    pages: Option<u32>,

    /// Document id to open instead of the last active one
    #[arg(short = 'd', long = "document")]
    document: Option<String>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = config::project_dirs()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_path(&project_dirs));
    let mut config = Config::load(&config_path)?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }

    let _log_guard = init_logging(&project_dirs, &config.log_filter)?;
    info!(server = %config.server_url, "starting pagesync");

    let remote = Arc::new(HttpRemote::from_config(&config)?);
    let store: Arc<dyn LastDocumentStore> = Arc::new(FileLastDocumentStore::new(
        config::last_document_path(&project_dirs),
    )?);
    let session = Session::new(store, remote.clone(), SessionOptions::from(&config));
    let mut app = App::new(session, remote);

    if let Err(err) = app.session.reload_documents(app.remote.as_ref()).await {
        app.notify(format!("failed to fetch documents: {err:#}"));
    }
    if let Some(id) = &args.document {
        if let Err(err) = app.session.select_document(id) {
            app.notify(err.to_string());
        }
    }
    if let Some(pages) = args.pages {
        app.session.set_num_pages(pages);
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut event_mapper = EventMapper::new();
    let mut dirty = true;

    loop {
        if app.collect_background() {
            dirty = true;
        }

        if dirty {
            let pending = event_mapper.pending_input();
            app.redraw(&mut stdout, pending.as_deref())?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ui_event = event_mapper.map_event(event::read()?);
            match app.handle_event(ui_event, &mut event_mapper) {
                LoopAction::Continue => dirty = true,
                LoopAction::Quit => break,
            }
        }
    }

    crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    app.session.flush().await;
    Ok(())
}

enum LoopAction {
    Continue,
    Quit,
}

enum Overlay {
    None,
    Bookmarks {
        loading: bool,
        window: ListWindow<BookmarkRecord>,
    },
    SearchResults {
        query: String,
        loading: bool,
        results: ListWindow<SearchHit>,
    },
}

struct ListWindow<T> {
    entries: Vec<T>,
    selected: usize,
    scroll_offset: usize,
}

impl<T> ListWindow<T> {
    fn new(entries: Vec<T>) -> Self {
        Self {
            entries,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn selected_entry(&self) -> Option<&T> {
        self.entries.get(self.selected)
    }

    fn replace(&mut self, entries: Vec<T>) {
        self.entries = entries;
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }

    fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let len = self.entries.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        if self.scroll_offset > max_offset {
            self.scroll_offset = max_offset;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
            return;
        }
        let bottom = self.scroll_offset + viewport_height;
        if self.selected >= bottom {
            self.scroll_offset = self
                .selected
                .saturating_sub(viewport_height.saturating_sub(1));
        }
    }

    fn visible_rows(&self, viewport_height: usize) -> impl Iterator<Item = (bool, &T)> {
        self.entries
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(viewport_height)
            .map(move |(idx, entry)| (idx == self.selected, entry))
    }
}

/// Results of collaborator calls spawned off the input loop.
enum Background {
    Documents {
        generation: u64,
        switch_by: Option<isize>,
        response: Result<Vec<DocumentRef>>,
    },
    Bookmarks {
        document: DocumentId,
        response: Result<Vec<BookmarkRecord>>,
    },
    BookmarkAdded(Result<BookmarkRecord>),
    BookmarkDeleted {
        document: DocumentId,
        response: Result<()>,
    },
    Search(SearchTicket, Result<Vec<SearchHit>>),
}

struct App {
    session: Session,
    remote: Arc<HttpRemote>,
    overlay: Overlay,
    bookmarks: Vec<BookmarkRecord>,
    sort: SortSelection,
    searches: SearchRequests,
    documents_generation: u64,
    background_tx: UnboundedSender<Background>,
    background_rx: UnboundedReceiver<Background>,
    message: Option<String>,
}

impl App {
    fn new(session: Session, remote: Arc<HttpRemote>) -> Self {
        let (background_tx, background_rx) = mpsc::unbounded_channel();
        Self {
            session,
            remote,
            overlay: Overlay::None,
            bookmarks: Vec::new(),
            sort: SortSelection::default(),
            searches: SearchRequests::new(),
            documents_generation: 0,
            background_tx,
            background_rx,
            message: None,
        }
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Background> + Send + 'static,
    {
        let tx = self.background_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }

    /// Picks up finished collaborator calls and session events. Returns
    /// `true` when the screen needs a redraw.
    fn collect_background(&mut self) -> bool {
        let mut changed = false;

        while let Ok(message) = self.background_rx.try_recv() {
            changed |= self.apply_background(message);
        }

        for event in self.session.drain_events() {
            match event {
                SessionEvent::PersistFailed { page, reason, .. } => {
                    self.notify(format!("could not save page {page}: {reason}"));
                    changed = true;
                }
                SessionEvent::LastDocumentStoreFailed { reason } => {
                    self.notify(format!("could not remember document: {reason}"));
                    changed = true;
                }
                _ => {}
            }
        }

        changed
    }

    fn apply_background(&mut self, message: Background) -> bool {
        match message {
            Background::Documents {
                generation,
                switch_by,
                response,
            } => {
                if generation != self.documents_generation {
                    debug!(generation, "dropping superseded document list");
                    return false;
                }
                match response {
                    Ok(documents) => {
                        self.session.refresh_documents(documents);
                        match switch_by {
                            Some(delta) => self.switch_document(delta),
                            None => {
                                let count = self.session.documents().len();
                                self.notify(format!("{count} documents"));
                            }
                        }
                    }
                    Err(err) => {
                        warn!("failed to fetch documents: {err:#}");
                        self.notify(format!("failed to fetch documents: {err:#}"));
                        if let Some(delta) = switch_by {
                            self.switch_document(delta);
                        }
                    }
                }
            }
            Background::Bookmarks { document, response } => {
                if !self.is_active(&document) {
                    return false;
                }
                match response {
                    Ok(bookmarks) => {
                        self.bookmarks = bookmarks;
                        let sorted = self.sorted_bookmarks();
                        if let Overlay::Bookmarks { loading, window } = &mut self.overlay {
                            *loading = false;
                            window.replace(sorted);
                        }
                    }
                    Err(err) => {
                        warn!("failed to fetch bookmarks: {err:#}");
                        self.notify(format!("failed to fetch bookmarks: {err:#}"));
                        if let Overlay::Bookmarks { loading, .. } = &mut self.overlay {
                            *loading = false;
                        }
                    }
                }
            }
            Background::BookmarkAdded(response) => match response {
                Ok(created) => self.notify(format!("bookmarked page {}", created.page)),
                Err(err) => self.notify(format!("failed to add bookmark: {err:#}")),
            },
            Background::BookmarkDeleted { document, response } => match response {
                Ok(()) => {
                    if self.is_active(&document) && matches!(self.overlay, Overlay::Bookmarks { .. })
                    {
                        self.request_bookmarks(document);
                    }
                }
                Err(err) => self.notify(format!("failed to delete bookmark: {err:#}")),
            },
            Background::Search(ticket, response) => {
                let Some(response) = self.searches.accept(&ticket, response) else {
                    return false;
                };
                match response {
                    Ok(hits) => {
                        if let Overlay::SearchResults {
                            loading, results, ..
                        } = &mut self.overlay
                        {
                            *loading = false;
                            *results = ListWindow::new(hits);
                        }
                    }
                    Err(err) => {
                        warn!("search for {:?} failed: {err:#}", ticket.query());
                        self.notify(format!("search failed: {err:#}"));
                        if let Overlay::SearchResults { loading, .. } = &mut self.overlay {
                            *loading = false;
                        }
                    }
                }
            }
        }
        true
    }

    fn handle_event(&mut self, event: UiEvent, mapper: &mut EventMapper) -> LoopAction {
        match event {
            UiEvent::Command(command) => self.apply(command),
            UiEvent::InvalidPageInput { input } => {
                self.notify(format!("invalid page number {input:?}"));
            }
            UiEvent::ReportPageCount { pages } => {
                self.session.set_num_pages(pages);
            }
            UiEvent::CycleDocument { delta } => self.request_documents(Some(delta)),
            UiEvent::RefreshDocuments => {
                self.notify("refreshing documents…");
                self.request_documents(None);
            }
            UiEvent::OpenBookmarks => {
                let Some(document) = self.session.selected().map(|d| d.id.clone()) else {
                    self.notify("no active document");
                    mapper.set_mode(InputMode::Normal);
                    return LoopAction::Continue;
                };
                self.overlay = Overlay::Bookmarks {
                    loading: true,
                    window: ListWindow::new(self.sorted_bookmarks()),
                };
                self.request_bookmarks(document);
            }
            UiEvent::CloseOverlay => self.close_overlay(),
            UiEvent::ListMoveSelection { delta } => match &mut self.overlay {
                Overlay::Bookmarks { window, .. } => {
                    window.move_selection(delta);
                }
                Overlay::SearchResults { results, .. } => {
                    results.move_selection(delta);
                }
                Overlay::None => {}
            },
            UiEvent::ListActivateSelection => {
                let page = match &self.overlay {
                    Overlay::Bookmarks { window, .. } => window.selected_entry().map(|b| b.page),
                    Overlay::SearchResults { results, .. } => {
                        results.selected_entry().map(|hit| hit.page)
                    }
                    Overlay::None => None,
                };
                self.close_overlay();
                if let Some(page) = page {
                    self.apply(Command::GotoPage { page });
                }
            }
            UiEvent::DeleteSelectedBookmark => self.delete_selected_bookmark(),
            UiEvent::SortBookmarks(key) => self.sort_bookmarks(key),
            UiEvent::SearchSubmit { query } => self.start_search(query, mapper),
            UiEvent::SearchCancel => self.searches.cancel(),
            UiEvent::BeginBookmark => {
                if self.session.selected().is_none() {
                    self.notify("no active document");
                    mapper.set_mode(InputMode::Normal);
                }
            }
            UiEvent::BookmarkSubmit { description } => self.add_bookmark(description),
            UiEvent::Quit => return LoopAction::Quit,
            UiEvent::BeginSearch
            | UiEvent::SearchQueryChanged { .. }
            | UiEvent::BookmarkCancel
            | UiEvent::None => {}
        }
        LoopAction::Continue
    }

    fn apply(&mut self, command: Command) {
        if let Err(err) = self.session.apply(command) {
            self.notify(err.to_string());
        }
    }

    fn is_active(&self, document: &str) -> bool {
        self.session.selected().is_some_and(|d| d.id == document)
    }

    fn close_overlay(&mut self) {
        if matches!(self.overlay, Overlay::SearchResults { .. }) {
            self.searches.cancel();
        }
        self.overlay = Overlay::None;
    }

    /// Fetches the document list in the background. Only the newest request
    /// is applied; `switch_by` moves the selection once it arrives so the
    /// target document opens on its saved page.
    fn request_documents(&mut self, switch_by: Option<isize>) {
        self.documents_generation += 1;
        let generation = self.documents_generation;
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            Background::Documents {
                generation,
                switch_by,
                response: remote.list_documents().await,
            }
        });
    }

    fn switch_document(&mut self, delta: isize) {
        let documents = self.session.documents();
        if documents.is_empty() {
            self.notify("no documents available");
            return;
        }
        let len = documents.len() as isize;
        let next = match self.session.selected() {
            Some(selected) => documents
                .iter()
                .position(|d| d.id == selected.id)
                .map(|idx| (idx as isize + delta).rem_euclid(len))
                .unwrap_or(0),
            None => 0,
        };
        let id = documents[next as usize].id.clone();
        if self.is_active(&id) {
            return;
        }
        self.close_overlay();
        self.bookmarks.clear();
        self.apply(Command::SelectDocument { id });
    }

    fn request_bookmarks(&self, document: DocumentId) {
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let response = remote.list_bookmarks(&document).await;
            Background::Bookmarks { document, response }
        });
    }

    fn sorted_bookmarks(&self) -> Vec<BookmarkRecord> {
        self.sort.apply(&self.bookmarks)
    }

    fn sort_bookmarks(&mut self, key: SortKey) {
        if !matches!(self.overlay, Overlay::Bookmarks { .. }) {
            return;
        }
        self.sort.select(key);
        let sorted = self.sorted_bookmarks();
        if let Overlay::Bookmarks { window, .. } = &mut self.overlay {
            window.replace(sorted);
        }
    }

    fn delete_selected_bookmark(&mut self) {
        let Overlay::Bookmarks { window, .. } = &self.overlay else {
            return;
        };
        let Some(bookmark) = window.selected_entry().cloned() else {
            return;
        };
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let response = remote
                .delete_bookmark(&bookmark.document, &bookmark.id)
                .await;
            Background::BookmarkDeleted {
                document: bookmark.document,
                response,
            }
        });
    }

    fn add_bookmark(&mut self, description: String) {
        let state = self.session.state();
        let Some(document) = state.selected_document else {
            self.notify("no active document");
            return;
        };
        let bookmark = match NewBookmark::new(state.current_page, description) {
            Ok(bookmark) => bookmark,
            Err(err) => {
                self.notify(err.to_string());
                return;
            }
        };
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            Background::BookmarkAdded(remote.add_bookmark(&document.id, &bookmark).await)
        });
    }

    fn start_search(&mut self, query: String, mapper: &mut EventMapper) {
        let Some(document) = self.session.selected().map(|d| d.id.clone()) else {
            self.notify("no active document");
            mapper.set_mode(InputMode::Normal);
            return;
        };
        if query.trim().is_empty() {
            mapper.set_mode(InputMode::Normal);
            return;
        }

        let ticket = self.searches.begin(document, query.clone());
        self.overlay = Overlay::SearchResults {
            query,
            loading: true,
            results: ListWindow::new(Vec::new()),
        };

        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let response = remote.search(ticket.document(), ticket.query()).await;
            Background::Search(ticket, response)
        });
    }

    fn redraw(&mut self, stdout: &mut Stdout, pending_input: Option<&str>) -> Result<()> {
        let (cols, rows) = terminal::size()?;
        let width = cols as usize;
        crossterm::queue!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        let status = format_status(&self.session.state());
        write_status_line(stdout, &truncate(&status, width))?;

        let second_line = pending_input
            .map(str::to_owned)
            .or_else(|| self.message.clone())
            .unwrap_or_default();
        crossterm::queue!(stdout, cursor::MoveTo(0, 1), Print(truncate(&second_line, width)))?;

        let list_height = (rows as usize).saturating_sub(4);
        match &mut self.overlay {
            Overlay::None => {
                crossterm::queue!(
                    stdout,
                    cursor::MoveTo(0, 3),
                    Print("j/k step  <n>⏎ goto  <n>p pages  r back  d dual  f fit  / search  a add  b bookmarks  [ ] docs  q quit")
                )?;
            }
            Overlay::Bookmarks { loading, window } => {
                let arrow = match self.sort.order {
                    SortOrder::Ascending => "asc",
                    SortOrder::Descending => "desc",
                };
                let key = match self.sort.key {
                    SortKey::Page => "page",
                    SortKey::AddedDate => "date",
                };
                crossterm::queue!(
                    stdout,
                    cursor::MoveTo(0, 2),
                    Print(format!("bookmarks by {key} ({arrow})  s page  S date  x delete  esc close"))
                )?;
                if window.is_empty() {
                    let placeholder = if *loading { "loading…" } else { "no bookmarks" };
                    crossterm::queue!(stdout, cursor::MoveTo(0, 3), Print(placeholder))?;
                }
                window.ensure_visible(list_height);
                for (row, (selected, bookmark)) in window.visible_rows(list_height).enumerate() {
                    let line = format!(
                        "{} {:>5}  {}  {}",
                        if selected { ">" } else { " " },
                        bookmark.page,
                        bookmark.added_on.format("%Y-%m-%d %H:%M"),
                        bookmark.description
                    );
                    crossterm::queue!(
                        stdout,
                        cursor::MoveTo(0, 3 + row as u16),
                        Print(truncate(&line, width))
                    )?;
                }
            }
            Overlay::SearchResults {
                query,
                loading,
                results,
            } => {
                let header = if *loading {
                    format!("searching for {query:?}…")
                } else {
                    format!("{} results for {query:?}", results.entries.len())
                };
                crossterm::queue!(stdout, cursor::MoveTo(0, 2), Print(truncate(&header, width)))?;
                results.ensure_visible(list_height);
                for (row, (selected, hit)) in results.visible_rows(list_height).enumerate() {
                    let snippet = hit
                        .snippet
                        .as_deref()
                        .map(|s| format_runs(&highlight::parse(s)))
                        .unwrap_or_default();
                    let line = format!(
                        "{} {:>5}  {:.2}  {}",
                        if selected { ">" } else { " " },
                        hit.page,
                        hit.score,
                        snippet
                    );
                    crossterm::queue!(stdout, cursor::MoveTo(0, 3 + row as u16), Print(line))?;
                }
            }
        }

        stdout.flush()?;
        Ok(())
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_owned();
    }
    text.chars().take(width.saturating_sub(1)).chain(['…']).collect()
}

fn init_logging(project_dirs: &ProjectDirs, default_filter: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pagesync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
