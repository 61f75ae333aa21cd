use std::io::{self, Write};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::Attribute;
use pagesync_core::navigator::parse_page_input;
use pagesync_core::{Command, Direction, HighlightRun, SessionState, SortKey};
use tracing::debug;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    InvalidPageInput { input: String },
    ReportPageCount { pages: u32 },
    CycleDocument { delta: isize },
    RefreshDocuments,
    OpenBookmarks,
    CloseOverlay,
    ListMoveSelection { delta: isize },
    ListActivateSelection,
    DeleteSelectedBookmark,
    SortBookmarks(SortKey),
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    BeginBookmark,
    BookmarkSubmit { description: String },
    BookmarkCancel,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    List,
    Search,
    Bookmark,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_digits: String,
    mode: InputMode,
    text_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.pending_digits.clear();
            self.text_buffer.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::List => self.map_event_list(event),
            InputMode::Search | InputMode::Bookmark => self.map_event_text(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                self.pending_digits.push(c);
                UiEvent::None
            }
            (KeyCode::Backspace, _) => {
                self.pending_digits.pop();
                UiEvent::None
            }
            (KeyCode::Esc, _) => {
                self.pending_digits.clear();
                UiEvent::None
            }
            (KeyCode::Enter, _) => match self.take_page_number() {
                Some(Ok(page)) => UiEvent::Command(Command::GotoPage { page }),
                Some(Err(input)) => UiEvent::InvalidPageInput { input },
                None => UiEvent::None,
            },
            (KeyCode::Char('p'), KeyModifiers::NONE) => match self.take_page_number() {
                Some(Ok(pages)) => UiEvent::ReportPageCount { pages },
                Some(Err(input)) => UiEvent::InvalidPageInput { input },
                None => UiEvent::None,
            },
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::Right, KeyModifiers::NONE) => self.step(Direction::Forward),
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::Left, KeyModifiers::NONE) => self.step(Direction::Backward),
            (KeyCode::Char('r'), KeyModifiers::NONE) => {
                self.pending_digits.clear();
                UiEvent::Command(Command::JumpBack)
            }
            (KeyCode::Char('d'), _) => {
                self.pending_digits.clear();
                UiEvent::Command(Command::ToggleDualPane)
            }
            (KeyCode::Char('f'), _) => {
                self.pending_digits.clear();
                UiEvent::Command(Command::ToggleFitToHeight)
            }
            (KeyCode::Char('/'), _) => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            (KeyCode::Char('a'), _) => {
                self.set_mode(InputMode::Bookmark);
                UiEvent::BeginBookmark
            }
            (KeyCode::Char('b'), _) => {
                self.set_mode(InputMode::List);
                UiEvent::OpenBookmarks
            }
            (KeyCode::Char('['), _) => {
                self.pending_digits.clear();
                UiEvent::CycleDocument { delta: -1 }
            }
            (KeyCode::Char(']'), _) => {
                self.pending_digits.clear();
                UiEvent::CycleDocument { delta: 1 }
            }
            (KeyCode::Char('R'), _) => {
                self.pending_digits.clear();
                UiEvent::RefreshDocuments
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => {
                self.pending_digits.clear();
                UiEvent::None
            }
        }
    }

    fn map_event_list(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::CloseOverlay
            }
            (KeyCode::Enter, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::ListActivateSelection
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::ListMoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::ListMoveSelection { delta: -1 }
            }
            (KeyCode::Char('x'), _) => UiEvent::DeleteSelectedBookmark,
            (KeyCode::Char('s'), KeyModifiers::NONE) => UiEvent::SortBookmarks(SortKey::Page),
            (KeyCode::Char('S'), _) => UiEvent::SortBookmarks(SortKey::AddedDate),
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_event_text(&mut self, event: Event) -> UiEvent {
        let searching = matches!(self.mode, InputMode::Search);
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                if searching {
                    UiEvent::SearchCancel
                } else {
                    UiEvent::BookmarkCancel
                }
            }
            (KeyCode::Enter, _) => {
                let text = std::mem::take(&mut self.text_buffer);
                if searching {
                    self.set_mode(InputMode::List);
                    UiEvent::SearchSubmit { query: text }
                } else {
                    self.set_mode(InputMode::Normal);
                    UiEvent::BookmarkSubmit { description: text }
                }
            }
            (KeyCode::Backspace, _) => {
                self.text_buffer.pop();
                self.text_changed(searching)
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.text_buffer.push(c);
                self.text_changed(searching)
            }
            _ => UiEvent::None,
        }
    }

    fn text_changed(&self, searching: bool) -> UiEvent {
        if searching {
            UiEvent::SearchQueryChanged {
                query: self.text_buffer.clone(),
            }
        } else {
            UiEvent::None
        }
    }

    fn step(&mut self, direction: Direction) -> UiEvent {
        self.pending_digits.clear();
        UiEvent::Command(Command::StepPage { direction })
    }

    fn take_page_number(&mut self) -> Option<Result<u32, String>> {
        if self.pending_digits.is_empty() {
            return None;
        }
        let input = std::mem::take(&mut self.pending_digits);
        match parse_page_input(&input) {
            Ok(page) => Some(Ok(page)),
            Err(err) => {
                debug!(%err, "rejected page input");
                Some(Err(input))
            }
        }
    }

    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Search => Some(format!("/{}", self.text_buffer)),
            InputMode::Bookmark => Some(format!("bookmark: {}", self.text_buffer)),
            InputMode::Normal if !self.pending_digits.is_empty() => {
                Some(self.pending_digits.clone())
            }
            _ => None,
        }
    }
}

/// Renders highlight runs for the terminal, emphasized runs in bold.
pub fn format_runs(runs: &[HighlightRun]) -> String {
    let mut out = String::new();
    for run in runs {
        if run.emphasized {
            out.push_str(&format!(
                "{}{}{}",
                Attribute::Bold,
                run.text,
                Attribute::NormalIntensity
            ));
        } else {
            out.push_str(&run.text);
        }
    }
    out
}

pub fn format_status(state: &SessionState) -> String {
    let Some(document) = &state.selected_document else {
        return "no document selected".to_owned();
    };
    let total = if state.num_pages == 0 {
        "?".to_owned()
    } else {
        state.num_pages.to_string()
    };
    let mut status = format!("{}  page {}/{}", document.name, state.current_page, total);
    if state.dual_pane {
        status.push_str("  [dual]");
    }
    if state.fit_to_height {
        status.push_str("  [fit]");
    }
    status
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use pagesync_core::DocumentRef;

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_digits(mapper: &mut EventMapper, digits: &str) {
        for c in digits.chars() {
            assert!(matches!(
                mapper.map_event(key_event(KeyCode::Char(c))),
                UiEvent::None
            ));
        }
    }

    #[test]
    fn digits_then_enter_jump_to_page() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "42");
        assert_eq!(mapper.pending_input().as_deref(), Some("42"));

        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 42),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.pending_input(), None);
    }

    #[test]
    fn zero_or_leading_zero_page_is_rejected() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "0");
        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::InvalidPageInput { input } => assert_eq!(input, "0"),
            other => panic!("unexpected event: {:?}", other),
        }

        type_digits(&mut mapper, "012");
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::InvalidPageInput { .. }
        ));
    }

    #[test]
    fn enter_without_digits_does_nothing() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::None
        ));
    }

    #[test]
    fn backspace_edits_pending_page() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "129");
        mapper.map_event(key_event(KeyCode::Backspace));
        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::Command(Command::GotoPage { page }) => assert_eq!(page, 12),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn digits_then_p_report_page_count() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "250");
        match mapper.map_event(key_event(KeyCode::Char('p'))) {
            UiEvent::ReportPageCount { pages } => assert_eq!(pages, 250),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn arrows_step_pages_and_drop_pending_digits() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "7");
        match mapper.map_event(key_event(KeyCode::Down)) {
            UiEvent::Command(Command::StepPage { direction }) => {
                assert_eq!(direction, Direction::Forward)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.pending_input(), None);

        match mapper.map_event(key_event(KeyCode::Char('k'))) {
            UiEvent::Command(Command::StepPage { direction }) => {
                assert_eq!(direction, Direction::Backward)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn layout_keys_map_to_toggles() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('d'))),
            UiEvent::Command(Command::ToggleDualPane)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('f'))),
            UiEvent::Command(Command::ToggleFitToHeight)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('r'))),
            UiEvent::Command(Command::JumpBack)
        ));
    }

    #[test]
    fn slash_collects_search_query() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('/'))),
            UiEvent::BeginSearch
        ));
        assert_eq!(mapper.mode(), InputMode::Search);

        mapper.map_event(key_event(KeyCode::Char('f')));
        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Char('X'),
            KeyModifiers::SHIFT,
        )) {
            UiEvent::SearchQueryChanged { query } => assert_eq!(query, "fX"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.pending_input().as_deref(), Some("/fX"));

        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::SearchSubmit { query } => assert_eq!(query, "fX"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::List);
    }

    #[test]
    fn list_mode_ignores_digits() {
        let mut mapper = EventMapper::new();
        type_digits(&mut mapper, "3");
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('b'))),
            UiEvent::OpenBookmarks
        ));
        assert_eq!(mapper.mode(), InputMode::List);
        assert_eq!(mapper.pending_input(), None);

        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('5'))),
            UiEvent::None
        ));
        assert_eq!(mapper.pending_input(), None);
    }

    #[test]
    fn escape_cancels_search() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('/')));
        mapper.map_event(key_event(KeyCode::Char('z')));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Esc)),
            UiEvent::SearchCancel
        ));
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert_eq!(mapper.pending_input(), None);
    }

    #[test]
    fn bookmark_description_is_collected() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('a'))),
            UiEvent::BeginBookmark
        ));
        for c in "fig 2".chars() {
            mapper.map_event(key_event(KeyCode::Char(c)));
        }
        assert_eq!(mapper.pending_input().as_deref(), Some("bookmark: fig 2"));
        match mapper.map_event(key_event(KeyCode::Enter)) {
            UiEvent::BookmarkSubmit { description } => assert_eq!(description, "fig 2"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(mapper.mode(), InputMode::Normal);
    }

    #[test]
    fn list_mode_maps_navigation_and_sorting() {
        let mut mapper = EventMapper::new();
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('b'))),
            UiEvent::OpenBookmarks
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::ListMoveSelection { delta: 1 }
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Up)),
            UiEvent::ListMoveSelection { delta: -1 }
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('s'))),
            UiEvent::SortBookmarks(SortKey::Page)
        ));
        assert!(matches!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('S'),
                KeyModifiers::SHIFT
            )),
            UiEvent::SortBookmarks(SortKey::AddedDate)
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Char('x'))),
            UiEvent::DeleteSelectedBookmark
        ));
        assert!(matches!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::ListActivateSelection
        ));
        assert_eq!(mapper.mode(), InputMode::Normal);
    }

    #[test]
    fn formats_emphasized_runs_in_bold() {
        let rendered = format_runs(&[
            HighlightRun::plain("the "),
            HighlightRun::emphasized("quick"),
            HighlightRun::plain(" fox"),
        ]);
        assert!(rendered.starts_with("the "));
        assert!(rendered.contains("\u{1b}[1mquick\u{1b}[22m"));
        assert!(rendered.ends_with(" fox"));
    }

    #[test]
    fn status_shows_unknown_page_count() {
        let mut state = SessionState {
            selected_document: Some(DocumentRef::new("a", "Alpha", 4)),
            current_page: 4,
            previous_page: 4,
            num_pages: 0,
            dual_pane: true,
            fit_to_height: false,
        };
        assert_eq!(format_status(&state), "Alpha  page 4/?  [dual]");

        state.num_pages = 20;
        state.dual_pane = false;
        state.fit_to_height = true;
        assert_eq!(format_status(&state), "Alpha  page 4/20  [fit]");

        state.selected_document = None;
        assert_eq!(format_status(&state), "no document selected");
    }

    #[test]
    fn status_line_is_flushed() {
        let mut out = Vec::new();
        write_status_line(&mut out, "Alpha  page 1/3").unwrap();
        assert_eq!(out, b"Alpha  page 1/3");
    }
}
