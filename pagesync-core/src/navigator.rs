//! Page arithmetic for single and dual-pane layouts.
//!
//! Pages are 1-based. A page count of 0 means the renderer has not reported
//! the document length yet, and every navigation request is a no-op until it
//! does.

use serde::{Deserialize, Serialize};

use crate::{SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// Pages advanced by a single step. A dual-pane spread moves as a unit.
pub const fn stride(dual_pane: bool) -> u32 {
    if dual_pane {
        2
    } else {
        1
    }
}

pub fn step(current: u32, direction: Direction, num_pages: u32, dual_pane: bool) -> u32 {
    if num_pages == 0 {
        return current;
    }
    let stride = stride(dual_pane);
    let next = match direction {
        Direction::Forward => current.checked_add(stride),
        Direction::Backward => current.checked_sub(stride),
    };
    match next {
        Some(page) if (1..=num_pages).contains(&page) => page,
        _ => current,
    }
}

/// Resolves a manual jump. In dual-pane mode a request for a page adjacent to
/// `current` turns into a one-spread step so the left page keeps its parity.
pub fn jump_to(current: u32, requested: u32, num_pages: u32, dual_pane: bool) -> u32 {
    if num_pages == 0 {
        return current;
    }
    if dual_pane && current.abs_diff(requested) == 1 {
        let direction = if requested > current {
            Direction::Forward
        } else {
            Direction::Backward
        };
        return step(current, direction, num_pages, true);
    }
    requested.clamp(1, num_pages)
}

/// Layout changes never move the current page; the renderer shows it as the
/// left page of the spread.
pub fn toggle_dual_pane(current: u32) -> u32 {
    current
}

/// Validates manual page entry. Accepts a positive decimal integer without
/// leading zeros.
pub fn parse_page_input(text: &str) -> SessionResult<u32> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let well_formed =
        matches!(chars.next(), Some('1'..='9')) && chars.all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(SessionError::MalformedInput(text.to_owned()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| SessionError::MalformedInput(text.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNavigator {
    current: u32,
    previous: u32,
    num_pages: u32,
    dual_pane: bool,
}

impl Default for PageNavigator {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PageNavigator {
    pub fn new(dual_pane: bool) -> Self {
        Self {
            current: 1,
            previous: 1,
            num_pages: 0,
            dual_pane,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn previous(&self) -> u32 {
        self.previous
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn dual_pane(&self) -> bool {
        self.dual_pane
    }

    /// Puts the navigator on a persisted page, discarding the jump-back target.
    pub fn restore(&mut self, page: u32) {
        let page = self.clamp(page.max(1));
        self.current = page;
        self.previous = page;
    }

    /// Returns `true` when the page actually changed.
    pub fn step(&mut self, direction: Direction) -> bool {
        let next = step(self.current, direction, self.num_pages, self.dual_pane);
        self.accept(next)
    }

    pub fn jump(&mut self, requested: u32) -> bool {
        let next = jump_to(self.current, requested, self.num_pages, self.dual_pane);
        self.accept(next)
    }

    /// Returns to the page shown before the last accepted navigation.
    pub fn jump_back(&mut self) -> bool {
        if self.num_pages == 0 {
            return false;
        }
        let target = self.clamp(self.previous);
        self.accept(target)
    }

    pub fn toggle_dual_pane(&mut self) -> u32 {
        self.dual_pane = !self.dual_pane;
        toggle_dual_pane(self.current)
    }

    /// Records the page count reported by the renderer, pulling the current
    /// and previous pages back into range.
    pub fn set_num_pages(&mut self, num_pages: u32) {
        self.num_pages = num_pages;
        self.current = self.clamp(self.current);
        self.previous = self.clamp(self.previous);
    }

    pub fn reset_num_pages(&mut self) {
        self.num_pages = 0;
    }

    fn clamp(&self, page: u32) -> u32 {
        if self.num_pages == 0 {
            page
        } else {
            page.clamp(1, self.num_pages)
        }
    }

    fn accept(&mut self, next: u32) -> bool {
        if next == self.current {
            return false;
        }
        self.previous = self.current;
        self.current = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_never_leaves_document_bounds() {
        for num_pages in 1..=12 {
            for current in 1..=num_pages {
                for dual_pane in [false, true] {
                    for direction in [Direction::Backward, Direction::Forward] {
                        let next = step(current, direction, num_pages, dual_pane);
                        assert!(
                            (1..=num_pages).contains(&next),
                            "step({current}, {direction:?}, {num_pages}, {dual_pane}) = {next}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn step_forward_then_back_returns_to_start() {
        for num_pages in 1..=12 {
            for current in 1..=num_pages {
                for dual_pane in [false, true] {
                    let forward = step(current, Direction::Forward, num_pages, dual_pane);
                    if forward == current {
                        assert!(current + stride(dual_pane) > num_pages);
                        continue;
                    }
                    assert_eq!(
                        step(forward, Direction::Backward, num_pages, dual_pane),
                        current
                    );
                }
            }
        }
    }

    #[test]
    fn step_at_boundaries_is_noop() {
        assert_eq!(step(1, Direction::Backward, 10, false), 1);
        assert_eq!(step(10, Direction::Forward, 10, false), 10);
        assert_eq!(step(1, Direction::Backward, 10, true), 1);
        assert_eq!(step(9, Direction::Forward, 10, true), 9);
        assert_eq!(step(4, Direction::Forward, 10, true), 6);
    }

    #[test]
    fn navigation_disabled_until_page_count_known() {
        assert_eq!(step(3, Direction::Forward, 0, false), 3);
        assert_eq!(jump_to(3, 8, 0, false), 3);

        let mut nav = PageNavigator::new(false);
        nav.restore(5);
        assert!(!nav.step(Direction::Forward));
        assert!(!nav.jump(9));
        assert!(!nav.jump_back());
        assert_eq!(nav.current(), 5);
    }

    #[test]
    fn adjacent_jump_in_dual_pane_moves_a_spread() {
        assert_eq!(jump_to(4, 5, 20, true), 6);
        assert_eq!(jump_to(4, 3, 20, true), 2);
        assert_eq!(jump_to(4, 5, 20, false), 5);
        assert_eq!(jump_to(19, 20, 20, true), 19);
    }

    #[test]
    fn jump_clamps_to_page_count() {
        assert_eq!(jump_to(1, 500, 10, false), 10);
        assert_eq!(jump_to(4, 7, 10, true), 7);
    }

    #[test]
    fn parse_page_input_rejects_malformed_text() {
        assert_eq!(parse_page_input("12").unwrap(), 12);
        assert_eq!(parse_page_input(" 7 ").unwrap(), 7);
        for bad in ["", "0", "-3", "07", "1.5", "abc", "99999999999"] {
            assert!(
                matches!(parse_page_input(bad), Err(SessionError::MalformedInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejected_navigation_keeps_previous_page() {
        let mut nav = PageNavigator::new(false);
        nav.set_num_pages(10);
        nav.restore(3);
        assert!(nav.jump(8));
        assert_eq!((nav.current(), nav.previous()), (8, 3));

        assert!(!nav.jump(8));
        assert_eq!((nav.current(), nav.previous()), (8, 3));

        assert!(nav.jump_back());
        assert_eq!((nav.current(), nav.previous()), (3, 8));
    }

    #[test]
    fn toggling_layout_keeps_page() {
        let mut nav = PageNavigator::new(false);
        nav.set_num_pages(10);
        nav.restore(5);
        assert_eq!(nav.toggle_dual_pane(), 5);
        assert!(nav.dual_pane());
        assert!(nav.step(Direction::Forward));
        assert_eq!(nav.current(), 7);
    }

    #[test]
    fn page_count_report_clamps_restored_page() {
        let mut nav = PageNavigator::new(false);
        nav.restore(40);
        nav.set_num_pages(12);
        assert_eq!((nav.current(), nav.previous()), (12, 12));
    }
}
