// src/app/nav.rs — navigation state for the still viewer: wraparound
// index math, click zones, swipe classification, and the keys that are
// only live while zoomed.

pub const SWIPE_THRESHOLD: f32 = 50.0;
pub const VERTICAL_THRESHOLD: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerMode {
    Grid,
    Zoomed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    Previous,
    Next,
    OpenZoom,
    CloseZoom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
    Escape,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavOutcome {
    pub index_changed: bool,
    pub opened_zoom: bool,
    pub closed_zoom: bool,
}

/// Current position within the open film's stills. `current` is always
/// in `0..len` while `len > 0`.
#[derive(Clone, Copy, Debug)]
pub struct GalleryState {
    len: usize,
    current: usize,
}

impl GalleryState {
    pub fn new(len: usize) -> Self {
        Self { len, current: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, index: usize) {
        if self.len > 0 {
            self.current = index % self.len;
        }
    }

    /// Step by `delta` with modulo wraparound in both directions.
    pub fn advance(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let len = self.len as isize;
        let next = (self.current as isize + delta).rem_euclid(len);
        self.current = next as usize;
    }
}

pub struct Navigator {
    pub mode: ViewerMode,
    pub state: GalleryState,
}

impl Navigator {
    pub fn new(len: usize) -> Self {
        Self {
            mode: ViewerMode::Grid,
            state: GalleryState::new(len),
        }
    }

    pub fn apply(&mut self, action: NavAction) -> NavOutcome {
        let mut outcome = NavOutcome::default();
        match action {
            NavAction::Previous => {
                if !self.state.is_empty() {
                    self.state.advance(-1);
                    outcome.index_changed = true;
                }
            }
            NavAction::Next => {
                if !self.state.is_empty() {
                    self.state.advance(1);
                    outcome.index_changed = true;
                }
            }
            NavAction::OpenZoom => {
                if self.mode != ViewerMode::Zoomed {
                    self.mode = ViewerMode::Zoomed;
                    outcome.opened_zoom = true;
                }
            }
            NavAction::CloseZoom => {
                if self.mode == ViewerMode::Zoomed {
                    self.mode = ViewerMode::Grid;
                    outcome.closed_zoom = true;
                }
            }
        }
        outcome
    }

    /// Arrow keys and Escape act only while an image is zoomed.
    pub fn key_action(&self, key: NavKey) -> Option<NavAction> {
        if self.mode != ViewerMode::Zoomed {
            return None;
        }
        Some(match key {
            NavKey::Left => NavAction::Previous,
            NavKey::Right => NavAction::Next,
            NavKey::Escape => NavAction::CloseZoom,
        })
    }
}

/// Horizontal thirds over the main image: left third goes back, middle
/// opens zoom, right third goes forward.
pub fn classify_click(x: f32, width: f32) -> NavAction {
    if width <= 0.0 {
        return NavAction::OpenZoom;
    }
    let third = width / 3.0;
    if x < third {
        NavAction::Previous
    } else if x < third * 2.0 {
        NavAction::OpenZoom
    } else {
        NavAction::Next
    }
}

/// A drag counts as a swipe only when it is decisively horizontal:
/// more than SWIPE_THRESHOLD sideways and within VERTICAL_THRESHOLD of
/// vertical drift. Leftward drags advance, rightward drags go back.
pub fn classify_swipe(dx: f32, dy: f32) -> Option<NavAction> {
    if dy.abs() > VERTICAL_THRESHOLD {
        return None;
    }
    if dx < -SWIPE_THRESHOLD {
        Some(NavAction::Next)
    } else if dx > SWIPE_THRESHOLD {
        Some(NavAction::Previous)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_both_directions() {
        let mut state = GalleryState::new(5);
        state.advance(-1);
        assert_eq!(state.current(), 4);
        state.advance(1);
        assert_eq!(state.current(), 0);
        state.advance(7);
        assert_eq!(state.current(), 2);
    }

    #[test]
    fn full_cycle_is_identity() {
        let mut nav = Navigator::new(9);
        for _ in 0..9 {
            nav.apply(NavAction::Next);
        }
        assert_eq!(nav.state.current(), 0);
    }

    #[test]
    fn empty_gallery_never_moves() {
        let mut nav = Navigator::new(0);
        let outcome = nav.apply(NavAction::Next);
        assert!(!outcome.index_changed);
        assert_eq!(nav.state.current(), 0);
    }

    #[test]
    fn click_zones_split_into_thirds() {
        let w = 300.0;
        assert_eq!(classify_click(0.0, w), NavAction::Previous);
        assert_eq!(classify_click(99.0, w), NavAction::Previous);
        assert_eq!(classify_click(100.0, w), NavAction::OpenZoom);
        assert_eq!(classify_click(199.0, w), NavAction::OpenZoom);
        assert_eq!(classify_click(200.0, w), NavAction::Next);
        assert_eq!(classify_click(299.0, w), NavAction::Next);
    }

    #[test]
    fn swipe_classification() {
        assert_eq!(classify_swipe(-80.0, 10.0), Some(NavAction::Next));
        assert_eq!(classify_swipe(80.0, -10.0), Some(NavAction::Previous));
        // too short
        assert_eq!(classify_swipe(-49.0, 0.0), None);
        assert_eq!(classify_swipe(50.0, 0.0), None);
        // too vertical
        assert_eq!(classify_swipe(-200.0, 150.0), None);
        // vertical drift within tolerance still counts
        assert_eq!(classify_swipe(-80.0, 99.0), Some(NavAction::Next));
    }

    #[test]
    fn keys_only_act_while_zoomed() {
        let mut nav = Navigator::new(3);
        assert_eq!(nav.key_action(NavKey::Left), None);
        assert_eq!(nav.key_action(NavKey::Escape), None);

        nav.apply(NavAction::OpenZoom);
        assert_eq!(nav.key_action(NavKey::Left), Some(NavAction::Previous));
        assert_eq!(nav.key_action(NavKey::Right), Some(NavAction::Next));
        assert_eq!(nav.key_action(NavKey::Escape), Some(NavAction::CloseZoom));

        let outcome = nav.apply(NavAction::CloseZoom);
        assert!(outcome.closed_zoom);
        assert_eq!(nav.mode, ViewerMode::Grid);
    }

    #[test]
    fn reopening_zoom_is_idempotent() {
        let mut nav = Navigator::new(3);
        assert!(nav.apply(NavAction::OpenZoom).opened_zoom);
        assert!(!nav.apply(NavAction::OpenZoom).opened_zoom);
        assert!(nav.apply(NavAction::CloseZoom).closed_zoom);
        assert!(!nav.apply(NavAction::CloseZoom).closed_zoom);
    }
}
