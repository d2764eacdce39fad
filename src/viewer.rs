// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Fullscreen viewer state: zoom, pan and original-vs-result comparison.
//!
//! `ViewerState` is a plain record changed only through [`ViewerState::apply`]. The host maps its
//! own input (mouse, wheel, keys, buttons) to [`ViewerEvent`]s and reacts to the returned
//! [`Effect`]. `Viewer<T>` pairs the state with the image references it is showing.
//!
//! Invariants:
//! - `MIN_SCALE <= scale <= MAX_SCALE`
//! - `offset == (0, 0)` and no pan is active whenever `scale <= 1.0`

use chrono::{DateTime, SecondsFormat, Utc};

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 5.0;
pub const ZOOM_STEP: f64 = 1.2;

const FILENAME_PREFIX: &str = "ai-photoshoot";

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pointer position and offset captured when a drag starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanAnchor {
    pub pointer: Point,
    pub offset: Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerEvent {
    ZoomIn,
    ZoomOut,
    /// Scroll wheel; negative `delta_y` (scrolling up) zooms in.
    Wheel { delta_y: f64 },
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    PointerLeave,
    ToggleCompare,
    Download,
    Close,
    Escape,
}

impl ViewerEvent {
    /// Whether the host must swallow the event instead of applying its own default (scrolling).
    pub fn suppresses_default(&self) -> bool {
        matches!(self, ViewerEvent::Wheel { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadSuffix {
    Original,
    Enhanced,
    Generated,
}

impl DownloadSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadSuffix::Original => "original",
            DownloadSuffix::Enhanced => "enhanced",
            DownloadSuffix::Generated => "generated",
        }
    }
}

/// What the host should do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    None,
    Redraw,
    Close,
    Download(DownloadSuffix),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerState {
    pub scale: f64,
    pub offset: Point,
    pub comparing: bool,
    pub pan_anchor: Option<PanAnchor>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Point::ORIGIN,
            comparing: false,
            pan_anchor: None,
        }
    }
}

impl ViewerState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }

    /// Zoom out is disabled once the minimum scale is reached.
    pub fn can_zoom_out(&self) -> bool {
        self.scale > MIN_SCALE
    }

    pub fn can_zoom_in(&self) -> bool {
        self.scale < MAX_SCALE
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    /// Whether the secondary image is on screen.
    pub fn shows_secondary(&self, has_secondary: bool) -> bool {
        self.comparing && has_secondary
    }

    pub fn download_suffix(&self, has_secondary: bool) -> DownloadSuffix {
        if self.comparing {
            DownloadSuffix::Original
        } else if has_secondary {
            DownloadSuffix::Enhanced
        } else {
            DownloadSuffix::Generated
        }
    }

    /// Apply one event. Events whose guard does not hold are no-ops.
    pub fn apply(&mut self, event: ViewerEvent, has_secondary: bool) -> Effect {
        match event {
            ViewerEvent::ZoomIn => {
                if !self.can_zoom_in() {
                    return Effect::None;
                }
                self.set_scale(self.scale * ZOOM_STEP);
                Effect::Redraw
            }
            ViewerEvent::ZoomOut => {
                if !self.can_zoom_out() {
                    return Effect::None;
                }
                self.set_scale(self.scale / ZOOM_STEP);
                Effect::Redraw
            }
            ViewerEvent::Wheel { delta_y } => {
                let zoom = if delta_y < 0.0 {
                    ViewerEvent::ZoomIn
                } else {
                    ViewerEvent::ZoomOut
                };
                self.apply(zoom, has_secondary)
            }
            ViewerEvent::PointerDown(pointer) => {
                if self.scale <= 1.0 {
                    return Effect::None;
                }
                self.pan_anchor = Some(PanAnchor {
                    pointer,
                    offset: self.offset,
                });
                Effect::None
            }
            ViewerEvent::PointerMove(pointer) => {
                let Some(anchor) = self.pan_anchor else {
                    return Effect::None;
                };
                let offset = Point::new(
                    pointer.x - anchor.pointer.x + anchor.offset.x,
                    pointer.y - anchor.pointer.y + anchor.offset.y,
                );
                if offset == self.offset {
                    return Effect::None;
                }
                self.offset = offset;
                Effect::Redraw
            }
            ViewerEvent::PointerUp | ViewerEvent::PointerLeave => {
                self.pan_anchor = None;
                Effect::None
            }
            ViewerEvent::ToggleCompare => {
                if !has_secondary {
                    return Effect::None;
                }
                self.comparing = !self.comparing;
                Effect::Redraw
            }
            ViewerEvent::Download => Effect::Download(self.download_suffix(has_secondary)),
            ViewerEvent::Close | ViewerEvent::Escape => Effect::Close,
        }
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        if self.scale <= 1.0 {
            self.offset = Point::ORIGIN;
            // A drag outliving the zoom-out would pan a fitted image.
            self.pan_anchor = None;
        }
    }
}

/// `ai-photoshoot-<UTC ISO 8601 with ':' and '.' replaced by '-'>-<suffix>.png`
pub fn download_filename(now: DateTime<Utc>, suffix: DownloadSuffix) -> String {
    let timestamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{FILENAME_PREFIX}-{timestamp}-{}.png", suffix.as_str())
}

/// An open viewer: the displayed image references plus their view state.
#[derive(Clone, Debug)]
pub struct Viewer<T> {
    primary: T,
    secondary: Option<T>,
    state: ViewerState,
}

impl<T: PartialEq> Viewer<T> {
    pub fn open(primary: T, secondary: Option<T>) -> Self {
        Self {
            primary,
            secondary,
            state: ViewerState::default(),
        }
    }

    /// Show another image pair. A different primary resets zoom, pan and comparison.
    pub fn show(&mut self, primary: T, secondary: Option<T>) {
        if self.primary != primary {
            self.state.reset();
        }
        self.primary = primary;
        self.secondary = secondary;
        if self.secondary.is_none() {
            self.state.comparing = false;
        }
    }

    pub fn handle(&mut self, event: ViewerEvent) -> Effect {
        let has_secondary = self.secondary.is_some();
        self.state.apply(event, has_secondary)
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn primary(&self) -> &T {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&T> {
        self.secondary.as_ref()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn displayed(&self) -> &T {
        match &self.secondary {
            Some(secondary) if self.state.comparing => secondary,
            _ => &self.primary,
        }
    }

    pub fn badge(&self) -> Option<&'static str> {
        if self.state.comparing {
            Some("ORIGINAL")
        } else if self.has_secondary() {
            Some("ENHANCED")
        } else {
            None
        }
    }

    pub fn download_name(&self, now: DateTime<Utc>) -> String {
        download_filename(now, self.state.download_suffix(self.has_secondary()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn zoomed(steps: usize) -> ViewerState {
        let mut state = ViewerState::default();
        for _ in 0..steps {
            state.apply(ViewerEvent::ZoomIn, false);
        }
        state
    }

    fn assert_invariants(state: &ViewerState) {
        assert!((MIN_SCALE..=MAX_SCALE).contains(&state.scale));
        if state.scale <= 1.0 {
            assert_eq!(state.offset, Point::ORIGIN);
            assert!(state.pan_anchor.is_none());
        }
    }

    #[test]
    fn test_default_state() {
        let state = ViewerState::default();
        assert_eq!(state.scale, 1.0);
        assert_eq!(state.offset, Point::ORIGIN);
        assert!(!state.comparing);
        assert!(!state.is_panning());
    }

    #[test]
    fn test_six_zoom_ins() {
        let state = zoomed(6);
        assert!((state.scale - 2.985984).abs() < 1e-9);
        assert_eq!(state.zoom_percent(), 299);
    }

    #[test]
    fn test_zoom_in_clamps_at_max() {
        let mut state = zoomed(50);
        assert_eq!(state.scale, MAX_SCALE);
        assert_eq!(state.apply(ViewerEvent::ZoomIn, false), Effect::None);
        assert_eq!(state.scale, MAX_SCALE);
    }

    #[test]
    fn test_zoom_out_clamps_at_min() {
        let mut state = ViewerState::default();
        for _ in 0..50 {
            state.apply(ViewerEvent::ZoomOut, false);
            assert_invariants(&state);
        }
        assert_eq!(state.scale, MIN_SCALE);
        assert!(!state.can_zoom_out());
        assert_eq!(state.apply(ViewerEvent::ZoomOut, false), Effect::None);
    }

    #[test]
    fn test_wheel_dispatches_zoom() {
        let mut state = ViewerState::default();
        let event = ViewerEvent::Wheel { delta_y: -120.0 };
        assert!(event.suppresses_default());
        assert_eq!(state.apply(event, false), Effect::Redraw);
        assert!((state.scale - 1.2).abs() < 1e-12);
        state.apply(ViewerEvent::Wheel { delta_y: 120.0 }, false);
        assert!((state.scale - 1.0).abs() < 1e-12);
        assert!(!ViewerEvent::ZoomIn.suppresses_default());
    }

    #[test]
    fn test_pan_requires_zoom() {
        let mut state = ViewerState::default();
        state.apply(ViewerEvent::PointerDown(Point::new(10.0, 10.0)), false);
        assert!(!state.is_panning());
        state.apply(ViewerEvent::PointerMove(Point::new(50.0, 50.0)), false);
        assert_eq!(state.offset, Point::ORIGIN);
    }

    #[test]
    fn test_pan_follows_pointer_relative_to_anchor() {
        let mut state = zoomed(2);
        state.apply(ViewerEvent::PointerDown(Point::new(100.0, 100.0)), false);
        assert_eq!(
            state.apply(ViewerEvent::PointerMove(Point::new(130.0, 90.0)), false),
            Effect::Redraw
        );
        assert_eq!(state.offset, Point::new(30.0, -10.0));
        state.apply(ViewerEvent::PointerUp, false);
        assert!(!state.is_panning());

        // A second drag continues from the current offset.
        state.apply(ViewerEvent::PointerDown(Point::new(0.0, 0.0)), false);
        state.apply(ViewerEvent::PointerMove(Point::new(5.0, 5.0)), false);
        assert_eq!(state.offset, Point::new(35.0, -5.0));
        state.apply(ViewerEvent::PointerLeave, false);
        state.apply(ViewerEvent::PointerMove(Point::new(500.0, 500.0)), false);
        assert_eq!(state.offset, Point::new(35.0, -5.0));
    }

    #[test]
    fn test_pointer_up_without_drag_is_noop() {
        let mut state = zoomed(1);
        let before = state;
        assert_eq!(state.apply(ViewerEvent::PointerUp, false), Effect::None);
        assert_eq!(state.apply(ViewerEvent::PointerLeave, false), Effect::None);
        assert_eq!(state, before);
    }

    #[test]
    fn test_zoom_back_to_fit_resets_offset_and_cancels_drag() {
        let mut state = zoomed(1);
        state.apply(ViewerEvent::PointerDown(Point::new(0.0, 0.0)), false);
        state.apply(ViewerEvent::PointerMove(Point::new(40.0, 40.0)), false);
        assert_eq!(state.offset, Point::new(40.0, 40.0));

        state.apply(ViewerEvent::ZoomOut, false);
        assert_invariants(&state);
        assert_eq!(state.offset, Point::ORIGIN);

        // The cancelled drag can no longer move the image.
        state.apply(ViewerEvent::PointerMove(Point::new(80.0, 80.0)), false);
        assert_eq!(state.offset, Point::ORIGIN);
    }

    #[test]
    fn test_zoom_above_one_keeps_offset() {
        let mut state = zoomed(3);
        state.apply(ViewerEvent::PointerDown(Point::new(0.0, 0.0)), false);
        state.apply(ViewerEvent::PointerMove(Point::new(7.0, 3.0)), false);
        state.apply(ViewerEvent::ZoomOut, false);
        assert!(state.scale > 1.0);
        assert_eq!(state.offset, Point::new(7.0, 3.0));
    }

    #[test]
    fn test_toggle_compare_without_secondary_is_noop() {
        let mut state = zoomed(2);
        let before = state;
        assert_eq!(state.apply(ViewerEvent::ToggleCompare, false), Effect::None);
        assert_eq!(state, before);
    }

    #[test]
    fn test_toggle_compare_with_secondary() {
        let mut state = ViewerState::default();
        state.apply(ViewerEvent::ToggleCompare, true);
        assert!(state.comparing);
        assert!(state.shows_secondary(true));
        state.apply(ViewerEvent::ToggleCompare, true);
        assert!(!state.comparing);
    }

    #[test]
    fn test_download_suffix_rules() {
        let mut state = ViewerState::default();
        assert_eq!(
            state.apply(ViewerEvent::Download, false),
            Effect::Download(DownloadSuffix::Generated)
        );
        assert_eq!(
            state.apply(ViewerEvent::Download, true),
            Effect::Download(DownloadSuffix::Enhanced)
        );
        state.apply(ViewerEvent::ToggleCompare, true);
        assert_eq!(
            state.apply(ViewerEvent::Download, true),
            Effect::Download(DownloadSuffix::Original)
        );
    }

    #[test]
    fn test_close_and_escape() {
        let mut state = ViewerState::default();
        assert_eq!(state.apply(ViewerEvent::Close, false), Effect::Close);
        assert_eq!(state.apply(ViewerEvent::Escape, false), Effect::Close);
    }

    #[test]
    fn test_download_filename_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 9, 3, 7).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(
            download_filename(now, DownloadSuffix::Original),
            "ai-photoshoot-2024-05-17T09-03-07-042Z-original.png"
        );
    }

    #[test]
    fn test_viewer_displayed_and_badge() {
        let mut viewer = Viewer::open("result.png", Some("source.png"));
        assert_eq!(*viewer.displayed(), "result.png");
        assert_eq!(viewer.badge(), Some("ENHANCED"));
        viewer.handle(ViewerEvent::ToggleCompare);
        assert_eq!(*viewer.displayed(), "source.png");
        assert_eq!(viewer.badge(), Some("ORIGINAL"));

        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(viewer.download_name(now).ends_with("-original.png"));

        let plain = Viewer::open("only.png", None);
        assert_eq!(plain.badge(), None);
        assert!(plain.download_name(now).ends_with("-generated.png"));
    }

    #[test]
    fn test_viewer_resets_on_new_primary() {
        let mut viewer = Viewer::open("a.png", Some("orig.png"));
        viewer.handle(ViewerEvent::ZoomIn);
        viewer.handle(ViewerEvent::ZoomIn);
        viewer.handle(ViewerEvent::PointerDown(Point::new(1.0, 1.0)));
        viewer.handle(ViewerEvent::PointerMove(Point::new(9.0, 9.0)));
        viewer.handle(ViewerEvent::ToggleCompare);

        viewer.show("a.png", Some("orig.png"));
        assert!(viewer.state().scale > 1.0);
        assert!(viewer.state().comparing);

        viewer.show("b.png", Some("orig.png"));
        assert_eq!(*viewer.state(), ViewerState::default());
        assert_eq!(*viewer.displayed(), "b.png");
    }

    #[test]
    fn test_invariants_hold_over_mixed_sequence() {
        let events = [
            ViewerEvent::ZoomIn,
            ViewerEvent::PointerDown(Point::new(3.0, 3.0)),
            ViewerEvent::PointerMove(Point::new(30.0, -4.0)),
            ViewerEvent::ZoomOut,
            ViewerEvent::PointerMove(Point::new(90.0, 90.0)),
            ViewerEvent::Wheel { delta_y: -1.0 },
            ViewerEvent::Wheel { delta_y: -1.0 },
            ViewerEvent::PointerDown(Point::new(0.0, 0.0)),
            ViewerEvent::PointerMove(Point::new(-20.0, 11.0)),
            ViewerEvent::Wheel { delta_y: 1.0 },
            ViewerEvent::Wheel { delta_y: 1.0 },
            ViewerEvent::Wheel { delta_y: 1.0 },
            ViewerEvent::PointerMove(Point::new(60.0, 60.0)),
            ViewerEvent::ToggleCompare,
        ];
        let mut state = ViewerState::default();
        for event in events {
            state.apply(event, true);
            assert_invariants(&state);
        }
    }
}
