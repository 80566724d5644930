//! Secret corner triple-tap gestures
//!
//! The device has no physical keys, so two bottom corners of the panel act as
//! hidden buttons: three taps inside the same corner within a short window
//! trigger a system action instead of a click.

use heapless::Deque;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::button::HitRect;

/// Taps needed to fire a gesture
pub const TAPS_TO_FIRE: usize = 3;

/// Default window the taps must fall within
pub const DEFAULT_WINDOW_MS: u64 = 1200;

/// Default edge length of each corner zone on the 800x480 panel
pub const DEFAULT_ZONE_SIZE: i32 = 80;

/// Detection corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    /// Bottom-left zone
    BottomLeft,
    /// Bottom-right zone
    BottomRight,
}

impl Corner {
    const ALL: [Corner; 2] = [Corner::BottomLeft, Corner::BottomRight];

    fn index(self) -> usize {
        match self {
            Corner::BottomLeft => 0,
            Corner::BottomRight => 1,
        }
    }

    /// Action bound to this corner
    #[must_use]
    pub fn action(self) -> GestureAction {
        match self {
            Corner::BottomLeft => GestureAction::ShowKeyboard,
            Corner::BottomRight => GestureAction::OpenSystemMenu,
        }
    }
}

/// What a recognised gesture asks the host to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureAction {
    /// Bring up the on-screen keyboard
    ShowKeyboard,
    /// Open the application's global menu
    OpenSystemMenu,
}

/// Corner zone geometry for a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerZones {
    bottom_left: HitRect,
    bottom_right: HitRect,
}

impl Default for CornerZones {
    fn default() -> Self {
        Self::new(800, 480, DEFAULT_ZONE_SIZE)
    }
}

impl CornerZones {
    /// Square zones of `size` pixels in the bottom corners of a panel
    #[must_use]
    pub fn new(panel_width: i32, panel_height: i32, size: i32) -> Self {
        let top = panel_height - size;
        Self {
            bottom_left: HitRect::new(0, top, size, size),
            bottom_right: HitRect::new(panel_width - size, top, size, size),
        }
    }

    /// Zone rectangle for a corner
    #[must_use]
    pub fn rect(&self, corner: Corner) -> HitRect {
        match corner {
            Corner::BottomLeft => self.bottom_left,
            Corner::BottomRight => self.bottom_right,
        }
    }

    /// Corner containing `(x, y)`, if any
    #[must_use]
    pub fn corner_at(&self, x: i32, y: i32) -> Option<Corner> {
        Corner::ALL
            .into_iter()
            .find(|corner| self.rect(*corner).contains(x, y))
    }
}

/// Result of observing one press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Press was outside every zone
    Outside,
    /// Press was recorded toward a gesture in this corner
    Recorded(Corner),
    /// Press completed a gesture in this corner
    Fired(Corner),
}

/// Recognises triple taps in the bottom corners
#[derive(Debug, Clone)]
pub struct CornerGestureDetector {
    zones: CornerZones,
    window_ms: u64,
    enabled: bool,
    history: [Deque<u64, TAPS_TO_FIRE>; 2],
}

impl Default for CornerGestureDetector {
    fn default() -> Self {
        Self::new(CornerZones::default(), DEFAULT_WINDOW_MS)
    }
}

impl CornerGestureDetector {
    /// Create a detector for the given zones and window
    #[must_use]
    pub fn new(zones: CornerZones, window_ms: u64) -> Self {
        Self {
            zones,
            window_ms,
            enabled: true,
            history: [Deque::new(), Deque::new()],
        }
    }

    /// Enable or disable recognition; disabling forgets recorded taps
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    /// Whether recognition is active
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Zone geometry
    #[must_use]
    pub fn zones(&self) -> &CornerZones {
        &self.zones
    }

    /// Taps currently remembered for a corner
    #[must_use]
    pub fn pending_taps(&self, corner: Corner) -> usize {
        self.history[corner.index()].len()
    }

    /// Forget all recorded taps
    pub fn reset(&mut self) {
        for taps in &mut self.history {
            taps.clear();
        }
    }

    /// Record a new press at panel coordinates `(x, y)`
    pub fn observe_press(&mut self, x: i32, y: i32, now_ms: u64) -> GestureOutcome {
        if !self.enabled {
            return GestureOutcome::Outside;
        }
        let Some(corner) = self.zones.corner_at(x, y) else {
            return GestureOutcome::Outside;
        };

        let window_ms = self.window_ms;
        let taps = &mut self.history[corner.index()];

        while taps
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) > window_ms)
        {
            taps.pop_front();
        }
        if taps.is_full() {
            taps.pop_front();
        }
        // Cannot fail: a slot was freed above if the history was full
        let _ = taps.push_back(now_ms);

        trace!(
            "Corner {:?} tap at {} ms ({} in window)",
            corner,
            now_ms,
            taps.len()
        );

        if taps.len() == TAPS_TO_FIRE {
            taps.clear();
            debug!("Corner gesture {:?} -> {:?}", corner, corner.action());
            GestureOutcome::Fired(corner)
        } else {
            GestureOutcome::Recorded(corner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BR: (i32, i32) = (770, 450);
    const BL: (i32, i32) = (20, 460);

    #[test]
    fn test_zone_lookup() {
        let zones = CornerZones::default();
        assert_eq!(zones.corner_at(0, 479), Some(Corner::BottomLeft));
        assert_eq!(zones.corner_at(79, 400), Some(Corner::BottomLeft));
        assert_eq!(zones.corner_at(80, 400), None);
        assert_eq!(zones.corner_at(79, 399), None);
        assert_eq!(zones.corner_at(720, 400), Some(Corner::BottomRight));
        assert_eq!(zones.corner_at(799, 479), Some(Corner::BottomRight));
        assert_eq!(zones.corner_at(400, 470), None);
        assert_eq!(zones.corner_at(10, 10), None);
    }

    #[test]
    fn test_triple_tap_fires_once() {
        let mut detector = CornerGestureDetector::default();
        assert_eq!(
            detector.observe_press(BR.0, BR.1, 1000),
            GestureOutcome::Recorded(Corner::BottomRight)
        );
        assert_eq!(
            detector.observe_press(BR.0, BR.1, 1300),
            GestureOutcome::Recorded(Corner::BottomRight)
        );
        assert_eq!(
            detector.observe_press(BR.0, BR.1, 1600),
            GestureOutcome::Fired(Corner::BottomRight)
        );
        assert_eq!(detector.pending_taps(Corner::BottomRight), 0);
        // A fourth tap right after starts over
        assert_eq!(
            detector.observe_press(BR.0, BR.1, 1700),
            GestureOutcome::Recorded(Corner::BottomRight)
        );
    }

    #[test]
    fn test_slow_taps_never_accumulate() {
        let mut detector = CornerGestureDetector::default();
        for i in 0..10 {
            let outcome = detector.observe_press(BL.0, BL.1, i * 700);
            assert_ne!(outcome, GestureOutcome::Fired(Corner::BottomLeft));
        }
    }

    #[test]
    fn test_eviction_drops_every_stale_tap() {
        let mut detector = CornerGestureDetector::default();
        detector.observe_press(BL.0, BL.1, 0);
        detector.observe_press(BL.0, BL.1, 100);
        assert_eq!(detector.pending_taps(Corner::BottomLeft), 2);

        detector.observe_press(BL.0, BL.1, 5000);
        assert_eq!(detector.pending_taps(Corner::BottomLeft), 1);
    }

    #[test]
    fn test_corners_are_independent() {
        let mut detector = CornerGestureDetector::default();
        detector.observe_press(BL.0, BL.1, 0);
        detector.observe_press(BR.0, BR.1, 100);
        detector.observe_press(BL.0, BL.1, 200);
        assert_eq!(
            detector.observe_press(BR.0, BR.1, 300),
            GestureOutcome::Recorded(Corner::BottomRight)
        );
        assert_eq!(
            detector.observe_press(BL.0, BL.1, 400),
            GestureOutcome::Fired(Corner::BottomLeft)
        );
    }

    #[test]
    fn test_outside_press_is_ignored() {
        let mut detector = CornerGestureDetector::default();
        assert_eq!(detector.observe_press(400, 240, 0), GestureOutcome::Outside);
        assert_eq!(detector.pending_taps(Corner::BottomLeft), 0);
        assert_eq!(detector.pending_taps(Corner::BottomRight), 0);
    }

    #[test]
    fn test_disabled_detector_records_nothing() {
        let mut detector = CornerGestureDetector::default();
        detector.observe_press(BR.0, BR.1, 0);
        detector.set_enabled(false);
        assert_eq!(detector.pending_taps(Corner::BottomRight), 0);
        for t in [10, 20, 30] {
            assert_eq!(detector.observe_press(BR.0, BR.1, t), GestureOutcome::Outside);
        }
    }

    #[test]
    fn test_corner_actions() {
        assert_eq!(Corner::BottomLeft.action(), GestureAction::ShowKeyboard);
        assert_eq!(Corner::BottomRight.action(), GestureAction::OpenSystemMenu);
    }
}
