//! Debounced on-screen buttons
//!
//! Immediate-mode UI (game menus, pause buttons) checks a rectangle against the
//! current touch every frame. [`ButtonDebouncer`] turns that level signal into
//! a single press edge, suppressing re-fires within a cooldown window.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default cooldown between two accepted presses
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Axis-aligned hit region in screen pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl HitRect {
    /// Create a hit rectangle
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether `(x, y)` lies inside the rectangle (right/bottom exclusive)
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x.saturating_add(self.width)
            && y >= self.y
            && y < self.y.saturating_add(self.height)
    }
}

/// Whether the point `(x, y)` falls inside `rect`
#[must_use]
pub fn is_touched(rect: &HitRect, x: i32, y: i32) -> bool {
    rect.contains(x, y)
}

/// Edge-triggered press detector with a cooldown
///
/// | was pressed | touching | since last press | result |
/// |---|---|---|---|
/// | no  | yes | > cooldown  | fire |
/// | no  | yes | <= cooldown | debounced |
/// | yes | yes | any         | already down |
/// | any | no  | any         | reset |
#[derive(Debug, Clone)]
pub struct ButtonDebouncer {
    was_pressed: bool,
    last_press_ms: Option<u64>,
    cooldown_ms: u64,
}

impl Default for ButtonDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl ButtonDebouncer {
    /// Create a debouncer with the given cooldown in milliseconds
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            was_pressed: false,
            last_press_ms: None,
            cooldown_ms,
        }
    }

    /// Cooldown window in milliseconds
    #[must_use]
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// Whether the last observed sample was a touch
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.was_pressed
    }

    /// Feed the current touching level at monotonic time `now_ms`
    ///
    /// Returns `true` exactly on an accepted press edge.
    pub fn check_press(&mut self, touching: bool, now_ms: u64) -> bool {
        if !touching {
            self.was_pressed = false;
            return false;
        }
        if self.was_pressed {
            return false;
        }

        let cooled_down = self
            .last_press_ms
            .is_none_or(|last| now_ms.saturating_sub(last) > self.cooldown_ms);
        if !cooled_down {
            trace!("Button press debounced at {} ms", now_ms);
            return false;
        }

        self.was_pressed = true;
        self.last_press_ms = Some(now_ms);
        true
    }

    /// Hit-test the touch against `rect`, then debounce
    pub fn update(&mut self, rect: &HitRect, x: i32, y: i32, touching: bool, now_ms: u64) -> bool {
        self.check_press(touching && rect.contains(x, y), now_ms)
    }
}
