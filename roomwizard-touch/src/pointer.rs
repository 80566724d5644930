//! Pointer event synthesis for hosted applications
//!
//! Converts successive [`TouchState`] snapshots into conventional mouse
//! events. A touch produces, in order:
//!
//! ```text
//! Move(press) -> Down(press) -> Move(drag)* -> Up | SecondaryUp
//! ```
//!
//! The move is always a separate, earlier event than the down so hosts that
//! reposition their cursor on move do not swallow the press. Touches held
//! past the long-press threshold release as [`PointerEvent::SecondaryUp`].
//! A press and release inside one poll produce nothing at all.
//!
//! Triple taps in the bottom corners are recognised by a
//! [`CornerGestureDetector`] before any pointer event is synthesised for the
//! press; the tap that completes a gesture emits the bound action instead.

use serde::Serialize;
use statig::blocking::IntoStateMachineExt as _;
use tracing::{debug, trace};

use crate::gesture::CornerGestureDetector;
use crate::session::TouchState;
use crate::surface::{ContentScaling, FixedPresentation, Presentation, SurfaceMapper};

mod hsm;

use hsm::{DispatchContext, PointerHsm, PointerInput};

/// Default hold time after which a release counts as a secondary click
pub const DEFAULT_LONG_PRESS_MS: u64 = 500;

/// Keys that can appear in synthetic chords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Key {
    /// Function key 5
    F5,
}

/// Modifier keys held with a chord
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Modifiers {
    /// Control
    pub ctrl: bool,
    /// Alt
    pub alt: bool,
    /// Shift
    pub shift: bool,
}

/// A key plus modifiers, delivered as a down/up pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyChord {
    /// Key
    pub key: Key,
    /// Modifiers held
    pub modifiers: Modifiers,
}

impl KeyChord {
    /// Ctrl+F5, which opens the host's global menu
    #[must_use]
    pub const fn open_menu() -> Self {
        Self {
            key: Key::F5,
            modifiers: Modifiers {
                ctrl: true,
                alt: false,
                shift: false,
            },
        }
    }
}

/// Host-level requests that are not key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    /// Show the on-screen keyboard
    ShowKeyboard,
}

/// Logical event delivered to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    /// Pointer moved
    Move {
        /// X in surface coordinates
        x: i32,
        /// Y in surface coordinates
        y: i32,
    },
    /// Primary button pressed
    Down {
        /// X in surface coordinates
        x: i32,
        /// Y in surface coordinates
        y: i32,
    },
    /// Primary button released
    Up {
        /// X in surface coordinates
        x: i32,
        /// Y in surface coordinates
        y: i32,
    },
    /// Long press released
    SecondaryUp {
        /// X in surface coordinates
        x: i32,
        /// Y in surface coordinates
        y: i32,
    },
    /// Chord pressed
    KeyDown {
        /// Chord
        chord: KeyChord,
    },
    /// Chord released
    KeyUp {
        /// Chord
        chord: KeyChord,
    },
    /// System action requested
    Action {
        /// Requested action
        action: SystemAction,
    },
}

impl PointerEvent {
    /// Position carried by the event, if any
    #[must_use]
    pub fn position(&self) -> Option<(i32, i32)> {
        match *self {
            Self::Move { x, y }
            | Self::Down { x, y }
            | Self::Up { x, y }
            | Self::SecondaryUp { x, y } => Some((x, y)),
            Self::KeyDown { .. } | Self::KeyUp { .. } | Self::Action { .. } => None,
        }
    }

    fn with_position(self, (x, y): (i32, i32)) -> Self {
        match self {
            Self::Move { .. } => Self::Move { x, y },
            Self::Down { .. } => Self::Down { x, y },
            Self::Up { .. } => Self::Up { x, y },
            Self::SecondaryUp { .. } => Self::SecondaryUp { x, y },
            other => other,
        }
    }
}

/// Observable phase of the pointer state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PointerPhase {
    /// No touch in progress
    #[default]
    Idle,
    /// Move emitted, down not yet emitted
    PressPending,
    /// Down emitted, waiting for release
    Held,
    /// Input ignored until the finger lifts
    AwaitingRelease,
}

/// Turns touch snapshots into ordered pointer events
pub struct PointerEventStateMachine {
    machine: statig::blocking::StateMachine<PointerHsm>,
    mapper: SurfaceMapper,
    last_overlay: Option<bool>,
    last_scaling: ContentScaling,
}

impl PointerEventStateMachine {
    /// Create a state machine with default thresholds and gestures
    #[must_use]
    pub fn new(mapper: SurfaceMapper) -> Self {
        Self::with_settings(mapper, DEFAULT_LONG_PRESS_MS, CornerGestureDetector::default())
    }

    /// Create a state machine with a custom long-press threshold and detector
    #[must_use]
    pub fn with_settings(
        mapper: SurfaceMapper,
        long_press_ms: u64,
        gestures: CornerGestureDetector,
    ) -> Self {
        Self {
            machine: PointerHsm::new(long_press_ms, gestures).state_machine(),
            mapper,
            last_overlay: None,
            last_scaling: ContentScaling::default(),
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PointerPhase {
        self.machine.inner().phase
    }

    /// Surface mapper
    #[must_use]
    pub fn mapper(&self) -> &SurfaceMapper {
        &self.mapper
    }

    /// Mutable access to the surface mapper
    pub fn mapper_mut(&mut self) -> &mut SurfaceMapper {
        &mut self.mapper
    }

    /// Long-press threshold in milliseconds
    #[must_use]
    pub fn long_press_ms(&self) -> u64 {
        self.machine.inner().long_press_ms
    }

    /// Consume one touch snapshot taken at monotonic time `now_ms`
    ///
    /// Returns the events to deliver, in order, already mapped into the
    /// surface that `presentation` reports as active.
    pub fn update(
        &mut self,
        state: &TouchState,
        now_ms: u64,
        presentation: &dyn Presentation,
    ) -> Vec<PointerEvent> {
        let mut events = Vec::new();

        let overlay = presentation.is_overlay_active();
        if let Some(previous_overlay) = self.last_overlay.filter(|&prev| prev != overlay) {
            debug!("Presentation surface changed (overlay={})", overlay);
            let previous = FixedPresentation {
                overlay_active: previous_overlay,
                scaling: self.last_scaling,
            };
            let mut context = DispatchContext::default();
            self.machine
                .handle_with_context(&PointerInput::SurfaceChanged, &mut context);
            events.extend(self.map_all(context.emitted, &previous));
        }
        self.last_overlay = Some(overlay);
        self.last_scaling = presentation.content_scaling();

        let input = PointerInput::Sample {
            state: *state,
            now_ms,
        };
        let mut context = DispatchContext::default();
        let mut previous = self.phase();
        self.machine.handle_with_context(&input, &mut context);
        // A snapshot can end one touch and begin the next, and a new touch
        // delivers its move and down from the same snapshot.
        while state.held
            && self.phase() != previous
            && matches!(self.phase(), PointerPhase::Idle | PointerPhase::PressPending)
        {
            previous = self.phase();
            self.machine.handle_with_context(&input, &mut context);
        }
        events.extend(self.map_all(context.emitted, presentation));

        for event in &events {
            trace!("Pointer event {:?}", event);
        }
        events
    }

    fn map_all(
        &self,
        emitted: Vec<PointerEvent>,
        presentation: &dyn Presentation,
    ) -> Vec<PointerEvent> {
        emitted
            .into_iter()
            .map(|event| match event.position() {
                Some((x, y)) => event.with_position(self.mapper.map(presentation, x, y)),
                None => event,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::BezelMargins;

    fn overlay() -> FixedPresentation {
        FixedPresentation::overlay(ContentScaling::default())
    }

    fn machine() -> PointerEventStateMachine {
        PointerEventStateMachine::new(SurfaceMapper::new(800, 480, 320, 200))
    }

    fn press(x: i32, y: i32) -> TouchState {
        TouchState {
            x,
            y,
            pressed: true,
            released: false,
            held: true,
        }
    }

    fn hold(x: i32, y: i32) -> TouchState {
        TouchState {
            x,
            y,
            pressed: false,
            released: false,
            held: true,
        }
    }

    fn release(x: i32, y: i32) -> TouchState {
        TouchState {
            x,
            y,
            pressed: false,
            released: true,
            held: false,
        }
    }

    fn idle(x: i32, y: i32) -> TouchState {
        TouchState {
            x,
            y,
            ..TouchState::default()
        }
    }

    #[test]
    fn test_short_tap_emits_move_down_up() {
        let mut pointer = machine();
        let p = overlay();

        let events = pointer.update(&press(100, 200), 0, &p);
        assert_eq!(
            events,
            vec![
                PointerEvent::Move { x: 100, y: 200 },
                PointerEvent::Down { x: 100, y: 200 },
            ]
        );
        assert_eq!(pointer.phase(), PointerPhase::Held);

        assert!(pointer.update(&hold(100, 200), 16, &p).is_empty());

        let events = pointer.update(&release(100, 200), 120, &p);
        assert_eq!(events, vec![PointerEvent::Up { x: 100, y: 200 }]);
        assert_eq!(pointer.phase(), PointerPhase::Idle);
    }

    #[test]
    fn test_sub_poll_tap_emits_nothing() {
        let mut pointer = machine();
        let p = overlay();
        let tap = TouchState {
            x: 300,
            y: 300,
            pressed: true,
            released: true,
            held: false,
        };
        assert!(pointer.update(&tap, 0, &p).is_empty());
        assert_eq!(pointer.phase(), PointerPhase::Idle);
        assert!(pointer.update(&idle(300, 300), 16, &p).is_empty());
    }

    #[test]
    fn test_long_press_with_drag() {
        let mut pointer = machine();
        let p = overlay();

        let mut events = pointer.update(&press(50, 50), 1000, &p);
        events.extend(pointer.update(&hold(50, 50), 1016, &p));
        events.extend(pointer.update(&hold(60, 55), 1100, &p));
        events.extend(pointer.update(&hold(60, 55), 1200, &p));
        events.extend(pointer.update(&hold(70, 58), 1300, &p));
        events.extend(pointer.update(&release(70, 58), 1600, &p));

        assert_eq!(
            events,
            vec![
                PointerEvent::Move { x: 50, y: 50 },
                PointerEvent::Down { x: 50, y: 50 },
                PointerEvent::Move { x: 60, y: 55 },
                PointerEvent::Move { x: 70, y: 58 },
                PointerEvent::SecondaryUp { x: 70, y: 58 },
            ]
        );
    }

    #[test]
    fn test_release_at_threshold_is_secondary() {
        let mut pointer = machine();
        let p = overlay();
        pointer.update(&press(10, 10), 0, &p);
        let events = pointer.update(&release(10, 10), 500, &p);
        assert_eq!(events, vec![PointerEvent::SecondaryUp { x: 10, y: 10 }]);
    }

    #[test]
    fn test_held_without_pressed_flag_starts_interaction() {
        let mut pointer = machine();
        let events = pointer.update(&hold(5, 6), 0, &overlay());
        assert_eq!(events.len(), 2);
        assert_eq!(pointer.phase(), PointerPhase::Held);
    }

    #[test]
    fn test_content_surface_mapping() {
        let mut pointer = machine();
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, BezelMargins::default());
        let p = FixedPresentation::content(scaling);

        let events = pointer.update(&press(16, 0), 0, &p);
        assert_eq!(events[0], PointerEvent::Move { x: 0, y: 0 });
        let events = pointer.update(&release(799, 479), 50, &p);
        // Up is reported at the last observed position, not the release sample
        assert_eq!(events, vec![PointerEvent::Up { x: 0, y: 0 }]);
    }

    #[test]
    fn test_bottom_right_triple_tap_opens_menu() {
        let mut pointer = machine();
        let p = overlay();
        let mut t = 0;
        for _ in 0..2 {
            let events = pointer.update(&press(780, 460), t, &p);
            assert_eq!(events.len(), 2);
            pointer.update(&release(780, 460), t + 80, &p);
            t += 200;
        }

        let events = pointer.update(&press(780, 460), t, &p);
        let chord = KeyChord::open_menu();
        assert_eq!(
            events,
            vec![PointerEvent::KeyDown { chord }, PointerEvent::KeyUp { chord }]
        );
        assert_eq!(pointer.phase(), PointerPhase::AwaitingRelease);

        // Remaining frames of the gesture tap are swallowed
        assert!(pointer.update(&hold(780, 460), t + 16, &p).is_empty());
        assert!(pointer.update(&release(780, 460), t + 80, &p).is_empty());
        assert_eq!(pointer.phase(), PointerPhase::Idle);

        // A fourth tap right away is an ordinary click
        let events = pointer.update(&press(780, 460), t + 200, &p);
        assert_eq!(events[1], PointerEvent::Down { x: 780, y: 460 });
    }

    #[test]
    fn test_bottom_left_triple_tap_shows_keyboard() {
        let mut pointer = machine();
        let p = overlay();
        for t in [0, 300] {
            pointer.update(&press(10, 470), t, &p);
            pointer.update(&release(10, 470), t + 50, &p);
        }
        let tap = TouchState {
            x: 10,
            y: 470,
            pressed: true,
            released: true,
            held: false,
        };
        let events = pointer.update(&tap, 600, &p);
        assert_eq!(
            events,
            vec![PointerEvent::Action {
                action: SystemAction::ShowKeyboard
            }]
        );
        assert_eq!(pointer.phase(), PointerPhase::Idle);
    }

    #[test]
    fn test_overlay_toggle_mid_hold_balances_down() {
        let mut pointer = machine();
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, BezelMargins::default());
        let mut p = FixedPresentation::content(scaling);

        pointer.update(&press(16, 0), 0, &p);
        assert_eq!(pointer.phase(), PointerPhase::Held);

        p.set_overlay_active(true);
        let events = pointer.update(&hold(400, 240), 50, &p);
        // Up is mapped into the surface that received the down
        assert_eq!(events, vec![PointerEvent::Up { x: 0, y: 0 }]);
        assert_eq!(pointer.phase(), PointerPhase::AwaitingRelease);

        assert!(pointer.update(&hold(410, 240), 66, &p).is_empty());
        assert!(pointer.update(&release(410, 240), 90, &p).is_empty());

        let events = pointer.update(&press(400, 240), 200, &p);
        assert_eq!(events[0], PointerEvent::Move { x: 400, y: 240 });
    }

    fn repress(x: i32, y: i32) -> TouchState {
        TouchState {
            x,
            y,
            pressed: true,
            released: true,
            held: true,
        }
    }

    #[test]
    fn test_repress_after_gesture_starts_new_touch() {
        let mut pointer = machine();
        let p = overlay();
        for t in [0, 200] {
            pointer.update(&press(780, 460), t, &p);
            pointer.update(&release(780, 460), t + 80, &p);
        }
        let events = pointer.update(&press(780, 460), 400, &p);
        assert!(matches!(events[0], PointerEvent::KeyDown { .. }));
        assert_eq!(pointer.phase(), PointerPhase::AwaitingRelease);

        // Finger lifted and pressed again within one poll
        let events = pointer.update(&repress(400, 240), 450, &p);
        assert_eq!(
            events,
            vec![
                PointerEvent::Move { x: 400, y: 240 },
                PointerEvent::Down { x: 400, y: 240 },
            ]
        );
        assert_eq!(pointer.phase(), PointerPhase::Held);

        assert!(pointer.update(&hold(400, 240), 466, &p).is_empty());
        let events = pointer.update(&release(400, 240), 520, &p);
        assert_eq!(events, vec![PointerEvent::Up { x: 400, y: 240 }]);
    }

    #[test]
    fn test_repress_after_overlay_toggle_starts_new_touch() {
        let mut pointer = machine();
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, BezelMargins::default());
        let mut p = FixedPresentation::content(scaling);

        pointer.update(&press(16, 0), 0, &p);
        p.set_overlay_active(true);
        assert_eq!(pointer.update(&hold(16, 0), 16, &p).len(), 1);
        assert_eq!(pointer.phase(), PointerPhase::AwaitingRelease);

        let events = pointer.update(&repress(500, 300), 32, &p);
        assert_eq!(
            events,
            vec![
                PointerEvent::Move { x: 500, y: 300 },
                PointerEvent::Down { x: 500, y: 300 },
            ]
        );
        assert_eq!(pointer.phase(), PointerPhase::Held);
    }

    #[test]
    fn test_repress_while_held_ends_and_starts_touch() {
        let mut pointer = machine();
        let p = overlay();
        pointer.update(&press(100, 100), 0, &p);

        let events = pointer.update(&repress(200, 150), 100, &p);
        assert_eq!(
            events,
            vec![
                PointerEvent::Up { x: 100, y: 100 },
                PointerEvent::Move { x: 200, y: 150 },
                PointerEvent::Down { x: 200, y: 150 },
            ]
        );
        assert_eq!(pointer.phase(), PointerPhase::Held);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&PointerEvent::Down { x: 1, y: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"down","x":1,"y":2}"#);
        let json = serde_json::to_string(&PointerEvent::KeyDown {
            chord: KeyChord::open_menu(),
        })
        .unwrap();
        assert!(json.contains(r#""key":"F5""#));
    }
}
