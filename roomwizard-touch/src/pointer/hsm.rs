//! Hierarchical state machine behind [`PointerEventStateMachine`](super::PointerEventStateMachine)
//!
//! Events are emitted in panel coordinates; the wrapper maps them into the
//! active surface.

use statig::prelude::*;
use tracing::{debug, trace};

use super::{KeyChord, PointerEvent, PointerPhase, SystemAction};
use crate::gesture::{CornerGestureDetector, GestureAction, GestureOutcome};
use crate::session::TouchState;

#[derive(Debug, Clone, Copy)]
pub(super) enum PointerInput {
    Sample { state: TouchState, now_ms: u64 },
    SurfaceChanged,
}

#[derive(Default)]
pub(super) struct DispatchContext {
    pub(super) emitted: Vec<PointerEvent>,
}

pub(super) struct PointerHsm {
    pub(super) long_press_ms: u64,
    gestures: CornerGestureDetector,
    press_point: (i32, i32),
    press_ms: u64,
    last_point: (i32, i32),
    pub(super) phase: PointerPhase,
}

impl PointerHsm {
    pub(super) fn new(long_press_ms: u64, gestures: CornerGestureDetector) -> Self {
        Self {
            long_press_ms,
            gestures,
            press_point: (0, 0),
            press_ms: 0,
            last_point: (0, 0),
            phase: PointerPhase::Idle,
        }
    }

    fn enter(&mut self, phase: PointerPhase) -> Outcome<State> {
        self.phase = phase;
        match phase {
            PointerPhase::Idle => Transition(State::idle()),
            PointerPhase::PressPending => Transition(State::press_pending()),
            PointerPhase::Held => Transition(State::held()),
            PointerPhase::AwaitingRelease => Transition(State::awaiting_release()),
        }
    }

    fn emit_gesture(context: &mut DispatchContext, action: GestureAction) {
        match action {
            GestureAction::OpenSystemMenu => {
                let chord = KeyChord::open_menu();
                context.emitted.push(PointerEvent::KeyDown { chord });
                context.emitted.push(PointerEvent::KeyUp { chord });
            }
            GestureAction::ShowKeyboard => {
                context.emitted.push(PointerEvent::Action {
                    action: SystemAction::ShowKeyboard,
                });
            }
        }
    }
}

#[state_machine(initial = "State::idle()")]
impl PointerHsm {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &PointerInput) -> Outcome<State> {
        let PointerInput::Sample { state, now_ms } = *event else {
            return Handled;
        };
        if !(state.pressed || state.held) {
            return Handled;
        }

        if let GestureOutcome::Fired(corner) = self.gestures.observe_press(state.x, state.y, now_ms)
        {
            Self::emit_gesture(context, corner.action());
            return if state.held {
                self.enter(PointerPhase::AwaitingRelease)
            } else {
                Handled
            };
        }

        if state.released && !state.held {
            trace!("Tap shorter than one poll, dropped");
            return Handled;
        }

        self.press_point = (state.x, state.y);
        self.last_point = self.press_point;
        self.press_ms = now_ms;
        context.emitted.push(PointerEvent::Move {
            x: state.x,
            y: state.y,
        });
        self.enter(PointerPhase::PressPending)
    }

    #[state]
    fn press_pending(
        &mut self,
        context: &mut DispatchContext,
        event: &PointerInput,
    ) -> Outcome<State> {
        match *event {
            PointerInput::Sample { state, .. } => {
                if state.held {
                    let (x, y) = self.press_point;
                    context.emitted.push(PointerEvent::Down { x, y });
                    self.enter(PointerPhase::Held)
                } else {
                    self.enter(PointerPhase::Idle)
                }
            }
            PointerInput::SurfaceChanged => self.enter(PointerPhase::AwaitingRelease),
        }
    }

    #[state]
    fn held(&mut self, context: &mut DispatchContext, event: &PointerInput) -> Outcome<State> {
        match *event {
            PointerInput::Sample { state, now_ms } => {
                if state.released || !state.held {
                    let (x, y) = self.last_point;
                    let duration = now_ms.saturating_sub(self.press_ms);
                    if duration < self.long_press_ms {
                        context.emitted.push(PointerEvent::Up { x, y });
                    } else {
                        debug!("Long press ({} ms) released as secondary click", duration);
                        context.emitted.push(PointerEvent::SecondaryUp { x, y });
                    }
                    return self.enter(PointerPhase::Idle);
                }
                if (state.x, state.y) != self.last_point {
                    self.last_point = (state.x, state.y);
                    context.emitted.push(PointerEvent::Move {
                        x: state.x,
                        y: state.y,
                    });
                }
                Handled
            }
            PointerInput::SurfaceChanged => {
                let (x, y) = self.last_point;
                context.emitted.push(PointerEvent::Up { x, y });
                self.enter(PointerPhase::AwaitingRelease)
            }
        }
    }

    #[state]
    fn awaiting_release(&mut self, event: &PointerInput) -> Outcome<State> {
        match *event {
            PointerInput::Sample { state, .. } if state.released || !state.held => {
                self.enter(PointerPhase::Idle)
            }
            _ => Handled,
        }
    }
}
