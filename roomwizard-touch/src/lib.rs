//! RoomWizard Touch - Resistive Touchscreen Input Pipeline
//!
//! This crate turns the raw event stream of the RoomWizard's single-point
//! resistive panel into touch state and GUI events.
//!
//! ## Architecture
//!
//! ```text
//! device -> FrameAssembler -> linear scale -> CalibrationModel -> TouchSession
//!                                                                    |
//!                                  +---------------------------------+
//!                                  |                                 |
//!                           ButtonDebouncer          PointerEventStateMachine
//!                                                     (+ CornerGestureDetector)
//! ```
//!
//! - [`event`]: raw records and the sources that deliver them
//! - [`frame`]: reconstruction of frames from the record stream
//! - [`calibration`]: per-corner bilinear correction and its text file
//! - [`session`]: device ownership and the polled [`TouchState`]
//! - [`button`]: debounced hit-testing for immediate-mode UI
//! - [`pointer`]: move/down/up synthesis for hosted applications
//! - [`gesture`]: corner triple-tap recognition
//! - [`surface`]: mapping panel coordinates into overlay or content space
//!
//! ## Usage Example
//!
//! ```no_run
//! use roomwizard_touch::{FixedPresentation, TouchConfig, TouchSession};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TouchConfig::default();
//!     let mut session = TouchSession::open(&config.device.path)?;
//!     session.set_screen_size(config.device.screen_width, config.device.screen_height);
//!     session.load_calibration(&config.calibration.path);
//!
//!     let mut pointer = config.pointer_machine();
//!     let presentation = FixedPresentation::default();
//!     let mut now_ms = 0;
//!
//!     loop {
//!         session.poll()?;
//!         for event in pointer.update(&session.state(), now_ms, &presentation) {
//!             println!("{event:?}");
//!         }
//!         now_ms += 16;
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```
//!
//! ## Threading
//!
//! Everything is single-threaded and driven by the caller's loop. A
//! [`TouchSession`] has one owner; other threads should receive copies of
//! [`TouchState`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod button;
pub mod calibration;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod gesture;
pub mod pointer;
pub mod session;
pub mod surface;

pub use button::{is_touched, ButtonDebouncer, HitRect};
pub use calibration::{
    BezelMargins, CalibrationError, CalibrationModel, CalibrationOffsets, CornerOffset,
};
pub use config::TouchConfig;
pub use error::{Result, TouchError};
pub use event::{EvdevSource, EventSource, RawEvent, ScriptedSource};
pub use frame::{FrameAssembler, FrameStage, RawSample, TouchEdge, TouchFrame};
pub use gesture::{Corner, CornerGestureDetector, CornerZones, GestureOutcome};
pub use pointer::{
    Key, KeyChord, Modifiers, PointerEvent, PointerEventStateMachine, PointerPhase, SystemAction,
};
pub use session::{TouchSession, TouchState};
pub use surface::{ContentScaling, FixedPresentation, Presentation, Surface, SurfaceMapper};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
