//! Touch session: device ownership and debounced touch state
//!
//! A [`TouchSession`] owns one [`EventSource`] and turns its frames into a
//! [`TouchState`] snapshot in screen pixels. Consumers call
//! [`poll`](TouchSession::poll) once per loop iteration and read
//! [`state`](TouchSession::state); one-shot prompts use
//! [`wait_for_press`](TouchSession::wait_for_press).
//!
//! A session has a single owner. Polling and blocking waits must never be
//! interleaved from different threads; hand other threads a copy of the
//! [`TouchState`] instead.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace};

use crate::calibration::CalibrationModel;
use crate::error::Result;
use crate::event::{EvdevSource, EventSource, RAW_AXIS_MAX};
use crate::frame::{FrameAssembler, RawSample, TouchEdge, TouchFrame};

/// Default panel width in pixels
pub const DEFAULT_SCREEN_WIDTH: i32 = 800;
/// Default panel height in pixels
pub const DEFAULT_SCREEN_HEIGHT: i32 = 480;

/// Snapshot of the touch after the most recent poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TouchState {
    /// Corrected X in screen pixels
    pub x: i32,
    /// Corrected Y in screen pixels
    pub y: i32,
    /// A press edge was seen during the last poll
    pub pressed: bool,
    /// A release edge was seen during the last poll
    pub released: bool,
    /// The finger is down
    pub held: bool,
}

/// Linearly scale a raw axis value onto `0..extent`
#[must_use]
pub fn scale_axis(raw: i32, extent: i32) -> i32 {
    let scaled = raw.clamp(0, RAW_AXIS_MAX) * extent / RAW_AXIS_MAX;
    scaled.clamp(0, (extent - 1).max(0))
}

/// An open touch device and its current state
pub struct TouchSession<S: EventSource = EvdevSource> {
    source: S,
    assembler: FrameAssembler,
    calibration: CalibrationModel,
    screen_width: i32,
    screen_height: i32,
    state: TouchState,
}

impl TouchSession<EvdevSource> {
    /// Open the touch device at `path`
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::DeviceUnavailable`](crate::TouchError::DeviceUnavailable)
    /// if the node cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let source = EvdevSource::open(path)?;
        Ok(Self::with_source(source))
    }
}

impl<S: EventSource> TouchSession<S> {
    /// Wrap an already-open source, uncalibrated, at the default screen size
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            assembler: FrameAssembler::new(),
            calibration: CalibrationModel::identity(),
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            state: TouchState::default(),
        }
    }

    /// Set the screen size used for scaling and calibration
    pub fn set_screen_size(&mut self, width: i32, height: i32) {
        debug!("Touch screen size set to {}x{}", width, height);
        self.screen_width = width;
        self.screen_height = height;
    }

    /// Screen size as `(width, height)`
    #[must_use]
    pub fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    /// Replace the calibration model
    pub fn set_calibration(&mut self, calibration: CalibrationModel) {
        self.calibration = calibration;
    }

    /// Current calibration model
    #[must_use]
    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    /// Mutable access to the calibration model
    pub fn calibration_mut(&mut self) -> &mut CalibrationModel {
        &mut self.calibration
    }

    /// Load and enable calibration from `path`
    ///
    /// Never fails: a missing or malformed file leaves the session
    /// uncalibrated. Returns whether calibration is now active.
    pub fn load_calibration(&mut self, path: impl AsRef<Path>) -> bool {
        self.calibration = CalibrationModel::load_or_identity(path);
        self.calibration.is_enabled()
    }

    /// Latest touch state
    #[must_use]
    pub fn state(&self) -> TouchState {
        self.state
    }

    /// Underlying source
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the underlying source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Drain pending records and update the touch state
    ///
    /// `pressed` and `released` describe only this call; `held` persists
    /// until the opposite edge. Returns the number of records consumed, zero
    /// meaning nothing new arrived.
    ///
    /// # Errors
    ///
    /// Returns error if reading the device fails
    pub fn poll(&mut self) -> Result<usize> {
        self.state.pressed = false;
        self.state.released = false;
        self.assembler.begin_pass();

        let mut consumed = 0;
        loop {
            let batch = self.source.fetch()?;
            if batch.is_empty() {
                break;
            }
            consumed += batch.len();
            for event in &batch {
                if let Some(frame) = self.assembler.push(event) {
                    self.apply_frame(frame);
                }
            }
        }

        if consumed > 0 {
            trace!("Touch poll consumed {} records: {:?}", consumed, self.state);
        }
        Ok(consumed)
    }

    /// Block until the next press with valid coordinates
    ///
    /// The source is switched to blocking mode for the duration of the call
    /// and restored to non-blocking before returning, also on error. There is
    /// no timeout. The session's `pressed`/`held`/`released` bookkeeping is
    /// not touched.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be switched or read
    pub fn wait_for_press(&mut self) -> Result<(i32, i32)> {
        self.source.set_blocking(true)?;
        let outcome = self.block_until_press();
        let restored = self.source.set_blocking(false);
        let position = outcome?;
        restored?;
        debug!("Touch press at ({}, {})", position.0, position.1);
        Ok(position)
    }

    /// Release the device
    pub fn close(self) {
        debug!("Touch session closed");
        drop(self.source);
    }

    fn block_until_press(&mut self) -> Result<(i32, i32)> {
        self.assembler.begin_pass();
        loop {
            let mut found = None;
            for event in self.source.fetch()? {
                if let Some(frame) = self.assembler.push(&event) {
                    if found.is_none() && frame.edge == TouchEdge::Press && frame.fresh {
                        found = Some(self.to_screen(frame.sample));
                    }
                }
            }
            if let Some(position) = found {
                return Ok(position);
            }
        }
    }

    fn apply_frame(&mut self, frame: TouchFrame) {
        match frame.edge {
            TouchEdge::Press => {
                self.state.pressed = true;
                self.state.held = true;
                if frame.fresh {
                    self.move_to(frame.sample);
                } else {
                    trace!(
                        "Press without coordinates, keeping ({}, {})",
                        self.state.x,
                        self.state.y
                    );
                }
            }
            TouchEdge::Release => {
                self.state.released = true;
                self.state.held = false;
            }
            TouchEdge::None => {
                if self.state.held && frame.fresh {
                    self.move_to(frame.sample);
                }
            }
        }
    }

    fn move_to(&mut self, sample: RawSample) {
        let (x, y) = self.to_screen(sample);
        self.state.x = x;
        self.state.y = y;
    }

    fn to_screen(&self, sample: RawSample) -> (i32, i32) {
        let linear_x = scale_axis(sample.x, self.screen_width);
        let linear_y = scale_axis(sample.y, self.screen_height);
        self.calibration
            .correct(self.screen_width, self.screen_height, linear_x, linear_y)
    }
}
