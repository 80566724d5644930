//! Raw input records and the sources that deliver them
//!
//! The panel controller reports every touch as a burst of `(type, code, value)`
//! records in a fixed order:
//!
//! ```text
//! EV_ABS  ABS_X      <0..4095>
//! EV_ABS  ABS_Y      <0..4095>
//! EV_KEY  BTN_TOUCH  1 | 0
//! EV_SYN  SYN_REPORT 0
//! ```
//!
//! Axis records are only sent when a value changes, so a frame may carry one,
//! two or no axis records. [`RawEvent::record`] classifies a record into the
//! handful of kinds the [`FrameAssembler`](crate::frame::FrameAssembler) cares
//! about; everything else (pressure, `MSC_SCAN`, ...) is ignored.
//!
//! [`EventSource`] abstracts the device so the pipeline can run against a
//! real evdev node ([`EvdevSource`]) or a recorded script ([`ScriptedSource`]).

use std::collections::VecDeque;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use evdev::raw_stream::RawDevice;
use evdev::{AbsoluteAxisCode, EventType, KeyCode, SynchronizationCode};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tracing::{debug, trace};

use crate::error::{Result, TouchError};
use crate::frame::TouchEdge;

/// `EV_SYN` event type
pub const EV_SYN: u16 = EventType::SYNCHRONIZATION.0;
/// `EV_KEY` event type
pub const EV_KEY: u16 = EventType::KEY.0;
/// `EV_ABS` event type
pub const EV_ABS: u16 = EventType::ABSOLUTE.0;
/// `ABS_X` axis code
pub const ABS_X: u16 = AbsoluteAxisCode::ABS_X.0;
/// `ABS_Y` axis code
pub const ABS_Y: u16 = AbsoluteAxisCode::ABS_Y.0;
/// `BTN_TOUCH` key code
pub const BTN_TOUCH: u16 = KeyCode::BTN_TOUCH.0;
/// `SYN_REPORT` synchronization code
pub const SYN_REPORT: u16 = SynchronizationCode::SYN_REPORT.0;

/// Largest raw coordinate the 12-bit controller reports on either axis
pub const RAW_AXIS_MAX: i32 = 4095;

/// One low-level input record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Event type (`EV_ABS`, `EV_KEY`, `EV_SYN`, ...)
    pub event_type: u16,
    /// Event code within the type
    pub code: u16,
    /// Event payload
    pub value: i32,
}

/// Classified meaning of a [`RawEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRecord {
    /// X axis update
    AxisX(i32),
    /// Y axis update
    AxisY(i32),
    /// Touch button state change
    Button(TouchEdge),
    /// End of frame marker
    Sync,
    /// Anything the touch pipeline does not consume
    Ignored,
}

impl RawEvent {
    /// Create a record from its raw triple
    #[must_use]
    pub const fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }

    /// `ABS_X` record
    #[must_use]
    pub const fn axis_x(value: i32) -> Self {
        Self::new(EV_ABS, ABS_X, value)
    }

    /// `ABS_Y` record
    #[must_use]
    pub const fn axis_y(value: i32) -> Self {
        Self::new(EV_ABS, ABS_Y, value)
    }

    /// `BTN_TOUCH` record
    #[must_use]
    pub const fn button(pressed: bool) -> Self {
        Self::new(EV_KEY, BTN_TOUCH, if pressed { 1 } else { 0 })
    }

    /// `SYN_REPORT` record
    #[must_use]
    pub const fn sync() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    /// Records for a touch-down at raw `(x, y)`, in controller order
    #[must_use]
    pub fn tap(x: i32, y: i32) -> Vec<Self> {
        vec![
            Self::axis_x(x),
            Self::axis_y(y),
            Self::button(true),
            Self::sync(),
        ]
    }

    /// Records for a drag update to raw `(x, y)` while the finger stays down
    #[must_use]
    pub fn drag(x: i32, y: i32) -> Vec<Self> {
        vec![Self::axis_x(x), Self::axis_y(y), Self::sync()]
    }

    /// Records for a touch-up
    #[must_use]
    pub fn release() -> Vec<Self> {
        vec![Self::button(false), Self::sync()]
    }

    /// Classify this record
    #[must_use]
    pub fn record(&self) -> RawRecord {
        match (self.event_type, self.code) {
            (EV_ABS, ABS_X) => RawRecord::AxisX(self.value),
            (EV_ABS, ABS_Y) => RawRecord::AxisY(self.value),
            (EV_KEY, BTN_TOUCH) => RawRecord::Button(if self.value == 0 {
                TouchEdge::Release
            } else {
                TouchEdge::Press
            }),
            (EV_SYN, SYN_REPORT) => RawRecord::Sync,
            _ => RawRecord::Ignored,
        }
    }
}

impl From<evdev::InputEvent> for RawEvent {
    fn from(event: evdev::InputEvent) -> Self {
        Self::new(event.event_type().0, event.code(), event.value())
    }
}

/// A device that delivers raw touch records
///
/// Sources start in non-blocking mode. Only one reader may own a source.
pub trait EventSource {
    /// Switch between blocking and non-blocking reads
    ///
    /// # Errors
    ///
    /// Returns error if the underlying descriptor flags cannot be changed
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()>;

    /// Read the records that are currently available
    ///
    /// In non-blocking mode an empty vector means no data is pending. In
    /// blocking mode the call waits until at least one record arrives.
    ///
    /// # Errors
    ///
    /// Returns error if the device read fails
    fn fetch(&mut self) -> io::Result<Vec<RawEvent>>;
}

/// Evdev-backed source reading an `/dev/input/eventN` node
pub struct EvdevSource {
    device: RawDevice,
    path: PathBuf,
}

impl EvdevSource {
    /// Open the device node in non-blocking mode
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::DeviceUnavailable`] if the node cannot be opened
    /// or switched to non-blocking mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source: io::Error| TouchError::DeviceUnavailable {
            path: path.clone(),
            source,
        };

        let device = RawDevice::open(&path).map_err(unavailable)?;
        let mut source = Self {
            device,
            path: path.clone(),
        };
        source.set_blocking(false).map_err(unavailable)?;

        debug!(
            "Opened touch device {} ({})",
            path.display(),
            source.device.name().unwrap_or("unknown")
        );
        Ok(source)
    }

    /// Device node this source reads from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for EvdevSource {
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()> {
        let fd = self.device.as_raw_fd();
        let mut flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        flags.set(OFlag::O_NONBLOCK, !blocking);
        fcntl(fd, FcntlArg::F_SETFL(flags))?;
        trace!("Touch device blocking={}", blocking);
        Ok(())
    }

    fn fetch(&mut self) -> io::Result<Vec<RawEvent>> {
        match self.device.fetch_events() {
            Ok(events) => Ok(events.map(RawEvent::from).collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Source that replays pre-recorded batches of records
///
/// Each call to [`fetch`](EventSource::fetch) returns the next batch. Once the
/// script is exhausted, non-blocking reads return nothing and blocking reads
/// fail with `UnexpectedEof` instead of hanging.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    batches: VecDeque<Vec<RawEvent>>,
    blocking: bool,
    mode_changes: usize,
}

impl ScriptedSource {
    /// Create an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a script from a list of batches
    #[must_use]
    pub fn from_batches(batches: impl IntoIterator<Item = Vec<RawEvent>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queue another batch
    pub fn push_batch(&mut self, batch: Vec<RawEvent>) {
        self.batches.push_back(batch);
    }

    /// Whether reads currently block
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Number of blocking-mode switches performed so far
    #[must_use]
    pub fn mode_changes(&self) -> usize {
        self.mode_changes
    }

    /// Batches not yet read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl EventSource for ScriptedSource {
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()> {
        if self.blocking != blocking {
            self.mode_changes += 1;
        }
        self.blocking = blocking;
        Ok(())
    }

    fn fetch(&mut self) -> io::Result<Vec<RawEvent>> {
        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None if self.blocking => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "touch script exhausted",
            )),
            None => Ok(Vec::new()),
        }
    }
}
