//! Frame assembly from the raw record stream
//!
//! A frame is everything between two `SYN_REPORT` markers. Inside a frame the
//! controller sends axis records first, then the button record, then the
//! marker. The assembler accumulates a frame through three stages:
//!
//! ```text
//! Open --axis--> AxisCaptured --button--> EdgeLatched --sync--> (commit) Open
//!   \______________button_______________/^
//! ```
//!
//! Axis values live in a persistent "last known" sample that is never reset
//! at frame boundaries, so a press whose frame carries no axis payload still
//! commits with the coordinates seen just before it.

use tracing::trace;

use crate::event::{RawEvent, RawRecord};

/// Raw controller coordinates (0..=4095 per axis)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Raw X value
    pub x: i32,
    /// Raw Y value
    pub y: i32,
}

/// Press/release transition carried by a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TouchEdge {
    /// Finger went down
    Press,
    /// Finger lifted
    Release,
    /// No transition in this frame
    #[default]
    None,
}

/// A committed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchFrame {
    /// Last known raw coordinates at the frame boundary
    pub sample: RawSample,
    /// Edge observed in this frame
    pub edge: TouchEdge,
    /// Whether `sample` is backed by axis data from the current pass
    ///
    /// A stale sample must not move the reported position.
    pub fresh: bool,
}

/// Accumulation stage of the frame currently being assembled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameStage {
    /// Nothing received since the last marker
    #[default]
    Open,
    /// Axis data received, no button record yet
    AxisCaptured,
    /// Button record received; waiting for the marker
    EdgeLatched,
}

/// Reconstructs [`TouchFrame`]s from raw records in delivery order
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    last: RawSample,
    seen_x: bool,
    seen_y: bool,
    axis_in_pass: bool,
    stage: FrameStage,
    pending: TouchEdge,
    touching: bool,
}

impl FrameAssembler {
    /// Create an assembler with no known position
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new read pass
    ///
    /// Samples are only considered fresh once an axis record has been seen
    /// during the current pass.
    pub fn begin_pass(&mut self) {
        self.axis_in_pass = false;
    }

    /// Feed one record; returns the committed frame at a marker
    pub fn push(&mut self, event: &RawEvent) -> Option<TouchFrame> {
        match event.record() {
            RawRecord::AxisX(value) => {
                self.last.x = value;
                self.seen_x = true;
                self.capture_axis();
                None
            }
            RawRecord::AxisY(value) => {
                self.last.y = value;
                self.seen_y = true;
                self.capture_axis();
                None
            }
            RawRecord::Button(edge) => {
                self.latch_edge(edge);
                None
            }
            RawRecord::Sync => Some(self.commit()),
            RawRecord::Ignored => None,
        }
    }

    /// Current accumulation stage
    #[must_use]
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Whether the finger is down according to the committed edges
    #[must_use]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Last known raw coordinates
    #[must_use]
    pub fn last_sample(&self) -> RawSample {
        self.last
    }

    fn capture_axis(&mut self) {
        self.axis_in_pass = true;
        if self.stage == FrameStage::Open {
            self.stage = FrameStage::AxisCaptured;
        }
    }

    fn latch_edge(&mut self, edge: TouchEdge) {
        match (edge, self.touching) {
            (TouchEdge::Press, false) => {
                self.touching = true;
                self.pending = match self.pending {
                    TouchEdge::Release => TouchEdge::None,
                    _ => TouchEdge::Press,
                };
            }
            (TouchEdge::Release, true) => {
                self.touching = false;
                self.pending = match self.pending {
                    TouchEdge::Press => TouchEdge::None,
                    _ => TouchEdge::Release,
                };
            }
            (edge, _) => trace!("Ignoring repeated {:?} edge", edge),
        }
        self.stage = FrameStage::EdgeLatched;
    }

    fn commit(&mut self) -> TouchFrame {
        let frame = TouchFrame {
            sample: self.last,
            edge: self.pending,
            fresh: self.axis_in_pass && self.seen_x && self.seen_y,
        };
        trace!(
            "Frame committed: stage={:?} edge={:?} raw=({}, {}) fresh={}",
            self.stage,
            frame.edge,
            frame.sample.x,
            frame.sample.y,
            frame.fresh
        );
        self.pending = TouchEdge::None;
        self.stage = FrameStage::Open;
        frame
    }
}
