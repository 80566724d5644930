//! Per-corner calibration for the resistive panel
//!
//! The panel's error is non-linear: each corner drifts by a different amount.
//! An offline routine measures the error at the four corners and stores one
//! `(dx, dy)` pixel offset per corner. At runtime the offset for any point is
//! bilinearly interpolated from the four corners and added to the linearly
//! scaled position.
//!
//! ## File format
//!
//! ```text
//! # comments start with '#'
//! tl_x tl_y tr_x tr_y bl_x bl_y br_x br_y
//! top bottom left right
//! ```
//!
//! The second data line (bezel margins) is optional; older files only carry
//! the eight corner offsets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::button::HitRect;

/// Default location of the calibration file
pub const DEFAULT_CALIBRATION_PATH: &str = "/etc/touch_calibration.conf";

const COMMENT_MARKER: char = '#';

/// Errors reading or writing calibration data
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// No calibration file exists at the given path
    #[error("Calibration file {0} not found")]
    NotFound(PathBuf),

    /// The corner offset line could not be parsed
    #[error("Malformed calibration at line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the file
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Reading or writing the file failed
    #[error("Calibration I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CalibrationError {
    /// Whether the file was simply absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Pixel correction measured at one corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerOffset {
    /// Horizontal correction in pixels
    pub dx: i32,
    /// Vertical correction in pixels
    pub dy: i32,
}

impl CornerOffset {
    /// Create a corner offset
    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// Screen-edge regions hidden behind the device casing
///
/// Margins are advisory: they describe where UI should not be placed and
/// never alter touch coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BezelMargins {
    /// Pixels obstructed at the top edge
    pub top: i32,
    /// Pixels obstructed at the bottom edge
    pub bottom: i32,
    /// Pixels obstructed at the left edge
    pub left: i32,
    /// Pixels obstructed at the right edge
    pub right: i32,
}

impl BezelMargins {
    /// Create bezel margins
    #[must_use]
    pub const fn new(top: i32, bottom: i32, left: i32, right: i32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Visible region of a `width` x `height` screen
    #[must_use]
    pub fn safe_area(&self, width: i32, height: i32) -> HitRect {
        HitRect::new(
            self.left,
            self.top,
            width
                .saturating_sub(self.left)
                .saturating_sub(self.right)
                .max(0),
            height
                .saturating_sub(self.top)
                .saturating_sub(self.bottom)
                .max(0),
        )
    }
}

/// Complete calibration record as persisted on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationOffsets {
    /// Top-left corner offset
    pub top_left: CornerOffset,
    /// Top-right corner offset
    pub top_right: CornerOffset,
    /// Bottom-left corner offset
    pub bottom_left: CornerOffset,
    /// Bottom-right corner offset
    pub bottom_right: CornerOffset,
    /// Bezel obstruction margins
    pub margins: BezelMargins,
}

impl CalibrationOffsets {
    /// Whether every corner offset is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.corners().iter().all(|c| *c == CornerOffset::default())
    }

    /// Corner offsets in file order: TL, TR, BL, BR
    #[must_use]
    pub fn corners(&self) -> [CornerOffset; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Derive offsets from an offline measurement run
    ///
    /// `targets` are the screen positions the user was asked to touch and
    /// `measured` the linearly scaled positions actually reported, both in
    /// TL, TR, BL, BR order. Each offset is `target - measured`.
    #[must_use]
    pub fn from_measurements(
        targets: [(i32, i32); 4],
        measured: [(i32, i32); 4],
        margins: BezelMargins,
    ) -> Self {
        let offset = |i: usize| {
            CornerOffset::new(targets[i].0 - measured[i].0, targets[i].1 - measured[i].1)
        };
        Self {
            top_left: offset(0),
            top_right: offset(1),
            bottom_left: offset(2),
            bottom_right: offset(3),
            margins,
        }
    }

    /// Parse the text format
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Malformed`] if the corner line is missing
    /// or does not hold exactly eight integers. A bad margin line only logs
    /// a warning and leaves the margins at zero.
    pub fn parse(text: &str) -> Result<Self, CalibrationError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with(COMMENT_MARKER));

        let Some((line_no, corner_line)) = lines.next() else {
            return Err(CalibrationError::Malformed {
                line: 0,
                reason: "no corner offset line".to_string(),
            });
        };
        let corners = parse_integers::<8>(corner_line).map_err(|reason| {
            CalibrationError::Malformed {
                line: line_no,
                reason,
            }
        })?;

        let margins = match lines.next() {
            Some((line_no, margin_line)) => match parse_integers::<4>(margin_line) {
                Ok([top, bottom, left, right]) => BezelMargins::new(top, bottom, left, right),
                Err(reason) => {
                    warn!(
                        "Ignoring bezel margins at line {}: {}; using zero margins",
                        line_no, reason
                    );
                    BezelMargins::default()
                }
            },
            None => BezelMargins::default(),
        };

        Ok(Self {
            top_left: CornerOffset::new(corners[0], corners[1]),
            top_right: CornerOffset::new(corners[2], corners[3]),
            bottom_left: CornerOffset::new(corners[4], corners[5]),
            bottom_right: CornerOffset::new(corners[6], corners[7]),
            margins,
        })
    }

    /// Load offsets from a calibration file
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::NotFound`] if the file does not exist,
    /// [`CalibrationError::Malformed`] if it cannot be parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CalibrationError::NotFound(path.to_path_buf())
            } else {
                CalibrationError::Io(e)
            }
        })?;
        Self::parse(&contents)
    }

    /// Write offsets to a calibration file, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Io`] if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_string())?;
        debug!("Saved touch calibration to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for CalibrationOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# RoomWizard touch calibration")?;
        writeln!(f, "# tl_x tl_y tr_x tr_y bl_x bl_y br_x br_y")?;
        let corners = self.corners();
        let values: Vec<String> = corners
            .iter()
            .flat_map(|c| [c.dx.to_string(), c.dy.to_string()])
            .collect();
        writeln!(f, "{}", values.join(" "))?;
        writeln!(f, "# bezel: top bottom left right")?;
        writeln!(
            f,
            "{} {} {} {}",
            self.margins.top, self.margins.bottom, self.margins.left, self.margins.right
        )
    }
}

fn parse_integers<const N: usize>(line: &str) -> Result<[i32; N], String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != N {
        return Err(format!("expected {N} integers, found {}", fields.len()));
    }
    let mut values = [0; N];
    for (slot, field) in values.iter_mut().zip(fields) {
        *slot = field
            .parse()
            .map_err(|e| format!("invalid integer {field:?}: {e}"))?;
    }
    Ok(values)
}

/// Positions the user is asked to touch, inset by `margin`, in TL, TR, BL, BR order
#[must_use]
pub fn calibration_targets(width: i32, height: i32, margin: i32) -> [(i32, i32); 4] {
    [
        (margin, margin),
        (width - margin, margin),
        (margin, height - margin),
        (width - margin, height - margin),
    ]
}

/// Applies [`CalibrationOffsets`] to linearly scaled touch positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationModel {
    offsets: CalibrationOffsets,
    enabled: bool,
}

impl CalibrationModel {
    /// Model holding `offsets`, initially disabled
    #[must_use]
    pub fn new(offsets: CalibrationOffsets) -> Self {
        Self {
            offsets,
            enabled: false,
        }
    }

    /// Model that never alters coordinates
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Load the calibration file and enable it, falling back to identity
    ///
    /// A missing file is expected on uncalibrated units and only logged at
    /// debug level; a malformed file is logged as a warning.
    pub fn load_or_identity(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match CalibrationOffsets::load(path) {
            Ok(offsets) => {
                let m = offsets.margins;
                debug!(
                    "Touch calibration loaded from {} (bezel T={} B={} L={} R={})",
                    path.display(),
                    m.top,
                    m.bottom,
                    m.left,
                    m.right
                );
                let mut model = Self::new(offsets);
                model.set_enabled(true);
                model
            }
            Err(CalibrationError::NotFound(_)) => {
                debug!("No touch calibration at {}, using identity", path.display());
                Self::identity()
            }
            Err(e) => {
                warn!("Touch calibration unusable, using identity: {}", e);
                Self::identity()
            }
        }
    }

    /// Turn correction on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether correction is applied
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replace the offsets, keeping the enabled flag
    pub fn set_offsets(&mut self, offsets: CalibrationOffsets) {
        self.offsets = offsets;
    }

    /// Current offsets
    #[must_use]
    pub fn offsets(&self) -> &CalibrationOffsets {
        &self.offsets
    }

    /// Current bezel margins
    #[must_use]
    pub fn margins(&self) -> BezelMargins {
        self.offsets.margins
    }

    /// Correct a linearly scaled position on a `width` x `height` screen
    ///
    /// The corner offsets are bilinearly interpolated at the point's
    /// normalized position, added, and the result clamped to the screen.
    /// When disabled, the input is returned unchanged.
    #[must_use]
    pub fn correct(&self, width: i32, height: i32, linear_x: i32, linear_y: i32) -> (i32, i32) {
        if !self.enabled {
            return (linear_x, linear_y);
        }

        let fx = fraction(linear_x, width);
        let fy = fraction(linear_y, height);
        let o = &self.offsets;

        let top_dx = lerp(o.top_left.dx, o.top_right.dx, fx);
        let bottom_dx = lerp(o.bottom_left.dx, o.bottom_right.dx, fx);
        let dx = top_dx + (bottom_dx - top_dx) * fy;

        let left_dy = lerp(o.top_left.dy, o.bottom_left.dy, fy);
        let right_dy = lerp(o.top_right.dy, o.bottom_right.dy, fy);
        let dy = left_dy + (right_dy - left_dy) * fx;

        (
            offset_clamped(linear_x, dx, width),
            offset_clamped(linear_y, dy, height),
        )
    }
}

fn fraction(value: i32, extent: i32) -> f64 {
    if extent <= 1 {
        return 0.0;
    }
    (f64::from(value) / f64::from(extent - 1)).clamp(0.0, 1.0)
}

fn lerp(a: i32, b: i32, t: f64) -> f64 {
    let a = f64::from(a);
    a + (f64::from(b) - a) * t
}

/// `value + delta`, rounded and clamped onto `0..extent`
#[allow(clippy::cast_possible_truncation)]
fn offset_clamped(value: i32, delta: f64, extent: i32) -> i32 {
    let max = f64::from((extent - 1).max(0));
    (f64::from(value) + delta).round().clamp(0.0, max) as i32
}
