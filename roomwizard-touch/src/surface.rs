//! Mapping panel coordinates onto logical surfaces
//!
//! A hosted application draws either a full-resolution overlay (menus,
//! dialogs) or a smaller content canvas that the presentation layer
//! letterboxes into the bezel-free safe area. Touches arrive in panel pixels
//! and must be mapped back into whichever surface is active.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::calibration::BezelMargins;

/// Fixed-point denominator used by the letterbox scale factor
const SCALE_ONE: i64 = 256;

/// Queries answered by the presentation layer
pub trait Presentation {
    /// Whether the full-resolution overlay surface is currently shown
    fn is_overlay_active(&self) -> bool;

    /// Forward mapping currently applied to the content surface
    fn content_scaling(&self) -> ContentScaling;
}

/// Where the content canvas lands on the panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScaling {
    /// Width of the scaled canvas in panel pixels
    pub scaled_width: i32,
    /// Height of the scaled canvas in panel pixels
    pub scaled_height: i32,
    /// Left edge of the scaled canvas
    pub offset_x: i32,
    /// Top edge of the scaled canvas
    pub offset_y: i32,
}

impl ContentScaling {
    /// Aspect-preserving fit of a content canvas into the panel's safe area
    ///
    /// The canvas is scaled by the smaller of the two per-axis ratios and
    /// centred within the area left after removing the bezel margins. A
    /// zero-sized canvas covers the whole safe area.
    #[must_use]
    pub fn letterbox(
        panel_width: i32,
        panel_height: i32,
        content_width: i32,
        content_height: i32,
        margins: BezelMargins,
    ) -> Self {
        let safe = margins.safe_area(panel_width, panel_height);

        if content_width <= 0 || content_height <= 0 {
            return Self {
                scaled_width: safe.width,
                scaled_height: safe.height,
                offset_x: safe.x,
                offset_y: safe.y,
            };
        }

        let content_width = i64::from(content_width);
        let content_height = i64::from(content_height);
        let scale = (i64::from(safe.width) * SCALE_ONE / content_width)
            .min(i64::from(safe.height) * SCALE_ONE / content_height);

        // Never larger than the safe area, so the conversion cannot fail
        let scaled_width =
            i32::try_from(content_width * scale / SCALE_ONE).unwrap_or(safe.width);
        let scaled_height =
            i32::try_from(content_height * scale / SCALE_ONE).unwrap_or(safe.height);

        Self {
            scaled_width,
            scaled_height,
            offset_x: safe.x.saturating_add((safe.width - scaled_width) / 2),
            offset_y: safe.y.saturating_add((safe.height - scaled_height) / 2),
        }
    }
}

/// Logical surface a touch is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// Full panel resolution, identity mapping
    Overlay,
    /// Letterboxed content canvas
    Content,
}

/// Inverse of the presentation layer's forward mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceMapper {
    panel_width: i32,
    panel_height: i32,
    content_width: i32,
    content_height: i32,
}

impl SurfaceMapper {
    /// Create a mapper for a panel and a content canvas
    #[must_use]
    pub fn new(
        panel_width: i32,
        panel_height: i32,
        content_width: i32,
        content_height: i32,
    ) -> Self {
        Self {
            panel_width,
            panel_height,
            content_width,
            content_height,
        }
    }

    /// Update the content canvas size when the application changes mode
    pub fn set_content_size(&mut self, width: i32, height: i32) {
        trace!("Content surface resized to {}x{}", width, height);
        self.content_width = width;
        self.content_height = height;
    }

    /// Content canvas size
    #[must_use]
    pub fn content_size(&self) -> (i32, i32) {
        (self.content_width, self.content_height)
    }

    /// Panel size
    #[must_use]
    pub fn panel_size(&self) -> (i32, i32) {
        (self.panel_width, self.panel_height)
    }

    /// Surface that will receive touches right now
    #[must_use]
    pub fn active_surface(&self, presentation: &dyn Presentation) -> Surface {
        if presentation.is_overlay_active() {
            Surface::Overlay
        } else {
            Surface::Content
        }
    }

    /// Map a panel coordinate into the active surface
    #[must_use]
    pub fn map(&self, presentation: &dyn Presentation, x: i32, y: i32) -> (i32, i32) {
        match self.active_surface(presentation) {
            Surface::Overlay => (
                clamp_extent(x, self.panel_width),
                clamp_extent(y, self.panel_height),
            ),
            Surface::Content => self.map_content(presentation.content_scaling(), x, y),
        }
    }

    fn map_content(&self, scaling: ContentScaling, x: i32, y: i32) -> (i32, i32) {
        let rel_x = i64::from(x) - i64::from(scaling.offset_x);
        let rel_y = i64::from(y) - i64::from(scaling.offset_y);

        let (cx, cy) = if scaling.scaled_width > 0 && scaling.scaled_height > 0 {
            (
                rel_x * i64::from(self.content_width) / i64::from(scaling.scaled_width),
                rel_y * i64::from(self.content_height) / i64::from(scaling.scaled_height),
            )
        } else {
            (rel_x, rel_y)
        };

        (
            clamp_extent(cx, self.content_width),
            clamp_extent(cy, self.content_height),
        )
    }
}

fn clamp_extent(value: impl Into<i64>, extent: i32) -> i32 {
    let max = (extent - 1).max(0);
    i32::try_from(value.into().clamp(0, i64::from(max))).unwrap_or(max)
}

/// Presentation state set explicitly by the caller
///
/// Useful for hosts that track the overlay flag themselves, and for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedPresentation {
    /// Whether the overlay is shown
    pub overlay_active: bool,
    /// Content surface placement
    pub scaling: ContentScaling,
}

impl FixedPresentation {
    /// Content surface shown with the given placement
    #[must_use]
    pub fn content(scaling: ContentScaling) -> Self {
        Self {
            overlay_active: false,
            scaling,
        }
    }

    /// Overlay surface shown
    #[must_use]
    pub fn overlay(scaling: ContentScaling) -> Self {
        Self {
            overlay_active: true,
            scaling,
        }
    }

    /// Show or hide the overlay
    pub fn set_overlay_active(&mut self, active: bool) {
        self.overlay_active = active;
    }
}

impl Presentation for FixedPresentation {
    fn is_overlay_active(&self) -> bool {
        self.overlay_active
    }

    fn content_scaling(&self) -> ContentScaling {
        self.scaling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_without_bezel() {
        // 320x200 into 800x480: height-limited, scale = 480*256/200 = 614
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, BezelMargins::default());
        assert_eq!(scaling.scaled_width, 767);
        assert_eq!(scaling.scaled_height, 479);
        assert_eq!(scaling.offset_x, 16);
        assert_eq!(scaling.offset_y, 0);
    }

    #[test]
    fn test_letterbox_respects_bezel() {
        let margins = BezelMargins::new(10, 10, 20, 20);
        let scaling = ContentScaling::letterbox(800, 480, 640, 480, margins);
        // safe 760x460; scale_x = 304, scale_y = 245
        assert_eq!(scaling.scaled_width, 612);
        assert_eq!(scaling.scaled_height, 459);
        assert_eq!(scaling.offset_x, 20 + (760 - 612) / 2);
        assert_eq!(scaling.offset_y, 10);
    }

    #[test]
    fn test_letterbox_zero_content_fills_safe_area() {
        let margins = BezelMargins::new(5, 6, 7, 8);
        let scaling = ContentScaling::letterbox(800, 480, 0, 0, margins);
        assert_eq!(
            scaling,
            ContentScaling {
                scaled_width: 785,
                scaled_height: 469,
                offset_x: 7,
                offset_y: 5,
            }
        );
    }

    #[test]
    fn test_overlay_mapping_is_clamped_identity() {
        let mapper = SurfaceMapper::new(800, 480, 320, 200);
        let presentation = FixedPresentation::overlay(ContentScaling::default());
        assert_eq!(mapper.map(&presentation, 123, 456), (123, 456));
        assert_eq!(mapper.map(&presentation, -5, 900), (0, 479));
        assert_eq!(mapper.active_surface(&presentation), Surface::Overlay);
    }

    #[test]
    fn test_content_mapping_inverts_letterbox() {
        let mapper = SurfaceMapper::new(800, 480, 320, 200);
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, BezelMargins::default());
        let presentation = FixedPresentation::content(scaling);

        assert_eq!(mapper.map(&presentation, 16, 0), (0, 0));
        // Centre of the canvas
        let (x, y) = mapper.map(&presentation, 16 + 767 / 2, 479 / 2);
        assert_eq!((x, y), (159, 99));
        // Inside the left letterbox bar clamps to the canvas edge
        assert_eq!(mapper.map(&presentation, 3, 100).0, 0);
        assert_eq!(mapper.map(&presentation, 799, 479), (319, 199));
    }

    #[test]
    fn test_content_mapping_without_scaling_only_offsets() {
        let mapper = SurfaceMapper::new(800, 480, 320, 200);
        let presentation = FixedPresentation::content(ContentScaling {
            scaled_width: 0,
            scaled_height: 0,
            offset_x: 10,
            offset_y: 20,
        });
        assert_eq!(mapper.map(&presentation, 50, 60), (40, 40));
    }

    #[test]
    fn test_letterbox_with_extreme_margins() {
        let hidden = BezelMargins::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, hidden);
        assert_eq!((scaling.scaled_width, scaling.scaled_height), (0, 0));

        let inflated = BezelMargins::new(i32::MIN, i32::MIN, i32::MIN, i32::MIN);
        let scaling = ContentScaling::letterbox(800, 480, 320, 200, inflated);
        assert!(scaling.scaled_width > 0 && scaling.scaled_height > 0);

        let mapper = SurfaceMapper::new(800, 480, 320, 200);
        let (x, y) = mapper.map(&FixedPresentation::content(scaling), 400, 240);
        assert!((0..320).contains(&x) && (0..200).contains(&y));
    }
}
