//! Touch pipeline configuration
//!
//! Settings live in a TOML file. Every field has a default so a missing file,
//! or a file with only some sections, is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::button::{ButtonDebouncer, DEFAULT_DEBOUNCE_MS};
use crate::calibration::DEFAULT_CALIBRATION_PATH;
use crate::error::{Result, TouchError};
use crate::gesture::{CornerGestureDetector, CornerZones, DEFAULT_WINDOW_MS, DEFAULT_ZONE_SIZE};
use crate::pointer::{PointerEventStateMachine, DEFAULT_LONG_PRESS_MS};
use crate::session::{DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::surface::SurfaceMapper;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchConfig {
    /// Input device and panel
    #[serde(default)]
    pub device: DeviceConfig,

    /// Calibration file
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Pointer event synthesis
    #[serde(default)]
    pub pointer: PointerConfig,

    /// Corner gestures
    #[serde(default)]
    pub gestures: GestureConfig,

    /// On-screen buttons
    #[serde(default)]
    pub buttons: ButtonConfig,
}

/// Input device and panel geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Evdev node of the touch controller
    #[serde(default = "default_device_path")]
    pub path: PathBuf,

    /// Panel width in pixels
    #[serde(default = "default_screen_width")]
    pub screen_width: i32,

    /// Panel height in pixels
    #[serde(default = "default_screen_height")]
    pub screen_height: i32,
}

/// Calibration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Calibration file location
    #[serde(default = "default_calibration_path")]
    pub path: PathBuf,

    /// Inset of the calibration targets from each screen edge
    #[serde(default = "default_target_margin")]
    pub target_margin: i32,
}

/// Pointer event settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerConfig {
    /// Hold time after which a release is a secondary click
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,

    /// Width of the hosted application's content canvas
    #[serde(default = "default_content_width")]
    pub content_width: i32,

    /// Height of the hosted application's content canvas
    #[serde(default = "default_content_height")]
    pub content_height: i32,
}

/// Corner gesture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Recognise corner triple taps
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Window the three taps must fall within
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Edge length of each corner zone in pixels
    #[serde(default = "default_zone_size")]
    pub zone_size: i32,
}

/// On-screen button settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Cooldown between accepted presses
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/input/event0")
}

fn default_screen_width() -> i32 {
    DEFAULT_SCREEN_WIDTH
}

fn default_screen_height() -> i32 {
    DEFAULT_SCREEN_HEIGHT
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from(DEFAULT_CALIBRATION_PATH)
}

fn default_target_margin() -> i32 {
    40
}

fn default_long_press_ms() -> u64 {
    DEFAULT_LONG_PRESS_MS
}

fn default_content_width() -> i32 {
    320
}

fn default_content_height() -> i32 {
    200
}

fn default_true() -> bool {
    true
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_zone_size() -> i32 {
    DEFAULT_ZONE_SIZE
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: default_calibration_path(),
            target_margin: default_target_margin(),
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            long_press_ms: default_long_press_ms(),
            content_width: default_content_width(),
            content_height: default_content_height(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            window_ms: default_window_ms(),
            zone_size: default_zone_size(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl TouchConfig {
    /// Default config file location: `<config dir>/roomwizard/touch.toml`
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("roomwizard")
            .join("touch.toml")
    }

    /// Load configuration from `path`, using defaults if it does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or fails validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if serialization or writing fails
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`TouchError::InvalidConfiguration`] naming the bad field
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.device.screen_width > 0, "device.screen_width must be positive"),
            (self.device.screen_height > 0, "device.screen_height must be positive"),
            (self.pointer.content_width > 0, "pointer.content_width must be positive"),
            (self.pointer.content_height > 0, "pointer.content_height must be positive"),
            (self.gestures.zone_size > 0, "gestures.zone_size must be positive"),
            (
                self.calibration.target_margin >= 0,
                "calibration.target_margin must not be negative",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(TouchError::InvalidConfiguration(
                (*message).to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Corner gesture detector for this panel
    #[must_use]
    pub fn gesture_detector(&self) -> CornerGestureDetector {
        let zones = CornerZones::new(
            self.device.screen_width,
            self.device.screen_height,
            self.gestures.zone_size,
        );
        let mut detector = CornerGestureDetector::new(zones, self.gestures.window_ms);
        detector.set_enabled(self.gestures.enabled);
        detector
    }

    /// Surface mapper for this panel and content canvas
    #[must_use]
    pub fn surface_mapper(&self) -> SurfaceMapper {
        SurfaceMapper::new(
            self.device.screen_width,
            self.device.screen_height,
            self.pointer.content_width,
            self.pointer.content_height,
        )
    }

    /// Pointer state machine with these settings
    #[must_use]
    pub fn pointer_machine(&self) -> PointerEventStateMachine {
        PointerEventStateMachine::with_settings(
            self.surface_mapper(),
            self.pointer.long_press_ms,
            self.gesture_detector(),
        )
    }

    /// Button debouncer with the configured cooldown
    #[must_use]
    pub fn button_debouncer(&self) -> ButtonDebouncer {
        ButtonDebouncer::new(self.buttons.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TouchConfig::default();
        assert_eq!(config.device.path, PathBuf::from("/dev/input/event0"));
        assert_eq!(config.device.screen_width, 800);
        assert_eq!(config.device.screen_height, 480);
        assert_eq!(config.pointer.long_press_ms, 500);
        assert_eq!(config.gestures.window_ms, 1200);
        assert_eq!(config.gestures.zone_size, 80);
        assert_eq!(config.buttons.debounce_ms, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: TouchConfig = toml::from_str(
            r#"
            [device]
            path = "/dev/input/event3"

            [gestures]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.device.path, PathBuf::from("/dev/input/event3"));
        assert_eq!(config.device.screen_width, 800);
        assert!(!config.gestures.enabled);
        assert_eq!(config.gestures.window_ms, 1200);
        assert_eq!(config.calibration, CalibrationConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TouchConfig::load(dir.path().join("touch.toml")).unwrap();
        assert_eq!(config, TouchConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomwizard").join("touch.toml");

        let mut config = TouchConfig::default();
        config.pointer.long_press_ms = 750;
        config.buttons.debounce_ms = 150;
        config.save(&path).unwrap();

        let loaded = TouchConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = TouchConfig::default();
        config.gestures.zone_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("zone_size"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("touch.toml");
        fs::write(&path, "[device]\nscreen_width = -1\n").unwrap();
        assert!(matches!(
            TouchConfig::load(&path),
            Err(TouchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("touch.toml");
        fs::write(&path, "[device\n").unwrap();
        assert!(matches!(
            TouchConfig::load(&path),
            Err(TouchError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_builders_follow_settings() {
        let mut config = TouchConfig::default();
        config.gestures.enabled = false;
        config.pointer.long_press_ms = 900;
        assert!(!config.gesture_detector().is_enabled());
        assert_eq!(config.pointer_machine().long_press_ms(), 900);
        assert_eq!(config.surface_mapper().content_size(), (320, 200));
        assert_eq!(config.button_debouncer().cooldown_ms(), 200);
    }
}
