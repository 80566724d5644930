//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use roomwizard_touch::calibration::{calibration_targets, BezelMargins, CalibrationOffsets};
use roomwizard_touch::{
    ButtonDebouncer, CalibrationModel, ContentScaling, FixedPresentation, HitRect, TouchConfig,
    TouchSession, TouchState,
};
use serde::Serialize;
use tracing::{info, warn};

/// Poll interval for the interactive loops (about 60 Hz)
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// One JSON output line
#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    t_ms: u64,
    #[serde(rename = "event")]
    payload: &'a T,
}

/// Monotonic millisecond clock with an optional deadline
struct Clock {
    start: Instant,
    limit: Option<Duration>,
}

impl Clock {
    fn new(limit_secs: Option<u64>) -> Self {
        Self {
            start: Instant::now(),
            limit: limit_secs.map(Duration::from_secs),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.start.elapsed() >= limit)
    }
}

fn open_session(config: &TouchConfig) -> Result<TouchSession> {
    let mut session = TouchSession::open(&config.device.path).with_context(|| {
        format!(
            "Cannot open {}; is another program holding the touch device?",
            config.device.path.display()
        )
    })?;
    session.set_screen_size(config.device.screen_width, config.device.screen_height);
    if !session.load_calibration(&config.calibration.path) {
        info!("Running uncalibrated");
    }
    Ok(session)
}

fn print_json<T: Serialize>(t_ms: u64, payload: &T) -> Result<()> {
    let line = serde_json::to_string(&Line { t_ms, payload })?;
    println!("{line}");
    Ok(())
}

fn describe(state: &TouchState) -> String {
    let mut flags = Vec::new();
    if state.pressed {
        flags.push("pressed");
    }
    if state.held {
        flags.push("held");
    }
    if state.released {
        flags.push("released");
    }
    format!("({:3}, {:3}) {}", state.x, state.y, flags.join(" "))
}

/// Print touch state whenever it changes
pub fn monitor(config: &TouchConfig, duration: Option<u64>, json: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let clock = Clock::new(duration);
    let mut last = TouchState::default();

    info!("Monitoring touch input, Ctrl+C to stop");
    while !clock.expired() {
        if session.poll()? > 0 {
            let state = session.state();
            if state != last {
                if json {
                    print_json(clock.now_ms(), &state)?;
                } else {
                    println!("{:>8} ms  {}", clock.now_ms(), describe(&state));
                }
                last = state;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }

    session.close();
    Ok(())
}

/// Wait for `count` presses and print each position
pub fn wait(config: &TouchConfig, count: usize) -> Result<()> {
    let mut session = open_session(config)?;
    for i in 1..=count {
        info!("Waiting for press {}/{}", i, count);
        let (x, y) = session.wait_for_press()?;
        println!("{x} {y}");
    }
    session.close();
    Ok(())
}

/// Print pointer events for the chosen surface
pub fn pointer(
    config: &TouchConfig,
    overlay: bool,
    duration: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config)?;
    let scaling = ContentScaling::letterbox(
        config.device.screen_width,
        config.device.screen_height,
        config.pointer.content_width,
        config.pointer.content_height,
        session.calibration().margins(),
    );
    let presentation = if overlay {
        FixedPresentation::overlay(scaling)
    } else {
        info!(
            "Content surface {}x{} shown at {}x{}+{}+{}",
            config.pointer.content_width,
            config.pointer.content_height,
            scaling.scaled_width,
            scaling.scaled_height,
            scaling.offset_x,
            scaling.offset_y
        );
        FixedPresentation::content(scaling)
    };

    let mut machine = config.pointer_machine();
    let clock = Clock::new(duration);

    info!("Printing pointer events, Ctrl+C to stop");
    while !clock.expired() {
        session.poll()?;
        let now = clock.now_ms();
        for event in machine.update(&session.state(), now, &presentation) {
            if json {
                print_json(now, &event)?;
            } else {
                println!("{now:>8} ms  {event:?}");
            }
        }
        thread::sleep(POLL_INTERVAL);
    }

    session.close();
    Ok(())
}

/// Lay out a grid of equally sized buttons inside `area`
fn button_grid(area: HitRect, columns: i32, rows: i32) -> Vec<HitRect> {
    let width = area.width / columns;
    let height = area.height / rows;
    (0..rows)
        .flat_map(|row| {
            (0..columns).map(move |col| {
                HitRect::new(area.x + col * width, area.y + row * height, width, height)
            })
        })
        .collect()
}

/// Report debounced presses on a grid of buttons
pub fn buttons(config: &TouchConfig, columns: i32, rows: i32, duration: Option<u64>) -> Result<()> {
    if columns <= 0 || rows <= 0 {
        bail!("Grid needs at least one row and one column");
    }

    let mut session = open_session(config)?;
    let area = session
        .calibration()
        .margins()
        .safe_area(config.device.screen_width, config.device.screen_height);
    let rects = button_grid(area, columns, rows);
    let mut debouncers: Vec<ButtonDebouncer> =
        rects.iter().map(|_| config.button_debouncer()).collect();
    let clock = Clock::new(duration);

    info!("{} buttons ready, Ctrl+C to stop", rects.len());
    while !clock.expired() {
        session.poll()?;
        let state = session.state();
        let now = clock.now_ms();
        for (index, (rect, debouncer)) in rects.iter().zip(debouncers.iter_mut()).enumerate() {
            if debouncer.update(rect, state.x, state.y, state.held, now) {
                println!(
                    "Button {} pressed at ({}, {})",
                    index + 1,
                    state.x,
                    state.y
                );
            }
        }
        thread::sleep(POLL_INTERVAL);
    }

    session.close();
    Ok(())
}

/// Measure the corners with calibration disabled and save the offsets
pub fn calibrate(
    config: &TouchConfig,
    output: Option<PathBuf>,
    margin: Option<i32>,
    bezel: Option<Vec<i32>>,
) -> Result<()> {
    let mut session = open_session(config)?;
    let existing_margins = session.calibration().margins();
    session.set_calibration(CalibrationModel::identity());

    let margins = match bezel.as_deref() {
        Some(&[top, bottom, left, right]) => BezelMargins::new(top, bottom, left, right),
        Some(_) => bail!("--bezel takes exactly four values"),
        None => existing_margins,
    };

    let (width, height) = session.screen_size();
    let margin = margin.unwrap_or(config.calibration.target_margin);
    let targets = calibration_targets(width, height, margin);
    let names = ["top-left", "top-right", "bottom-left", "bottom-right"];

    let mut measured = [(0, 0); 4];
    for (i, (&(x, y), name)) in targets.iter().zip(names).enumerate() {
        println!("[{}/4] Touch the {} target at ({}, {})", i + 1, name, x, y);
        measured[i] = session.wait_for_press()?;
        let (mx, my) = measured[i];
        println!("      measured ({mx}, {my}), error {:+} {:+}", x - mx, y - my);
    }
    session.close();

    let offsets = CalibrationOffsets::from_measurements(targets, measured, margins);
    let path = output.unwrap_or_else(|| config.calibration.path.clone());
    offsets
        .save(&path)
        .with_context(|| format!("Failed to write calibration to {}", path.display()))?;

    info!("Calibration saved to {}", path.display());
    print!("{offsets}");
    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    config_path: &'a Path,
    config: &'a TouchConfig,
    calibration: Option<CalibrationOffsets>,
    safe_area: HitRect,
    content_scaling: ContentScaling,
}

/// Print the effective configuration and calibration
pub fn show(config: &TouchConfig, config_path: &Path, json: bool) -> Result<()> {
    let calibration = match CalibrationOffsets::load(&config.calibration.path) {
        Ok(offsets) => Some(offsets),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            warn!("{}", e);
            None
        }
    };
    let margins = calibration.map(|c| c.margins).unwrap_or_default();
    let (width, height) = (config.device.screen_width, config.device.screen_height);
    let report = Report {
        config_path,
        config,
        calibration,
        safe_area: margins.safe_area(width, height),
        content_scaling: ContentScaling::letterbox(
            width,
            height,
            config.pointer.content_width,
            config.pointer.content_height,
            margins,
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Config:      {}", config_path.display());
    println!("Device:      {}", config.device.path.display());
    println!("Screen:      {width}x{height}");
    match &report.calibration {
        Some(offsets) => {
            println!("Calibration: {}", config.calibration.path.display());
            for (name, c) in ["TL", "TR", "BL", "BR"].iter().zip(offsets.corners()) {
                println!("  {name}: dx={:+} dy={:+}", c.dx, c.dy);
            }
            let m = offsets.margins;
            println!(
                "  bezel: top={} bottom={} left={} right={}",
                m.top, m.bottom, m.left, m.right
            );
        }
        None => println!("Calibration: none (identity)"),
    }
    let area = report.safe_area;
    println!("Safe area:   {}x{}+{}+{}", area.width, area.height, area.x, area.y);
    let s = report.content_scaling;
    println!(
        "Content:     {}x{} -> {}x{}+{}+{}",
        config.pointer.content_width,
        config.pointer.content_height,
        s.scaled_width,
        s.scaled_height,
        s.offset_x,
        s.offset_y
    );
    println!(
        "Gestures:    {} (window {} ms, zone {} px)",
        if config.gestures.enabled { "on" } else { "off" },
        config.gestures.window_ms,
        config.gestures.zone_size
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_grid_covers_area() {
        let rects = button_grid(HitRect::new(10, 20, 300, 200), 3, 2);
        assert_eq!(rects.len(), 6);
        assert_eq!(rects[0], HitRect::new(10, 20, 100, 100));
        assert_eq!(rects[5], HitRect::new(210, 120, 100, 100));
    }

    #[test]
    fn test_describe_flags() {
        let state = TouchState {
            x: 5,
            y: 6,
            pressed: true,
            released: false,
            held: true,
        };
        assert_eq!(describe(&state), "(  5,   6) pressed held");
    }

    #[test]
    fn test_json_line_shape() {
        let state = TouchState::default();
        let line = serde_json::to_string(&Line {
            t_ms: 7,
            payload: &state,
        })
        .unwrap();
        assert!(line.starts_with(r#"{"t_ms":7,"event":{"x":0"#));
    }
}
