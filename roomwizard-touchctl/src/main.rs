//! RoomWizard touch control utility
//!
//! Diagnostics and calibration for the resistive touch panel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roomwizard_touch::TouchConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "roomwizard-touchctl")]
#[command(
    about = "Touchscreen diagnostics and calibration for RoomWizard panels",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the input device node
    #[arg(short, long, value_name = "DEVICE")]
    device: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print touch state changes as they happen
    Monitor {
        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Emit JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Block until the panel is pressed and print the position
    Wait {
        /// Number of presses to wait for
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Print synthesised pointer events
    Pointer {
        /// Deliver events to the full-resolution overlay surface
        #[arg(long)]
        overlay: bool,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Emit JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show a grid of debounced buttons and report presses
    Buttons {
        /// Grid columns
        #[arg(long, default_value = "3")]
        columns: i32,

        /// Grid rows
        #[arg(long, default_value = "2")]
        rows: i32,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Measure the four corners and write a calibration file
    Calibrate {
        /// Output file (defaults to the configured calibration path)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Inset of the targets from the screen edges
        #[arg(long, value_name = "PIXELS")]
        margin: Option<i32>,

        /// Bezel margins as TOP,BOTTOM,LEFT,RIGHT
        #[arg(long, value_name = "T,B,L,R", value_delimiter = ',')]
        bezel: Option<Vec<i32>>,
    },

    /// Show the effective configuration and calibration
    Show {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(TouchConfig::default_path);
    let mut config = TouchConfig::load(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.display()
        )
    })?;
    if let Some(device) = cli.device {
        config.device.path = device;
    }
    info!("Using touch device {}", config.device.path.display());

    match cli.command {
        Command::Monitor { duration, json } => commands::monitor(&config, duration, json),
        Command::Wait { count } => commands::wait(&config, count),
        Command::Pointer {
            overlay,
            duration,
            json,
        } => commands::pointer(&config, overlay, duration, json),
        Command::Buttons {
            columns,
            rows,
            duration,
        } => commands::buttons(&config, columns, rows, duration),
        Command::Calibrate {
            output,
            margin,
            bezel,
        } => commands::calibrate(&config, output, margin, bezel),
        Command::Show { json } => commands::show(&config, &config_path, json),
    }
}
