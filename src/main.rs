mod config;
mod core;
mod directory;
mod dissolve;
mod drag;
mod error;
mod file_drop;
mod indicator;
mod osx;
mod panel;
mod process;
mod style;
mod trigger;
mod types;
mod ui;

use std::path::PathBuf;

use clap::Parser;
use eframe::egui;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::ConfigStore;

#[derive(Debug, Parser)]
#[command(name = "orbit", version, about = "Hold a modifier key to orbit your running apps")]
struct Cli {
    /// Settings file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_config: bool,
}

/// Log to stderr and to a daily file under the user cache dir. The file layer
/// is skipped when the log directory is unusable.
fn setup_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orbit=info"));

    let appender = dirs::cache_dir()
        .map(|d| d.join("orbit").join("logs"))
        .and_then(|dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("log")
                .build(dir)
                .ok()
        });
    let Some(logfile) = appender else {
        tracing_subscriber::registry()
            .with(fmt::layer().compact())
            .with(filter)
            .init();
        return None;
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(logfile);
    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(
            fmt::layer()
                .compact()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_line_number(true),
        )
        .with(filter)
        .init();
    Some(guard)
}

fn main() -> eframe::Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging();

    let path = match cli.config {
        Some(path) => path,
        None => match ConfigStore::default_path() {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot locate settings: {}", e);
                return Ok(());
            }
        },
    };
    let config = ConfigStore::open(path);

    if cli.print_config {
        match serde_json::to_string_pretty(config.settings()) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Cannot serialize settings: {}", e),
        }
        return Ok(());
    }

    info!(
        "Starting Orbit v{} with settings from {}",
        env!("CARGO_PKG_VERSION"),
        config.path().display()
    );

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([ui::PANEL_SIZE, ui::PANEL_SIZE])
            .with_resizable(false)
            .with_decorations(false)
            .with_transparent(true)
            .with_window_level(egui::WindowLevel::AlwaysOnTop)
            .with_taskbar(false)
            .with_visible(false),
        ..Default::default()
    };
    eframe::run_native(
        "Orbit",
        native_options,
        Box::new(move |cc| Ok(Box::new(ui::OrbitApp::new(cc, config)))),
    )
}
