//! Shelves Harness - Main Application Entry Point
//!
//! A minimal desktop harness that shows the output of the external Shelves
//! module, answers its input requests and reflects its busy state.

mod app;
mod config;
mod shell;
mod widgets;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::HarnessConfig;

fn main() -> anyhow::Result<()> {
    // Set up logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config();

    // Configure application window settings
    let settings = cosmic::app::Settings::default()
        .size_limits(cosmic::iced::Limits::NONE.min_width(360.0).min_height(480.0))
        .size(cosmic::iced::Size::new(480.0, 720.0));

    // Run the application
    cosmic::app::run::<app::App>(settings, app::Flags { config })
        .context("Application event loop failed")
}

/// Load the harness config, falling back to defaults on any error
fn load_config() -> HarnessConfig {
    let Some(path) = HarnessConfig::default_path() else {
        warn!("No config directory available; using defaults");
        return HarnessConfig::default();
    };

    match HarnessConfig::load_or_create(&path) {
        Ok(config) => {
            info!("Config: {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load config {}: {}. Using defaults.", path.display(), e);
            HarnessConfig::default()
        }
    }
}
