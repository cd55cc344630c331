//! Widgets for the harness window

mod log_viewer;
pub mod spinner;

pub use log_viewer::LogViewer;
