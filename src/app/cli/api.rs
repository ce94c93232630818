//! Public API exports for the CLI module

pub use crate::app::cli::args::{Args, LoggingSettings};
pub use crate::app::cli::display::{render_kinds, render_status};
