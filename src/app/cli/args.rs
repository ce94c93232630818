//! Command-line arguments for the `moduleflow` binary
//!
//! Command-line values take precedence over the `[logging]` section of the
//! configuration file; [`Args::logging`] merges the two.

use crate::app::config::LoggingConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "moduleflow")]
#[command(about = "Host threaded message-consuming modules described by a TOML file")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force coloured output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(short = 'd', long = "duration-secs", value_name = "SECONDS")]
    pub duration_secs: Option<u64>,

    /// List the available module kinds and exit
    #[arg(long = "list-kinds")]
    pub list_kinds: bool,

    /// Print a module status table after shutdown
    #[arg(long = "status")]
    pub status: bool,
}

/// Logging settings after merging CLI and configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
    pub color: bool,
}

impl Args {
    pub fn run_duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Explicit colour choice, if any: `--no-color` wins over `--color`
    pub fn color_override(&self) -> Option<bool> {
        if self.no_color {
            Some(false)
        } else if self.color {
            Some(true)
        } else {
            None
        }
    }

    /// Merge logging options; `is_terminal` decides colour when nobody did
    pub fn logging(&self, config: &LoggingConfig, is_terminal: bool) -> LoggingSettings {
        let file = self
            .log_file
            .as_ref()
            .or(config.file.as_ref())
            .map(|path| path.to_string_lossy().to_string())
            .filter(|path| !path.eq_ignore_ascii_case("none") && path != "-");

        LoggingSettings {
            level: self.log_level.clone().or_else(|| config.level.clone()),
            format: self.log_format.clone().or_else(|| config.format.clone()),
            file,
            color: self
                .color_override()
                .or(config.color)
                .unwrap_or(is_terminal),
        }
    }
}
