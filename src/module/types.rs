//! Controller configuration, lifecycle state and control messages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    /// No workers; `start` may be called
    Stopped,
    /// Workers were started and no stop has begun
    Running,
    /// A stop is in progress (hooks firing, workers being joined)
    Stopping,
}

impl ModuleState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ModuleState::Stopped => 0,
            ModuleState::Running => 1,
            ModuleState::Stopping => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ModuleState::Running,
            2 => ModuleState::Stopping,
            _ => ModuleState::Stopped,
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleState::Stopped => "stopped",
            ModuleState::Running => "running",
            ModuleState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Worker configuration supplied at initialisation
///
/// `background` controls what happens when the owning coordinator is dropped
/// without an explicit `stop_all`: foreground controllers are stopped and
/// their workers joined, background controllers are asked to stop without
/// waiting for their workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub thread_count: usize,
    pub background: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            background: false,
        }
    }
}

impl ControllerConfig {
    pub fn with_threads(thread_count: usize) -> Self {
        Self {
            thread_count,
            ..Self::default()
        }
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

/// Control message: halt dispatch now, then stop the controller asynchronously
///
/// Messages still queued behind it are not consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopMessage;

/// Control message: stop the controller asynchronously
///
/// Unlike [`StopMessage`], dispatch is only halted once the stop sequence
/// begins, so workers may pick up a few more messages first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopAsyncMessage;
