//! Module Error Types

use std::fmt;
use thiserror::Error;

/// Error produced by a module while consuming a message
///
/// Modules are free to fail with any error type; the framework only needs to
/// log it and hand it to the extension pipeline.
pub type ConsumeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a single `consume_message` call
pub type ConsumeResult = Result<(), ConsumeError>;

/// Result type alias for controller and coordinator operations
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Errors raised by the module framework
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("Controller '{module}' has not been initialised with a module")]
    NotInitialized { module: String },

    #[error("Controller '{module}' is already initialised")]
    AlreadyInitialized { module: String },

    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error("Module '{name}' is already registered")]
    DuplicateModule { name: String },

    #[error("Module '{module}' cannot be stopped synchronously from one of its own workers")]
    StopFromWorker { module: String },

    #[error("Module '{module}' failed to consume {message_type}")]
    ConsumeFailed {
        module: String,
        message_type: &'static str,
        #[source]
        source: ConsumeError,
    },

    #[error("Module '{module}' died and could not be recovered after {restarts} restarts")]
    ModuleDied { module: String, restarts: u32 },

    #[error("Failed to spawn worker thread for '{module}'")]
    WorkerSpawn {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Synchronisation { message: String },
}

impl ModuleError {
    /// Name of the module the error relates to, when there is one
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ModuleError::NotInitialized { module }
            | ModuleError::AlreadyInitialized { module }
            | ModuleError::StopFromWorker { module }
            | ModuleError::ConsumeFailed { module, .. }
            | ModuleError::ModuleDied { module, .. }
            | ModuleError::WorkerSpawn { module, .. } => Some(module),
            ModuleError::ModuleNotFound { name } | ModuleError::DuplicateModule { name } => {
                Some(name)
            }
            ModuleError::InvalidArgument { .. } | ModuleError::Synchronisation { .. } => None,
        }
    }
}

impl crate::core::error_handling::ContextualError for ModuleError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ModuleError::InvalidArgument { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ModuleError::InvalidArgument { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A module panicked while consuming a message
///
/// Panics never escape a worker; they are converted into this error and go
/// through the same pipeline as any other consume failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePanic {
    message: String,
}

impl ModulePanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ModulePanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module panicked: {}", self.message)
    }
}

impl std::error::Error for ModulePanic {}

/// A typed module received a payload of a different type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMessage {
    pub expected: &'static str,
    pub actual: &'static str,
}

impl fmt::Display for UnsupportedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported message type {} (expected {})",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for UnsupportedMessage {}
