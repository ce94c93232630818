//! Public API for modules and controllers
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Controllers
pub use crate::module::controller::{ModuleController, WeakModuleController};
pub use crate::module::types::{ControllerConfig, ModuleState};

// Modules
pub use crate::module::traits::{FnModule, Module, TypedModule};

// Control messages
pub use crate::module::types::{StopAsyncMessage, StopMessage};

// Error handling
pub use crate::module::error::{
    ConsumeError, ConsumeResult, ModuleError, ModulePanic, ModuleResult, UnsupportedMessage,
};
