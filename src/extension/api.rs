//! Public API for controller extensions
//!
//! External modules should import from here rather than directly from
//! internal modules.

pub use crate::extension::collection::ModuleExtensionCollection;
pub use crate::extension::events::{
    ConsumeEvent, ConsumeExceptionEvent, ConsumeOutcome, ConsumedEvent, EnqueueEvent,
};
pub use crate::extension::traits::{AsAny, ModuleExtension};
