//! Public API for the module coordinator

pub use crate::coordinator::registry::{ModuleCoordinator, UnhandledObserver, WeakModuleCoordinator};
