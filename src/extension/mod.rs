//! Controller Extensions
//!
//! Extensions are the framework's only plug-in point. They are attached to a
//! single controller and receive its lifecycle, enqueue and consume events
//! (see [`ModuleExtension`](api::ModuleExtension) for the full hook list).
//! Retry, timed triggers and draining on stop are all implemented this way
//! in [`crate::builtin`].
//!
//! # Example Usage
//!
//! ```rust
//! use moduleflow::extension::api::{ConsumedEvent, ModuleExtension};
//! use moduleflow::module::api::{ControllerConfig, FnModule, ModuleController};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct ConsumeCounter(AtomicUsize);
//!
//! impl ModuleExtension for ConsumeCounter {
//!     fn after_consume_message(&self, _: &ModuleController, event: &ConsumedEvent<'_>) {
//!         if event.outcome.is_success() {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let controller = ModuleController::new("counted");
//! controller
//!     .initialize(Arc::new(FnModule::new(|_| Ok(()))), ControllerConfig::default())
//!     .unwrap();
//! controller.extensions().add(Arc::new(ConsumeCounter::default()));
//!
//! let counter = controller.extensions().get::<ConsumeCounter>().unwrap();
//! assert_eq!(counter.0.load(Ordering::SeqCst), 0);
//! ```

mod collection;
mod events;
pub mod traits;

pub mod api;

#[cfg(test)]
mod tests;
