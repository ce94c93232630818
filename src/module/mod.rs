//! Modules and their Controllers
//!
//! A [`Module`](api::Module) is user logic that consumes messages. Each one
//! is hosted by a [`ModuleController`](api::ModuleController), which owns:
//!
//! - a [`MessageQueue`](crate::queue::MessageQueue) with a priority channel
//! - `thread_count` worker threads that drain the queue
//! - a [`ModuleExtensionCollection`](crate::extension::api::ModuleExtensionCollection)
//!   whose hooks fire around every lifecycle transition, enqueue and consume
//!
//! # Dispatch
//!
//! For every dequeued message a worker:
//!
//! 1. raises `before_consume_message`; a cancel skips the module
//! 2. handles [`StopMessage`](api::StopMessage) and
//!    [`StopAsyncMessage`](api::StopAsyncMessage) itself
//! 3. otherwise calls `consume_message`, converting a panic into an error
//! 4. on failure raises `consume_message_exception_occurred`; if no extension
//!    sets `handled`, the failure is logged and raised again through
//!    `unhandled_module_exception_occurred`
//! 5. raises `after_consume_message` with the [`ConsumeOutcome`](crate::extension::api::ConsumeOutcome)
//!
//! A failing module never takes its worker down.
//!
//! # Example Usage
//!
//! ```rust
//! use moduleflow::module::api::{ControllerConfig, ModuleController, TypedModule};
//! use std::sync::Arc;
//!
//! let controller = ModuleController::new("greeter");
//! controller
//!     .initialize(
//!         Arc::new(TypedModule::new(|name: &String| {
//!             log::info!("hello {}", name);
//!             Ok(())
//!         })),
//!         ControllerConfig::default(),
//!     )
//!     .unwrap();
//!
//! controller.start().unwrap();
//! controller.enqueue_message(String::from("world"));
//! controller.stop().unwrap();
//! ```

pub(crate) mod controller;
mod dispatch;
pub mod error;
pub mod traits;
pub mod types;

pub mod api;

#[cfg(test)]
mod tests;
