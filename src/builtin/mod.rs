//! Built-in Modules and Extensions
//!
//! Ready-made building blocks assembled from the public module and extension
//! APIs:
//!
//! - [`TimedTriggerExtension`](api::TimedTriggerExtension): periodic ticks
//!   delivered as [`TimedTriggerMessage`](api::TimedTriggerMessage)
//! - [`SchedulerModule`](api::SchedulerModule): delayed delivery of
//!   [`ScheduledMessage`](api::ScheduledMessage)s to other modules
//! - [`RetryExtension`](api::RetryExtension): re-delivery of failed messages
//!   through a scheduler
//! - [`WatchdogModule`](api::WatchdogModule): restart of modules whose
//!   workers died
//! - [`ConsumePendingMessagesBeforeStopExtension`](api::ConsumePendingMessagesBeforeStopExtension):
//!   drain the queue before stopping
//!
//! # Example Usage
//!
//! ```rust
//! use moduleflow::builtin::api::{RetryExtension, SchedulerModule};
//! use moduleflow::coordinator::api::ModuleCoordinator;
//! use moduleflow::module::api::FnModule;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let coordinator = ModuleCoordinator::new();
//! SchedulerModule::install(&coordinator, "scheduler").unwrap();
//! coordinator
//!     .add_module("flaky", Arc::new(FnModule::new(|_| Err("try again".into()))))
//!     .unwrap();
//! coordinator
//!     .add_extension(
//!         "flaky",
//!         Arc::new(RetryExtension::new("scheduler", Duration::from_millis(100), 3)),
//!     )
//!     .unwrap();
//! ```

mod consume_pending;
mod retry;
mod scheduler;
mod timed_trigger;
mod watchdog;

pub mod api;

#[cfg(test)]
mod tests;
