//! Extension Trait System
//!
//! Extensions observe and influence a controller's lifecycle and message flow.
//! Every hook has an empty default, so an extension implements only the
//! events it cares about.
//!
//! # Hook order
//!
//! | Operation            | Hooks                                                    |
//! |----------------------|----------------------------------------------------------|
//! | `start`              | `before_module_start`, `after_module_start`              |
//! | `stop`               | `before_module_stop`, `after_module_stop`                |
//! | `enqueue_message`    | `before_enqueue_message`, `after_enqueue_message`        |
//! | dispatch (worker)    | `before_consume_message`, `after_consume_message`        |
//! | module failure       | `consume_message_exception_occurred`                     |
//! | unclaimed failure    | `unhandled_module_exception_occurred`                    |
//!
//! Hooks run synchronously on the thread performing the operation, in
//! attachment order. A panicking hook is logged and skipped; the remaining
//! extensions still run.

use crate::extension::events::{
    ConsumeEvent, ConsumeExceptionEvent, ConsumedEvent, EnqueueEvent,
};
use crate::module::api::{ModuleController, ModuleError};
use std::any::Any;
use std::sync::Arc;

/// Upcasting support so extensions can be retrieved by concrete type
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Pluggable behaviour attached to a [`ModuleController`]
pub trait ModuleExtension: AsAny {
    /// Name used in log messages
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The extension was added to `controller`'s collection
    fn attach(&self, _controller: &ModuleController) {}

    /// The extension was removed from, or replaced in, `controller`'s collection
    fn detach(&self, _controller: &ModuleController) {}

    fn before_module_start(&self, _controller: &ModuleController) {}

    fn after_module_start(&self, _controller: &ModuleController) {}

    fn before_module_stop(&self, _controller: &ModuleController) {}

    fn after_module_stop(&self, _controller: &ModuleController) {}

    fn before_enqueue_message(&self, _controller: &ModuleController, _event: &mut EnqueueEvent<'_>) {}

    fn after_enqueue_message(&self, _controller: &ModuleController, _event: &EnqueueEvent<'_>) {}

    fn before_consume_message(&self, _controller: &ModuleController, _event: &mut ConsumeEvent<'_>) {}

    fn after_consume_message(&self, _controller: &ModuleController, _event: &ConsumedEvent<'_>) {}

    /// The module failed; set `event.handled` to claim the failure
    fn consume_message_exception_occurred(
        &self,
        _controller: &ModuleController,
        _event: &mut ConsumeExceptionEvent<'_>,
    ) {
    }

    /// A failure nobody claimed, or an error raised by the framework itself
    fn unhandled_module_exception_occurred(
        &self,
        _controller: &ModuleController,
        _error: &ModuleError,
    ) {
    }
}
