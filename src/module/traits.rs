//! Module Trait System
//!
//! A module is the unit of user logic hosted by a controller. It receives one
//! message at a time per worker thread and reports success or failure; it
//! knows nothing about queues, threads or extensions.
//!
//! Implement [`Module`] directly for stateful modules, or wrap a closure with
//! [`FnModule`] / [`TypedModule`] for the common cases.

use crate::module::controller::WeakModuleController;
use crate::module::error::{ConsumeResult, UnsupportedMessage};
use crate::queue::api::Message;
use std::any::Any;
use std::marker::PhantomData;

/// User logic hosted by a [`ModuleController`](crate::module::api::ModuleController)
///
/// `consume_message` may be called concurrently from several workers when the
/// controller is configured with more than one thread, so shared state must be
/// synchronised by the module.
pub trait Module: Send + Sync + 'static {
    /// Process one message
    ///
    /// Returning an error (or panicking) hands the failure to the controller's
    /// extensions; it never stops the worker.
    fn consume_message(&self, message: &Message) -> ConsumeResult;

    /// Called once when the module is installed in a controller
    ///
    /// Modules that need to post to themselves or inspect their controller
    /// keep the weak handle; it does not keep the controller alive.
    fn bind(&self, _controller: WeakModuleController) {}
}

/// Module backed by a closure over the raw [`Message`]
///
/// # Example
///
/// ```rust
/// use moduleflow::module::api::{FnModule, Module};
/// use moduleflow::queue::Message;
///
/// let module = FnModule::new(|message: &Message| {
///     log::info!("received {}", message.type_name());
///     Ok(())
/// });
/// assert!(module.consume_message(&Message::new(1_u8)).is_ok());
/// ```
pub struct FnModule<F> {
    consumer: F,
}

impl<F> FnModule<F>
where
    F: Fn(&Message) -> ConsumeResult + Send + Sync + 'static,
{
    pub fn new(consumer: F) -> Self {
        Self { consumer }
    }
}

impl<F> Module for FnModule<F>
where
    F: Fn(&Message) -> ConsumeResult + Send + Sync + 'static,
{
    fn consume_message(&self, message: &Message) -> ConsumeResult {
        (self.consumer)(message)
    }
}

/// Module that only accepts payloads of type `T`
///
/// Any other payload fails with [`UnsupportedMessage`], which flows through
/// the normal error pipeline.
pub struct TypedModule<T, F> {
    consumer: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> TypedModule<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&T) -> ConsumeResult + Send + Sync + 'static,
{
    pub fn new(consumer: F) -> Self {
        Self {
            consumer,
            _payload: PhantomData,
        }
    }
}

impl<T, F> Module for TypedModule<T, F>
where
    T: Any + Send + Sync,
    F: Fn(&T) -> ConsumeResult + Send + Sync + 'static,
{
    fn consume_message(&self, message: &Message) -> ConsumeResult {
        match message.downcast_ref::<T>() {
            Some(payload) => (self.consumer)(payload),
            None => Err(Box::new(UnsupportedMessage {
                expected: std::any::type_name::<T>(),
                actual: message.type_name(),
            })),
        }
    }
}
