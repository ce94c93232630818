//! Event payloads passed to extension hooks
//!
//! Events that can be vetoed or claimed expose plain `pub` flags. Every
//! extension sees the value left by the ones attached before it.

use crate::module::error::ConsumeError;
use crate::queue::api::Message;

/// Raised before and after a message is added to a controller's queue
#[derive(Debug)]
pub struct EnqueueEvent<'a> {
    pub message: &'a Message,
    pub priority: bool,
    /// Set by `before_enqueue_message` to drop the message
    pub cancel: bool,
}

impl<'a> EnqueueEvent<'a> {
    pub(crate) fn new(message: &'a Message, priority: bool) -> Self {
        Self {
            message,
            priority,
            cancel: false,
        }
    }
}

/// Raised on a worker thread before the module sees a message
#[derive(Debug)]
pub struct ConsumeEvent<'a> {
    pub message: &'a Message,
    /// Set by `before_consume_message` to skip the module for this message
    pub cancel: bool,
}

impl<'a> ConsumeEvent<'a> {
    pub(crate) fn new(message: &'a Message) -> Self {
        Self {
            message,
            cancel: false,
        }
    }
}

/// How a dequeued message was dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The module consumed the message successfully
    Consumed,
    /// An extension cancelled consumption in `before_consume_message`
    Cancelled,
    /// The message was a control message handled by the controller itself
    Control,
    /// The module failed; `handled` reports whether an extension claimed it
    Failed { handled: bool },
}

impl ConsumeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConsumeOutcome::Consumed)
    }
}

/// Raised on a worker thread once a message has been dealt with
#[derive(Debug)]
pub struct ConsumedEvent<'a> {
    pub message: &'a Message,
    pub outcome: ConsumeOutcome,
}

/// Raised when the module fails to consume a message
#[derive(Debug)]
pub struct ConsumeExceptionEvent<'a> {
    pub message: &'a Message,
    pub error: &'a ConsumeError,
    /// Set by an extension that has dealt with the failure
    pub handled: bool,
}

impl<'a> ConsumeExceptionEvent<'a> {
    pub(crate) fn new(message: &'a Message, error: &'a ConsumeError) -> Self {
        Self {
            message,
            error,
            handled: false,
        }
    }
}
