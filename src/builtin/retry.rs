//! Retry extension
//!
//! When the module fails on a message, the message is handed to a scheduler
//! module and re-delivered to the same module after a fixed delay. Attempts
//! are counted per (module, message identity); a successful consumption
//! resets the count, and once `max_retries` re-deliveries have failed the
//! failure is left unhandled.

use crate::builtin::scheduler::ScheduledMessage;
use crate::core::sync::lock_or_recover;
use crate::extension::api::{ConsumeExceptionEvent, ConsumeOutcome, ConsumedEvent, ModuleExtension};
use crate::module::api::ModuleController;
use crate::queue::api::MessageId;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;

type ErrorMatcher = fn(&(dyn Error + Send + Sync + 'static)) -> bool;

struct RetryFilter {
    type_name: &'static str,
    matches: ErrorMatcher,
}

/// Re-delivers failed messages through a scheduler module
///
/// # Example
///
/// ```rust
/// use moduleflow::builtin::api::RetryExtension;
/// use std::time::Duration;
///
/// let retry = RetryExtension::new("scheduler", Duration::from_secs(5), 3)
///     .retry_on::<std::io::Error>();
/// assert_eq!(retry.max_retries(), 3);
/// ```
pub struct RetryExtension {
    scheduler_name: String,
    delay: Duration,
    max_retries: u32,
    filters: Vec<RetryFilter>,
    attempts: Mutex<HashMap<(String, MessageId), u32>>,
}

impl RetryExtension {
    pub fn new(scheduler_name: impl Into<String>, delay: Duration, max_retries: u32) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
            delay,
            max_retries,
            filters: Vec::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Only retry failures whose error is an `E`
    ///
    /// Without any `retry_on` call every failure is retried.
    pub fn retry_on<E: Error + Send + Sync + 'static>(mut self) -> Self {
        self.filters.push(RetryFilter {
            type_name: std::any::type_name::<E>(),
            matches: |error: &(dyn Error + Send + Sync + 'static)| error.is::<E>(),
        });
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Re-deliveries already scheduled for `message` on `module`
    pub fn attempts(&self, module: &str, message: MessageId) -> u32 {
        lock_or_recover(&self.attempts, "retry attempts")
            .get(&(module.to_string(), message))
            .copied()
            .unwrap_or(0)
    }

    fn is_retryable(&self, error: &(dyn Error + Send + Sync + 'static)) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| (filter.matches)(error))
    }

    // Reserve the next attempt number, or clear the counter once exhausted
    fn next_attempt(&self, key: &(String, MessageId)) -> Option<u32> {
        let mut attempts = lock_or_recover(&self.attempts, "retry attempts");
        let done = attempts.get(key).copied().unwrap_or(0);
        if done >= self.max_retries {
            attempts.remove(key);
            None
        } else {
            Some(done + 1)
        }
    }
}

impl ModuleExtension for RetryExtension {
    fn consume_message_exception_occurred(
        &self,
        controller: &ModuleController,
        event: &mut ConsumeExceptionEvent<'_>,
    ) {
        if event.handled || !self.is_retryable(event.error.as_ref()) {
            return;
        }

        let key = (controller.name().to_string(), event.message.id());
        let Some(attempt) = self.next_attempt(&key) else {
            log::warn!(
                "Giving up on {} in '{}' after {} retries",
                event.message.id(),
                controller.name(),
                self.max_retries
            );
            return;
        };

        let Some(coordinator) = controller.coordinator() else {
            log::warn!(
                "Cannot retry {} in '{}': module has no coordinator",
                event.message.id(),
                controller.name()
            );
            return;
        };

        let scheduled = ScheduledMessage::after(controller.name(), event.message.clone(), self.delay);
        match coordinator.post_message(&self.scheduler_name, scheduled) {
            Ok(true) => {
                lock_or_recover(&self.attempts, "retry attempts").insert(key, attempt);
                event.handled = true;
                log::info!(
                    "Retrying {} in '{}' in {:?} (attempt {}/{})",
                    event.message.id(),
                    controller.name(),
                    self.delay,
                    attempt,
                    self.max_retries
                );
            }
            Ok(false) => log::warn!(
                "Scheduler '{}' refused retry of {}",
                self.scheduler_name,
                event.message.id()
            ),
            Err(error) => log::warn!("Cannot retry {}: {}", event.message.id(), error),
        }
    }

    fn after_consume_message(&self, controller: &ModuleController, event: &ConsumedEvent<'_>) {
        if event.outcome == ConsumeOutcome::Consumed {
            let key = (controller.name().to_string(), event.message.id());
            lock_or_recover(&self.attempts, "retry attempts").remove(&key);
        }
    }
}

impl std::fmt::Debug for RetryExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExtension")
            .field("scheduler_name", &self.scheduler_name)
            .field("delay", &self.delay)
            .field("max_retries", &self.max_retries)
            .field(
                "retry_on",
                &self.filters.iter().map(|f| f.type_name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
