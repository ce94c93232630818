//! Public API for the built-in modules and extensions

pub use crate::builtin::consume_pending::ConsumePendingMessagesBeforeStopExtension;
pub use crate::builtin::retry::RetryExtension;
pub use crate::builtin::scheduler::{ScheduledMessage, SchedulerModule};
pub use crate::builtin::timed_trigger::{TimedTriggerExtension, TimedTriggerMessage};
pub use crate::builtin::watchdog::WatchdogModule;
