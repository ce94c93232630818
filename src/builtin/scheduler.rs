//! Delayed message delivery
//!
//! The scheduler is an ordinary module. It stores [`ScheduledMessage`]s in
//! due-time order and keeps its own [`TimedTriggerExtension`] armed for the
//! earliest one; when the trigger fires, every message that has come due is
//! posted to its target through the coordinator.

use crate::builtin::timed_trigger::{TimedTriggerExtension, TimedTriggerMessage};
use crate::core::sync::lock_or_recover;
use crate::core::time::{duration_until, SystemTimeProvider, TimeProvider};
use crate::coordinator::api::ModuleCoordinator;
use crate::module::api::{
    ConsumeResult, ControllerConfig, Module, ModuleController, ModuleResult, UnsupportedMessage,
    WeakModuleController,
};
use crate::queue::api::Message;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// A message to deliver to `target` once `due` has passed
#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    target: String,
    message: Message,
    due: DateTime<Utc>,
}

impl ScheduledMessage {
    /// Deliver `payload` to `target` at an absolute time
    pub fn at<T: Any + Send + Sync>(target: impl Into<String>, payload: T, due: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            message: Message::new(payload),
            due,
        }
    }

    /// Deliver `payload` to `target` once `delay` has elapsed from now
    pub fn after<T: Any + Send + Sync>(target: impl Into<String>, payload: T, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        let due = Utc::now()
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::at(target, payload, due)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn due(&self) -> DateTime<Utc> {
        self.due
    }
}

#[derive(Default)]
struct Pending {
    entries: BTreeMap<(DateTime<Utc>, u64), ScheduledMessage>,
    sequence: u64,
}

/// Module that holds scheduled messages until they are due
pub struct SchedulerModule {
    pending: Mutex<Pending>,
    time: Arc<dyn TimeProvider>,
    controller: OnceLock<WeakModuleController>,
}

impl Default for SchedulerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerModule {
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(time: Arc<dyn TimeProvider>) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            time,
            controller: OnceLock::new(),
        }
    }

    /// Register a scheduler named `name` together with its trigger
    pub fn install(coordinator: &ModuleCoordinator, name: &str) -> ModuleResult<ModuleController> {
        Self::new().install_into(coordinator, name)
    }

    /// Register this scheduler under `name` together with its trigger
    pub fn install_into(
        self,
        coordinator: &ModuleCoordinator,
        name: &str,
    ) -> ModuleResult<ModuleController> {
        let controller =
            coordinator.add_module_with(name, Arc::new(self), ControllerConfig::with_threads(1))?;
        // Fires once on start so messages scheduled before a restart are picked up
        controller
            .extensions()
            .add(Arc::new(TimedTriggerExtension::new(Some(Duration::ZERO), None, false)));
        Ok(controller)
    }

    /// Number of messages waiting for their due time
    pub fn pending_count(&self) -> usize {
        lock_or_recover(&self.pending, "scheduler").entries.len()
    }

    /// Earliest due time, if anything is pending
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        lock_or_recover(&self.pending, "scheduler")
            .entries
            .keys()
            .next()
            .map(|(due, _)| *due)
    }

    fn schedule(&self, scheduled: ScheduledMessage) {
        let mut pending = lock_or_recover(&self.pending, "scheduler");
        pending.sequence += 1;
        let key = (scheduled.due, pending.sequence);
        log::debug!(
            "Scheduled {} for '{}' at {}",
            scheduled.message.id(),
            scheduled.target,
            scheduled.due
        );
        pending.entries.insert(key, scheduled);
    }

    /// Remove and return every message due at or before `now`, in due order
    fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledMessage> {
        let mut pending = lock_or_recover(&self.pending, "scheduler");
        let later = pending.entries.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut pending.entries, later);
        due.into_values().collect()
    }

    fn deliver_due(&self) {
        let due = self.take_due(self.time.utc_now());
        if due.is_empty() {
            return;
        }

        let Some(coordinator) = self.controller().and_then(|c| c.coordinator()) else {
            log::error!(
                "Scheduler has no coordinator; dropping {} due message(s)",
                due.len()
            );
            return;
        };

        for scheduled in due {
            match coordinator.post_message(&scheduled.target, scheduled.message) {
                Ok(_) => log::trace!("Delivered scheduled message to '{}'", scheduled.target),
                Err(error) => log::warn!("Scheduled delivery failed: {}", error),
            }
        }
    }

    fn rearm(&self) {
        let Some(controller) = self.controller() else {
            return;
        };
        let Some(trigger) = controller.extensions().get::<TimedTriggerExtension>() else {
            log::warn!("Scheduler '{}' has no timed trigger", controller.name());
            return;
        };

        let delay = self
            .next_due()
            .map(|due| duration_until(self.time.utc_now(), due));
        trigger.change_timer(delay, None);
    }

    fn controller(&self) -> Option<ModuleController> {
        self.controller.get().and_then(WeakModuleController::upgrade)
    }
}

impl Module for SchedulerModule {
    fn bind(&self, controller: WeakModuleController) {
        let _ = self.controller.set(controller);
    }

    fn consume_message(&self, message: &Message) -> ConsumeResult {
        if let Some(scheduled) = message.downcast_ref::<ScheduledMessage>() {
            self.schedule(scheduled.clone());
        } else if message.is::<TimedTriggerMessage>() {
            self.deliver_due();
        } else {
            return Err(Box::new(UnsupportedMessage {
                expected: std::any::type_name::<ScheduledMessage>(),
                actual: message.type_name(),
            }));
        }

        self.rearm();
        Ok(())
    }
}
