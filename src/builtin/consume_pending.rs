//! Drain the queue before stopping

use crate::extension::api::{EnqueueEvent, ModuleExtension};
use crate::module::api::ModuleController;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Holds `stop` until the queue is empty, dispatch has halted or `max_wait`
/// elapses; messages enqueued while draining are rejected
pub struct ConsumePendingMessagesBeforeStopExtension {
    max_wait: Duration,
    poll_interval: Duration,
    draining: AtomicBool,
}

impl Default for ConsumePendingMessagesBeforeStopExtension {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_millis(20))
    }
}

impl ConsumePendingMessagesBeforeStopExtension {
    pub fn new(max_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            max_wait,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            draining: AtomicBool::new(false),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

impl ModuleExtension for ConsumePendingMessagesBeforeStopExtension {
    fn before_module_stop(&self, controller: &ModuleController) {
        self.draining.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + self.max_wait;

        loop {
            let remaining = controller.message_count();
            if remaining == 0 || !controller.is_dispatching() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "'{}' still has {} message(s) after {:?}; stopping anyway",
                    controller.name(),
                    remaining,
                    self.max_wait
                );
                break;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn after_module_stop(&self, _controller: &ModuleController) {
        self.draining.store(false, Ordering::SeqCst);
    }

    fn before_enqueue_message(&self, controller: &ModuleController, event: &mut EnqueueEvent<'_>) {
        if self.is_draining() {
            log::debug!(
                "Rejecting {} on '{}' while draining",
                event.message.id(),
                controller.name()
            );
            event.cancel = true;
        }
    }
}
