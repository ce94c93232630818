//! Timed trigger extension
//!
//! Periodically enqueues a [`TimedTriggerMessage`] on the controller it is
//! attached to. The timer runs on its own thread and only exists while the
//! extension is attached; it is armed when the module starts and disarmed
//! before it stops.

use crate::core::sync::lock_or_recover;
use crate::core::timer::Timer;
use crate::extension::api::ModuleExtension;
use crate::module::api::ModuleController;
use std::sync::Mutex;
use std::time::Duration;

/// Tick delivered by a [`TimedTriggerExtension`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimedTriggerMessage;

/// Enqueues a [`TimedTriggerMessage`] after `initial_delay`, then every
/// `interval` when `auto_reset` is set
///
/// An `initial_delay` of `None` leaves the timer idle until
/// [`change_timer`](Self::change_timer) arms it.
pub struct TimedTriggerExtension {
    initial_delay: Option<Duration>,
    interval: Option<Duration>,
    auto_reset: bool,
    timer: Mutex<Option<Timer>>,
}

impl TimedTriggerExtension {
    pub fn new(initial_delay: Option<Duration>, interval: Option<Duration>, auto_reset: bool) -> Self {
        Self {
            initial_delay,
            interval,
            auto_reset,
            timer: Mutex::new(None),
        }
    }

    /// Fire every `interval`, starting one interval after the module starts
    pub fn periodic(interval: Duration) -> Self {
        Self::new(Some(interval), Some(interval), true)
    }

    /// Re-arm the timer; a `delay` of `None` disarms it
    pub fn change_timer(&self, delay: Option<Duration>, interval: Option<Duration>) {
        match lock_or_recover(&self.timer, "timed trigger").as_ref() {
            Some(timer) => timer.change(delay, interval),
            None => log::debug!("change_timer ignored: trigger is not attached"),
        }
    }

    pub fn is_armed(&self) -> bool {
        lock_or_recover(&self.timer, "timed trigger")
            .as_ref()
            .is_some_and(Timer::is_armed)
    }

    /// Ticks delivered since the extension was attached
    pub fn fired_count(&self) -> u64 {
        lock_or_recover(&self.timer, "timed trigger")
            .as_ref()
            .map_or(0, Timer::fired_count)
    }
}

impl ModuleExtension for TimedTriggerExtension {
    fn attach(&self, controller: &ModuleController) {
        let target = controller.downgrade();
        let spawned = Timer::spawn(format!("{}-timer", controller.name()), move || {
            if let Some(controller) = target.upgrade() {
                controller.enqueue_message(TimedTriggerMessage);
            }
        });

        match spawned {
            Ok(timer) => {
                if controller.is_running() {
                    timer.change(self.initial_delay, self.repeat_interval());
                }
                *lock_or_recover(&self.timer, "timed trigger") = Some(timer);
            }
            Err(error) => log::error!(
                "Failed to spawn timer thread for '{}': {}",
                controller.name(),
                error
            ),
        }
    }

    fn detach(&self, _controller: &ModuleController) {
        let timer = lock_or_recover(&self.timer, "timed trigger").take();
        drop(timer);
    }

    fn after_module_start(&self, _controller: &ModuleController) {
        self.change_timer(self.initial_delay, self.repeat_interval());
    }

    fn before_module_stop(&self, _controller: &ModuleController) {
        self.change_timer(None, None);
    }
}

impl TimedTriggerExtension {
    fn repeat_interval(&self) -> Option<Duration> {
        if self.auto_reset {
            self.interval
        } else {
            None
        }
    }
}
