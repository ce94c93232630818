//! Shared helpers for unit tests

use crate::core::sync::lock_or_recover;
use crate::extension::api::{
    ConsumeEvent, ConsumeExceptionEvent, ConsumeOutcome, ConsumedEvent, EnqueueEvent,
    ModuleExtension,
};
use crate::module::api::{ConsumeResult, Module, ModuleController, ModuleError};
use crate::queue::api::Message;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses
pub(crate) fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Module recording every `i32` payload it consumes, in order
#[derive(Default)]
pub(crate) struct RecordingModule {
    seen: Mutex<Vec<i32>>,
    delay: Option<Duration>,
}

impl RecordingModule {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub(crate) fn seen(&self) -> Vec<i32> {
        lock_or_recover(&self.seen, "recording module").clone()
    }

    pub(crate) fn count(&self) -> usize {
        lock_or_recover(&self.seen, "recording module").len()
    }
}

impl Module for RecordingModule {
    fn consume_message(&self, message: &Message) -> ConsumeResult {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let value = message
            .downcast_ref::<i32>()
            .copied()
            .ok_or("expected an i32 payload")?;
        lock_or_recover(&self.seen, "recording module").push(value);
        Ok(())
    }
}

/// Extension recording hook names (and a little detail) in call order
#[derive(Default)]
pub(crate) struct RecordingExtension {
    events: Mutex<Vec<String>>,
    outcomes: Mutex<Vec<ConsumeOutcome>>,
    unhandled: Mutex<Vec<String>>,
}

impl RecordingExtension {
    pub(crate) fn events(&self) -> Vec<String> {
        lock_or_recover(&self.events, "recording extension").clone()
    }

    pub(crate) fn count(&self, hook: &str) -> usize {
        self.events().iter().filter(|event| *event == hook).count()
    }

    pub(crate) fn outcomes(&self) -> Vec<ConsumeOutcome> {
        lock_or_recover(&self.outcomes, "recording extension").clone()
    }

    /// Display text of every unhandled error, with its source when present
    pub(crate) fn unhandled(&self) -> Vec<String> {
        lock_or_recover(&self.unhandled, "recording extension").clone()
    }

    fn record(&self, hook: &str) {
        lock_or_recover(&self.events, "recording extension").push(hook.to_string());
    }
}

impl ModuleExtension for RecordingExtension {
    fn attach(&self, _controller: &ModuleController) {
        self.record("attach");
    }

    fn detach(&self, _controller: &ModuleController) {
        self.record("detach");
    }

    fn before_module_start(&self, _controller: &ModuleController) {
        self.record("before_module_start");
    }

    fn after_module_start(&self, _controller: &ModuleController) {
        self.record("after_module_start");
    }

    fn before_module_stop(&self, _controller: &ModuleController) {
        self.record("before_module_stop");
    }

    fn after_module_stop(&self, _controller: &ModuleController) {
        self.record("after_module_stop");
    }

    fn before_enqueue_message(&self, _controller: &ModuleController, _event: &mut EnqueueEvent<'_>) {
        self.record("before_enqueue_message");
    }

    fn after_enqueue_message(&self, _controller: &ModuleController, _event: &EnqueueEvent<'_>) {
        self.record("after_enqueue_message");
    }

    fn before_consume_message(&self, _controller: &ModuleController, _event: &mut ConsumeEvent<'_>) {
        self.record("before_consume_message");
    }

    fn after_consume_message(&self, _controller: &ModuleController, event: &ConsumedEvent<'_>) {
        self.record("after_consume_message");
        lock_or_recover(&self.outcomes, "recording extension").push(event.outcome);
    }

    fn consume_message_exception_occurred(
        &self,
        _controller: &ModuleController,
        _event: &mut ConsumeExceptionEvent<'_>,
    ) {
        self.record("consume_message_exception_occurred");
    }

    fn unhandled_module_exception_occurred(&self, _controller: &ModuleController, error: &ModuleError) {
        self.record("unhandled_module_exception_occurred");
        let text = match std::error::Error::source(error) {
            Some(source) => format!("{}: {}", error, source),
            None => error.to_string(),
        };
        lock_or_recover(&self.unhandled, "recording extension").push(text);
    }
}

/// Controller hosting a fresh [`RecordingModule`], not started
pub(crate) fn recording_controller(
    name: &str,
    thread_count: usize,
) -> (ModuleController, Arc<RecordingModule>) {
    let module = Arc::new(RecordingModule::default());
    let controller = ModuleController::new(name);
    controller
        .initialize(
            Arc::clone(&module) as Arc<dyn Module>,
            crate::module::api::ControllerConfig::with_threads(thread_count),
        )
        .expect("initialise recording controller");
    (controller, module)
}
