//! Worker threads and per-message dispatch

use crate::extension::api::{ConsumeEvent, ConsumeExceptionEvent, ConsumeOutcome, ConsumedEvent};
use crate::module::controller::{ControllerShared, ModuleController};
use crate::module::error::{ConsumeError, ConsumeResult, ModuleError, ModulePanic};
use crate::module::traits::Module;
use crate::module::types::{StopAsyncMessage, StopMessage};
use crate::queue::api::Message;
use std::cell::Cell;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

thread_local! {
    static CURRENT_CONTROLLER: Cell<Option<u64>> = const { Cell::new(None) };
}

/// True when called from a worker thread of the controller with `controller_id`
pub(crate) fn is_current_worker(controller_id: u64) -> bool {
    CURRENT_CONTROLLER.with(|current| current.get() == Some(controller_id))
}

struct WorkerGuard {
    shared: Arc<ControllerShared>,
}

impl WorkerGuard {
    fn enter(shared: Arc<ControllerShared>) -> Self {
        CURRENT_CONTROLLER.with(|current| current.set(Some(shared.id)));
        Self { shared }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        CURRENT_CONTROLLER.with(|current| current.set(None));
        self.shared.live_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(super) fn spawn_worker(
    controller: &ModuleController,
    module: Arc<dyn Module>,
    index: usize,
) -> io::Result<JoinHandle<()>> {
    let shared = Arc::clone(&controller.shared);
    let thread_name = format!("{}-worker-{}", shared.name, index);

    shared.live_workers.fetch_add(1, Ordering::SeqCst);
    let worker_shared = Arc::clone(&shared);
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || run_worker(worker_shared, module))
        .map_err(|error| {
            shared.live_workers.fetch_sub(1, Ordering::SeqCst);
            error
        })
}

fn run_worker(shared: Arc<ControllerShared>, module: Arc<dyn Module>) {
    let _guard = WorkerGuard::enter(Arc::clone(&shared));
    let controller = ModuleController::from_shared(shared);
    log::trace!("Worker for '{}' started", controller.name());

    while controller.shared.dispatching.load(Ordering::SeqCst) {
        let Some(message) = controller.shared.queue.dequeue() else {
            break;
        };
        process_message(&controller, module.as_ref(), message);
    }

    log::trace!("Worker for '{}' exiting", controller.name());
}

fn process_message(controller: &ModuleController, module: &dyn Module, message: Message) {
    let mut event = ConsumeEvent::new(&message);
    controller.broadcast("before_consume_message", |ext| {
        ext.before_consume_message(controller, &mut event)
    });

    let outcome = if event.cancel {
        log::trace!(
            "Consumption of {} {} on '{}' cancelled",
            message.type_name(),
            message.id(),
            controller.name()
        );
        ConsumeOutcome::Cancelled
    } else if message.is::<StopMessage>() {
        log::debug!("'{}' received stop message", controller.name());
        if let Err(error) = controller.halt_and_stop_async() {
            report_control_failure(controller, error);
        }
        ConsumeOutcome::Control
    } else if message.is::<StopAsyncMessage>() {
        log::debug!("'{}' received asynchronous stop message", controller.name());
        if let Err(error) = controller.stop_async() {
            report_control_failure(controller, error);
        }
        ConsumeOutcome::Control
    } else {
        match invoke(module, &message) {
            Ok(()) => ConsumeOutcome::Consumed,
            Err(error) => ConsumeOutcome::Failed {
                handled: handle_failure(controller, &message, error),
            },
        }
    };

    let event = ConsumedEvent {
        message: &message,
        outcome,
    };
    controller.broadcast("after_consume_message", |ext| {
        ext.after_consume_message(controller, &event)
    });
}

fn invoke(module: &dyn Module, message: &Message) -> ConsumeResult {
    match catch_unwind(AssertUnwindSafe(|| module.consume_message(message))) {
        Ok(result) => result,
        Err(payload) => Err(Box::new(ModulePanic::from_payload(payload))),
    }
}

// Returns whether an extension claimed the failure
fn handle_failure(controller: &ModuleController, message: &Message, error: ConsumeError) -> bool {
    log::debug!(
        "'{}' failed to consume {} {}: {}",
        controller.name(),
        message.type_name(),
        message.id(),
        error
    );

    let handled = {
        let mut event = ConsumeExceptionEvent::new(message, &error);
        controller.broadcast("consume_message_exception_occurred", |ext| {
            ext.consume_message_exception_occurred(controller, &mut event)
        });
        event.handled
    };

    if !handled {
        log::error!(
            "Unhandled failure in '{}' consuming {} {}: {}",
            controller.name(),
            message.type_name(),
            message.id(),
            error
        );
        let failure = ModuleError::ConsumeFailed {
            module: controller.name().to_string(),
            message_type: message.type_name(),
            source: error,
        };
        controller.notify_unhandled(&failure);
    }
    handled
}

fn report_control_failure(controller: &ModuleController, error: ModuleError) {
    log::error!("{}", error);
    controller.notify_unhandled(&error);
}
