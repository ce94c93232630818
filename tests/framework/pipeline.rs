//! Message flow between modules through the public API

use crate::common::{wait_until, Collector};
use moduleflow::coordinator::api::{ModuleCoordinator, WeakModuleCoordinator};
use moduleflow::extension::api::{ConsumeOutcome, ConsumedEvent, EnqueueEvent, ModuleExtension};
use moduleflow::module::api::{
    ControllerConfig, Module, ModuleController, StopMessage, TypedModule,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Upper-cases text and forwards it to "sink"
struct Shouter {
    coordinator: OnceLock<WeakModuleCoordinator>,
}

impl Module for Shouter {
    fn consume_message(&self, message: &moduleflow::queue::api::Message) -> moduleflow::module::api::ConsumeResult {
        let text = message.downcast_ref::<String>().ok_or("expected text")?;
        let coordinator = self
            .coordinator
            .get()
            .and_then(WeakModuleCoordinator::upgrade)
            .ok_or("coordinator gone")?;
        coordinator.post_message("sink", text.to_uppercase())?;
        Ok(())
    }
}

#[test]
fn test_modules_forward_through_the_coordinator() {
    let coordinator = ModuleCoordinator::new();
    let sink = Collector::shared();
    let shouter = Arc::new(Shouter {
        coordinator: OnceLock::new(),
    });
    let _ = shouter.coordinator.set(coordinator.downgrade());

    coordinator.add_module("shouter", shouter).unwrap();
    coordinator.add_module("sink", sink.clone()).unwrap();
    coordinator.start_all();

    for word in ["alpha", "beta", "gamma"] {
        assert!(coordinator.post_message("shouter", word.to_string()).unwrap());
    }

    assert!(wait_until(Duration::from_secs(2), || sink.len() == 3));
    coordinator.stop_all();
    assert_eq!(sink.received(), vec!["ALPHA", "BETA", "GAMMA"]);
}

#[test]
fn test_priority_messages_jump_the_queue() {
    let coordinator = ModuleCoordinator::new();
    let sink = Collector::shared();
    coordinator.add_module("sink", sink.clone()).unwrap();

    coordinator.post_message("sink", "normal-1".to_string()).unwrap();
    coordinator.post_message("sink", "normal-2".to_string()).unwrap();
    coordinator
        .post_priority_message("sink", "urgent".to_string())
        .unwrap();
    coordinator.start_all();

    assert!(wait_until(Duration::from_secs(2), || sink.len() == 3));
    coordinator.stop_all();
    assert_eq!(sink.received(), vec!["urgent", "normal-1", "normal-2"]);
}

/// Rejects payloads longer than a limit and counts completed messages
struct Gatekeeper {
    limit: usize,
    completed: AtomicUsize,
}

impl ModuleExtension for Gatekeeper {
    fn before_enqueue_message(&self, _: &ModuleController, event: &mut EnqueueEvent<'_>) {
        if event
            .message
            .downcast_ref::<String>()
            .is_some_and(|text| text.len() > self.limit)
        {
            event.cancel = true;
        }
    }

    fn after_consume_message(&self, _: &ModuleController, event: &ConsumedEvent<'_>) {
        if event.outcome == ConsumeOutcome::Consumed {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_extension_filters_and_observes() {
    let coordinator = ModuleCoordinator::with_defaults(ControllerConfig::with_threads(4));
    let sink = Collector::shared();
    coordinator.add_module("sink", sink.clone()).unwrap();
    let gate = Arc::new(Gatekeeper {
        limit: 5,
        completed: AtomicUsize::new(0),
    });
    coordinator.add_extension("sink", Arc::clone(&gate)).unwrap();
    coordinator.start_all();

    assert!(coordinator.post_message("sink", "short".to_string()).unwrap());
    assert!(!coordinator.post_message("sink", "far too long".to_string()).unwrap());
    assert!(coordinator.post_message("sink", "ok".to_string()).unwrap());

    assert!(wait_until(Duration::from_secs(2), || gate.completed.load(Ordering::SeqCst) == 2));
    coordinator.stop_all();

    let mut received = sink.received();
    received.sort();
    assert_eq!(received, vec!["ok", "short"]);
}

#[test]
fn test_stop_message_ends_processing() {
    let coordinator = ModuleCoordinator::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let controller = coordinator
        .add_module(
            "numbers",
            Arc::new(TypedModule::new(move |value: &u32| {
                sink.lock().unwrap().push(*value);
                Ok(())
            })),
        )
        .unwrap();

    controller.enqueue_message(1_u32);
    controller.enqueue_message(StopMessage);
    controller.enqueue_message(2_u32);
    controller.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        !controller.is_running() && controller.live_workers() == 0
    }));
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(controller.message_count(), 1);
}
