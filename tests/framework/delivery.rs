//! Delayed delivery and retries through the scheduler module

use crate::common::{wait_until, Collector};
use moduleflow::builtin::api::{RetryExtension, ScheduledMessage, SchedulerModule};
use moduleflow::coordinator::api::ModuleCoordinator;
use moduleflow::module::api::{FnModule, ModuleError};
use moduleflow::queue::api::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[test]
fn test_scheduled_messages_arrive_after_their_delay() {
    let coordinator = ModuleCoordinator::new();
    SchedulerModule::install(&coordinator, "scheduler").unwrap();
    let sink = Collector::shared();
    coordinator.add_module("sink", sink.clone()).unwrap();
    coordinator.start_all();

    let posted = Instant::now();
    coordinator
        .post_message(
            "scheduler",
            ScheduledMessage::after("sink", "later".to_string(), Duration::from_millis(80)),
        )
        .unwrap();
    coordinator
        .post_message(
            "scheduler",
            ScheduledMessage::after("sink", "sooner".to_string(), Duration::from_millis(20)),
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || sink.len() == 2));
    let elapsed = posted.elapsed();
    coordinator.stop_all();

    assert_eq!(sink.received(), vec!["sooner", "later"]);
    assert!(elapsed >= Duration::from_millis(80));
}

#[test]
fn test_transient_failures_are_retried_until_success() {
    let coordinator = ModuleCoordinator::new();
    SchedulerModule::install(&coordinator, "scheduler").unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    coordinator
        .add_module(
            "flaky",
            Arc::new(FnModule::new(move |_: &Message| {
                // Succeeds on the third attempt
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("temporarily unavailable".into())
                } else {
                    Ok(())
                }
            })),
        )
        .unwrap();
    coordinator
        .add_extension(
            "flaky",
            Arc::new(RetryExtension::new("scheduler", Duration::from_millis(10), 5)),
        )
        .unwrap();

    let unhandled = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&unhandled);
    coordinator.on_unhandled_exception(move |_| *sink.lock().unwrap() += 1);
    coordinator.start_all();

    coordinator.post_message("flaky", "job").unwrap();

    assert!(wait_until(Duration::from_secs(3), || attempts.load(Ordering::SeqCst) == 3));
    std::thread::sleep(Duration::from_millis(50));
    coordinator.stop_all();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(*unhandled.lock().unwrap(), 0);
}

#[test]
fn test_exhausted_retries_reach_observers() {
    let coordinator = ModuleCoordinator::new();
    SchedulerModule::install(&coordinator, "scheduler").unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    coordinator
        .add_module(
            "broken",
            Arc::new(FnModule::new(move |_: &Message| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("permanently broken".into())
            })),
        )
        .unwrap();
    coordinator
        .add_extension(
            "broken",
            Arc::new(RetryExtension::new("scheduler", Duration::from_millis(5), 2)),
        )
        .unwrap();

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    coordinator.on_unhandled_exception(move |error| {
        if let ModuleError::ConsumeFailed { module, source, .. } = error {
            sink.lock()
                .unwrap()
                .push(format!("{}: {}", module, source));
        }
    });
    coordinator.start_all();

    coordinator.post_message("broken", 1_u8).unwrap();

    assert!(wait_until(Duration::from_secs(3), || failures.lock().unwrap().len() == 1));
    coordinator.stop_all();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        *failures.lock().unwrap(),
        vec!["broken: permanently broken".to_string()]
    );
}
