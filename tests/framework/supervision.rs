//! Watchdog recovery and coordinator teardown

use crate::common::{wait_until, Collector};
use moduleflow::builtin::api::{ConsumePendingMessagesBeforeStopExtension, WatchdogModule};
use moduleflow::coordinator::api::ModuleCoordinator;
use moduleflow::module::api::{ControllerConfig, ModuleError, ModuleState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn test_watchdog_revives_killed_module() {
    let coordinator = ModuleCoordinator::new();
    let sink = Collector::shared();
    let worker = coordinator.add_module("worker", sink.clone()).unwrap();
    WatchdogModule::new(3)
        .supervise("worker")
        .install(&coordinator, "watchdog", Duration::from_millis(10))
        .unwrap();
    coordinator.start_all();

    worker.kill();
    assert!(wait_until(Duration::from_secs(2), || {
        worker.is_dispatching() && worker.is_alive()
    }));

    coordinator.post_message("worker", "still here".to_string()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || sink.len() == 1));
    coordinator.stop_all();
}

#[test]
fn test_watchdog_gives_up_after_max_restarts() {
    let coordinator = ModuleCoordinator::new();
    let worker = coordinator.add_module("worker", Collector::shared()).unwrap();
    WatchdogModule::new(0)
        .supervise("worker")
        .install(&coordinator, "watchdog", Duration::from_millis(10))
        .unwrap();

    let died = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&died);
    coordinator.on_unhandled_exception(move |error| {
        if let ModuleError::ModuleDied { module, .. } = error {
            sink.lock().unwrap().push(module.clone());
        }
    });
    coordinator.start_all();

    worker.kill();
    assert!(wait_until(Duration::from_secs(2), || died.lock().unwrap().len() == 1));
    std::thread::sleep(Duration::from_millis(50));
    coordinator.stop_all();

    assert_eq!(*died.lock().unwrap(), vec!["worker".to_string()]);
    assert_eq!(worker.live_workers(), 0);
}

#[test]
fn test_draining_module_finishes_queue_on_stop_all() {
    let coordinator = ModuleCoordinator::new();
    let sink = Collector::shared();
    coordinator.add_module("sink", sink.clone()).unwrap();
    coordinator
        .add_extension(
            "sink",
            Arc::new(ConsumePendingMessagesBeforeStopExtension::default()),
        )
        .unwrap();

    for index in 0..50 {
        coordinator.post_message("sink", format!("m{index}")).unwrap();
    }
    coordinator.start_all();
    coordinator.stop_all();

    assert_eq!(sink.len(), 50);
}

#[test]
fn test_dropping_the_coordinator_stops_everything() {
    let coordinator = ModuleCoordinator::new();
    let foreground = coordinator.add_module("fg", Collector::shared()).unwrap();
    let background = coordinator
        .add_module_with(
            "bg",
            Collector::shared(),
            ControllerConfig::default().background(true),
        )
        .unwrap();
    coordinator.start_all();

    drop(coordinator);

    assert_eq!(foreground.state(), ModuleState::Stopped);
    assert!(wait_until(Duration::from_secs(2), || {
        background.state() == ModuleState::Stopped
    }));
}
