//! Tests for initialisation, start/stop idempotence and self-stop rules

#[cfg(test)]
mod tests {
    use crate::core::testing::{recording_controller, wait_until, RecordingExtension};
    use crate::module::api::{
        ControllerConfig, FnModule, ModuleController, ModuleError, ModuleState, StopAsyncMessage,
        StopMessage,
    };
    use crate::queue::api::Message;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_initialize_rejects_zero_threads() {
        let controller = ModuleController::new("zero");

        let result = controller.initialize(
            Arc::new(FnModule::new(|_: &Message| Ok(()))),
            ControllerConfig::with_threads(0),
        );

        assert!(matches!(
            result,
            Err(ModuleError::InvalidArgument { argument: "thread_count", .. })
        ));
        assert!(!controller.is_initialized());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let (controller, _) = recording_controller("twice", 1);

        let result = controller.initialize(
            Arc::new(FnModule::new(|_: &Message| Ok(()))),
            ControllerConfig::default(),
        );

        assert!(matches!(result, Err(ModuleError::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_start_before_initialize_fails() {
        let controller = ModuleController::new("bare");

        assert!(matches!(
            controller.start(),
            Err(ModuleError::NotInitialized { .. })
        ));
        assert_eq!(controller.state(), ModuleState::Stopped);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (controller, _) = recording_controller("idempotent", 2);
        let recorder = Arc::new(RecordingExtension::default());
        controller.extensions().add(Arc::clone(&recorder));

        controller.start().unwrap();
        controller.start().unwrap();
        assert_eq!(controller.state(), ModuleState::Running);
        assert_eq!(controller.live_workers(), 2);

        controller.stop().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), ModuleState::Stopped);
        assert_eq!(controller.live_workers(), 0);

        assert_eq!(recorder.count("before_module_start"), 1);
        assert_eq!(recorder.count("after_module_start"), 1);
        assert_eq!(recorder.count("before_module_stop"), 1);
        assert_eq!(recorder.count("after_module_stop"), 1);
    }

    #[test]
    fn test_controller_can_be_restarted() {
        let (controller, module) = recording_controller("restart", 1);

        controller.start().unwrap();
        controller.enqueue_message(1);
        assert!(wait_until(Duration::from_secs(2), || module.count() == 1));
        controller.stop().unwrap();

        controller.start().unwrap();
        controller.enqueue_message(2);
        assert!(wait_until(Duration::from_secs(2), || module.count() == 2));
        controller.stop().unwrap();

        assert_eq!(module.seen(), vec![1, 2]);
    }

    #[test]
    fn test_hook_order_around_lifecycle() {
        let (controller, _) = recording_controller("ordered", 1);
        let recorder = Arc::new(RecordingExtension::default());
        controller.extensions().add(Arc::clone(&recorder));

        controller.start().unwrap();
        controller.stop().unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                "attach",
                "before_module_start",
                "after_module_start",
                "before_module_stop",
                "after_module_stop",
            ]
        );
    }

    #[test]
    fn test_stop_from_own_worker_is_refused_and_reported() {
        let controller = ModuleController::new("self-stopper");
        let outcome: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

        let weak = controller.downgrade();
        let sink = Arc::clone(&outcome);
        controller
            .initialize(
                Arc::new(FnModule::new(move |_: &Message| {
                    if let Some(own) = weak.upgrade() {
                        let refused = matches!(own.stop(), Err(ModuleError::StopFromWorker { .. }));
                        *sink.lock().unwrap() = Some(refused);
                    }
                    Ok(())
                })),
                ControllerConfig::default(),
            )
            .unwrap();
        let recorder = Arc::new(RecordingExtension::default());
        controller.extensions().add(Arc::clone(&recorder));

        controller.start().unwrap();
        controller.enqueue_message("stop yourself");

        assert!(wait_until(Duration::from_secs(2), || outcome.lock().unwrap().is_some()));
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        assert_eq!(recorder.count("unhandled_module_exception_occurred"), 1);
        assert!(controller.is_alive());

        controller.stop().unwrap();
    }

    #[test]
    fn test_start_from_own_worker_is_a_noop() {
        let controller = ModuleController::new("self-starter");
        let outcome: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

        let weak = controller.downgrade();
        let sink = Arc::clone(&outcome);
        controller
            .initialize(
                Arc::new(FnModule::new(move |_: &Message| {
                    if let Some(own) = weak.upgrade() {
                        *sink.lock().unwrap() = Some(own.start().is_ok());
                    }
                    Ok(())
                })),
                ControllerConfig::with_threads(2),
            )
            .unwrap();
        let recorder = Arc::new(RecordingExtension::default());
        controller.extensions().add(Arc::clone(&recorder));

        controller.start().unwrap();
        controller.enqueue_message("start again");

        assert!(wait_until(Duration::from_secs(2), || outcome.lock().unwrap().is_some()));
        assert_eq!(*outcome.lock().unwrap(), Some(true));
        assert_eq!(recorder.count("before_module_start"), 1);
        assert_eq!(recorder.count("unhandled_module_exception_occurred"), 0);
        assert_eq!(controller.state(), ModuleState::Running);
        assert!(wait_until(Duration::from_secs(2), || controller.live_workers() == 2));

        controller.stop().unwrap();
    }

    #[test]
    fn test_stop_async_from_own_worker() {
        let controller = ModuleController::new("async-self-stopper");
        let weak = controller.downgrade();
        controller
            .initialize(
                Arc::new(FnModule::new(move |_: &Message| {
                    if let Some(own) = weak.upgrade() {
                        own.stop_async()?;
                    }
                    Ok(())
                })),
                ControllerConfig::default(),
            )
            .unwrap();

        controller.start().unwrap();
        controller.enqueue_message(());

        assert!(wait_until(Duration::from_secs(2), || {
            controller.state() == ModuleState::Stopped
        }));
        assert_eq!(controller.live_workers(), 0);
    }

    #[test]
    fn test_stop_message_halts_dispatch_immediately() {
        let (controller, module) = recording_controller("stop-message", 1);

        controller.enqueue_message(1);
        controller.enqueue_message(StopMessage);
        controller.enqueue_message(2);
        controller.enqueue_message(3);
        controller.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            controller.state() == ModuleState::Stopped
        }));
        assert_eq!(module.seen(), vec![1]);
        assert_eq!(controller.message_count(), 2);
    }

    #[test]
    fn test_stop_async_message_stops_controller() {
        let (controller, module) = recording_controller("stop-async-message", 1);

        controller.enqueue_message(1);
        controller.enqueue_message(StopAsyncMessage);
        controller.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            controller.state() == ModuleState::Stopped
        }));
        assert_eq!(module.seen(), vec![1]);
    }

    #[test]
    fn test_kill_leaves_controller_running_but_dead() {
        let (controller, _) = recording_controller("killed", 3);
        controller.start().unwrap();
        assert!(controller.is_alive());

        controller.kill();

        assert!(wait_until(Duration::from_secs(2), || controller.live_workers() == 0));
        assert_eq!(controller.state(), ModuleState::Running);
        assert!(!controller.is_alive());
        assert!(!controller.is_dispatching());

        assert!(controller.restart_if_dead().unwrap());
        assert!(controller.is_alive());
        assert!(!controller.restart_if_dead().unwrap());
        controller.stop().unwrap();
    }

    #[test]
    fn test_bind_receives_controller_handle() {
        struct Binding {
            bound: AtomicBool,
        }

        impl crate::module::api::Module for Binding {
            fn consume_message(&self, _: &Message) -> crate::module::api::ConsumeResult {
                Ok(())
            }

            fn bind(&self, controller: crate::module::api::WeakModuleController) {
                let name_matches = controller
                    .upgrade()
                    .is_some_and(|c| c.name() == "bound");
                self.bound.store(name_matches, Ordering::SeqCst);
            }
        }

        let module = Arc::new(Binding {
            bound: AtomicBool::new(false),
        });
        let controller = ModuleController::new("bound");
        controller
            .initialize(module.clone(), ControllerConfig::default())
            .unwrap();

        assert!(module.bound.load(Ordering::SeqCst));
    }
}
