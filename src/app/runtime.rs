//! Builds and drives a coordinator from a [`RuntimeConfig`]

use crate::app::config::{ConfigError, RuntimeConfig};
use crate::app::kinds::build_module;
use crate::builtin::api::{
    ConsumePendingMessagesBeforeStopExtension, RetryExtension, SchedulerModule,
    TimedTriggerExtension, WatchdogModule,
};
use crate::core::error_handling::ContextualError;
use crate::coordinator::api::ModuleCoordinator;
use crate::module::api::{ModuleError, ModuleState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl ContextualError for RuntimeError {
    fn is_user_actionable(&self) -> bool {
        match self {
            RuntimeError::Config(error) => error.is_user_actionable(),
            RuntimeError::Module(error) => error.is_user_actionable(),
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            RuntimeError::Config(error) => error.user_message(),
            RuntimeError::Module(error) => error.user_message(),
        }
    }
}

/// Point-in-time view of one hosted module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    pub threads: usize,
    pub live_workers: usize,
    pub queued: usize,
}

/// A configured coordinator plus the modules it hosts
pub struct Runtime {
    coordinator: ModuleCoordinator,
}

impl Runtime {
    /// Register every configured module and its extensions; nothing is started
    pub fn build(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let coordinator = ModuleCoordinator::with_defaults(config.defaults);
        coordinator.on_unhandled_exception(|error| match std::error::Error::source(error) {
            Some(source) => log::error!("Unhandled: {}: {}", error, source),
            None => log::error!("Unhandled: {}", error),
        });

        if config.scheduler.enabled {
            SchedulerModule::install(&coordinator, &config.scheduler.name)?;
        }

        for module_config in &config.modules {
            let module = build_module(module_config)?;
            let controller = coordinator.add_module_with(
                module_config.name.clone(),
                module,
                module_config.controller_config(config.defaults),
            )?;

            if let Some(retry) = &module_config.retry {
                controller.extensions().add(Arc::new(RetryExtension::new(
                    config.scheduler.name.clone(),
                    Duration::from_millis(retry.delay_ms),
                    retry.max_retries,
                )));
            }
            if let Some(timer) = &module_config.timer {
                let interval = Duration::from_millis(timer.interval_ms);
                let initial = timer.initial_delay_ms.map_or(interval, Duration::from_millis);
                controller.extensions().add(Arc::new(TimedTriggerExtension::new(
                    Some(initial),
                    Some(interval),
                    true,
                )));
            }
            if module_config.drain_before_stop {
                controller
                    .extensions()
                    .add(Arc::new(ConsumePendingMessagesBeforeStopExtension::default()));
            }
        }

        if config.watchdog.enabled {
            let supervised: Vec<String> = if config.watchdog.supervise.is_empty() {
                config.modules.iter().map(|m| m.name.clone()).collect()
            } else {
                config.watchdog.supervise.clone()
            };
            let watchdog = WatchdogModule::new(config.watchdog.max_restarts);
            for name in supervised {
                watchdog.add_supervised(name);
            }
            watchdog.install(&coordinator, &config.watchdog.name, config.watchdog.interval())?;
        }

        log::info!("Runtime ready with {} module(s)", coordinator.len());
        Ok(Self { coordinator })
    }

    pub fn coordinator(&self) -> &ModuleCoordinator {
        &self.coordinator
    }

    pub fn start(&self) {
        log::info!("Starting modules: {}", self.coordinator.module_names().join(", "));
        self.coordinator.start_all();
    }

    pub fn stop(&self) {
        log::info!("Stopping modules");
        self.coordinator.stop_all();
    }

    /// Status of every module in registration order
    pub fn status(&self) -> Vec<ModuleStatus> {
        self.coordinator
            .controllers()
            .iter()
            .map(|controller| ModuleStatus {
                name: controller.name().to_string(),
                state: controller.state(),
                threads: controller.thread_count(),
                live_workers: controller.live_workers(),
                queued: controller.message_count(),
            })
            .collect()
    }
}
