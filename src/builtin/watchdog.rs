//! Watchdog module
//!
//! Supervises other modules of the same coordinator. On every
//! [`TimedTriggerMessage`] it looks for supervised controllers that are
//! still marked running but have no live workers, and restarts them. After
//! `max_restarts` restarts of one module it gives up and raises
//! [`ModuleError::ModuleDied`] on its own controller.

use crate::builtin::timed_trigger::{TimedTriggerExtension, TimedTriggerMessage};
use crate::core::sync::{lock_or_recover, read_or_recover, write_or_recover};
use crate::coordinator::api::ModuleCoordinator;
use crate::module::api::{
    ConsumeResult, ControllerConfig, Module, ModuleController, ModuleError, ModuleResult,
    UnsupportedMessage, WeakModuleController,
};
use crate::queue::api::Message;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

#[derive(Default)]
struct RestartLedger {
    restarts: HashMap<String, u32>,
    abandoned: HashSet<String>,
}

pub struct WatchdogModule {
    max_restarts: u32,
    supervised: RwLock<Vec<String>>,
    ledger: Mutex<RestartLedger>,
    controller: OnceLock<WeakModuleController>,
}

impl WatchdogModule {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            max_restarts,
            supervised: RwLock::new(Vec::new()),
            ledger: Mutex::new(RestartLedger::default()),
            controller: OnceLock::new(),
        }
    }

    /// Add `name` to the supervised modules
    pub fn supervise(self, name: impl Into<String>) -> Self {
        self.add_supervised(name);
        self
    }

    pub fn add_supervised(&self, name: impl Into<String>) {
        let name = name.into();
        let mut supervised = write_or_recover(&self.supervised, "watchdog supervised");
        if !supervised.contains(&name) {
            supervised.push(name);
        }
    }

    pub fn supervised(&self) -> Vec<String> {
        read_or_recover(&self.supervised, "watchdog supervised").clone()
    }

    /// Restarts performed so far for `name`
    pub fn restarts(&self, name: &str) -> u32 {
        lock_or_recover(&self.ledger, "watchdog ledger")
            .restarts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Register this watchdog under `name`, checking every `interval`
    pub fn install(
        self,
        coordinator: &ModuleCoordinator,
        name: &str,
        interval: Duration,
    ) -> ModuleResult<ModuleController> {
        let controller =
            coordinator.add_module_with(name, Arc::new(self), ControllerConfig::with_threads(1))?;
        controller
            .extensions()
            .add(Arc::new(TimedTriggerExtension::periodic(interval)));
        Ok(controller)
    }

    fn check_supervised(&self) {
        let Some(own) = self.controller.get().and_then(WeakModuleController::upgrade) else {
            return;
        };
        let Some(coordinator) = own.coordinator() else {
            log::warn!("Watchdog '{}' has no coordinator", own.name());
            return;
        };

        for name in self.supervised() {
            let Some(target) = coordinator.controller(&name) else {
                log::trace!("Supervised module '{}' is not registered", name);
                continue;
            };
            if target.ptr_eq(&own) || !target.is_running() || target.is_alive() {
                continue;
            }
            self.recover(&own, &target);
        }
    }

    fn recover(&self, own: &ModuleController, target: &ModuleController) {
        let name = target.name().to_string();
        let restarts = {
            let ledger = lock_or_recover(&self.ledger, "watchdog ledger");
            if ledger.abandoned.contains(&name) {
                return;
            }
            ledger.restarts.get(&name).copied().unwrap_or(0)
        };

        if restarts >= self.max_restarts {
            lock_or_recover(&self.ledger, "watchdog ledger")
                .abandoned
                .insert(name.clone());
            let error = ModuleError::ModuleDied {
                module: name,
                restarts,
            };
            log::error!("{}", error);
            own.notify_unhandled(&error);
            return;
        }

        let result = target.restart_if_dead();
        let restarted = match result {
            Ok(restarted) => restarted,
            Err(error) => {
                log::error!("Watchdog failed to restart '{}': {}", name, error);
                true
            }
        };
        if restarted {
            let mut ledger = lock_or_recover(&self.ledger, "watchdog ledger");
            let count = ledger.restarts.entry(name.clone()).or_insert(0);
            *count += 1;
            log::warn!(
                "Watchdog restarted '{}' ({}/{})",
                name,
                count,
                self.max_restarts
            );
        }
    }
}

impl Module for WatchdogModule {
    fn bind(&self, controller: WeakModuleController) {
        let _ = self.controller.set(controller);
    }

    fn consume_message(&self, message: &Message) -> ConsumeResult {
        if message.is::<TimedTriggerMessage>() {
            self.check_supervised();
            Ok(())
        } else {
            Err(Box::new(UnsupportedMessage {
                expected: std::any::type_name::<TimedTriggerMessage>(),
                actual: message.type_name(),
            }))
        }
    }
}
