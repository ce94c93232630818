//! Module Coordinator
//!
//! Thread-safe registry of named controllers with message routing, bulk
//! lifecycle management and coordinator-wide error observers.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write, read_or_recover, write_or_recover};
use crate::extension::api::ModuleExtension;
use crate::module::api::{
    ControllerConfig, Module, ModuleController, ModuleError, ModuleResult, ModuleState,
};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};

/// Callback invoked for every error nobody handled
pub type UnhandledObserver = Arc<dyn Fn(&ModuleError) + Send + Sync>;

#[derive(Default)]
struct Registry {
    controllers: HashMap<String, ModuleController>,
    order: Vec<String>,
}

impl Registry {
    fn ordered(&self) -> Vec<ModuleController> {
        self.order
            .iter()
            .filter_map(|name| self.controllers.get(name).cloned())
            .collect()
    }
}

struct CoordinatorShared {
    registry: RwLock<Registry>,
    observers: RwLock<Vec<UnhandledObserver>>,
    defaults: ControllerConfig,
}

impl Drop for CoordinatorShared {
    fn drop(&mut self) {
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for controller in registry.ordered().into_iter().rev() {
            controller.set_coordinator(None);
            if controller.state() == ModuleState::Stopped {
                continue;
            }
            let result = if controller.config().background || controller.on_own_worker() {
                log::debug!("Coordinator dropped; detaching '{}'", controller.name());
                controller.stop_async()
            } else {
                log::debug!("Coordinator dropped; stopping '{}'", controller.name());
                controller.stop()
            };
            if let Err(error) = result {
                log::error!("Failed to stop '{}': {}", controller.name(), error);
            }
        }
    }
}

/// Name → controller registry and message router
///
/// Cloning shares the same coordinator. When the last handle is dropped,
/// controllers still running are stopped: foreground ones synchronously,
/// background ones asynchronously.
///
/// # Example
///
/// ```rust
/// use moduleflow::coordinator::api::ModuleCoordinator;
/// use moduleflow::module::api::TypedModule;
/// use std::sync::Arc;
///
/// let coordinator = ModuleCoordinator::new();
/// coordinator
///     .add_module("printer", Arc::new(TypedModule::new(|line: &String| {
///         println!("{}", line);
///         Ok(())
///     })))
///     .unwrap();
///
/// coordinator.start_all();
/// coordinator.post_message("printer", String::from("hello")).unwrap();
/// assert!(coordinator.post_message("missing", String::new()).is_err());
/// coordinator.stop_all();
/// ```
#[derive(Clone)]
pub struct ModuleCoordinator {
    shared: Arc<CoordinatorShared>,
}

/// Non-owning handle held by controllers and built-in modules
#[derive(Clone)]
pub struct WeakModuleCoordinator {
    shared: Weak<CoordinatorShared>,
}

impl WeakModuleCoordinator {
    pub fn upgrade(&self) -> Option<ModuleCoordinator> {
        self.shared
            .upgrade()
            .map(|shared| ModuleCoordinator { shared })
    }
}

impl std::fmt::Debug for WeakModuleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakModuleCoordinator")
    }
}

impl Default for ModuleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCoordinator {
    pub fn new() -> Self {
        Self::with_defaults(ControllerConfig::default())
    }

    /// Coordinator whose `add_module` uses `defaults` for worker configuration
    pub fn with_defaults(defaults: ControllerConfig) -> Self {
        Self {
            shared: Arc::new(CoordinatorShared {
                registry: RwLock::new(Registry::default()),
                observers: RwLock::new(Vec::new()),
                defaults,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakModuleCoordinator {
        WeakModuleCoordinator {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn defaults(&self) -> ControllerConfig {
        self.shared.defaults
    }

    fn registry(&self) -> ModuleResult<RwLockReadGuard<'_, Registry>> {
        handle_rwlock_read(self.shared.registry.read(), |message| {
            ModuleError::Synchronisation { message }
        })
    }

    /// Register `module` under `name` with the default worker configuration
    pub fn add_module(
        &self,
        name: impl Into<String>,
        module: Arc<dyn Module>,
    ) -> ModuleResult<ModuleController> {
        self.add_module_with(name, module, self.shared.defaults)
    }

    /// Register `module` under `name` with an explicit worker configuration
    ///
    /// The controller is created, initialised and bound to this coordinator;
    /// it is not started.
    pub fn add_module_with(
        &self,
        name: impl Into<String>,
        module: Arc<dyn Module>,
        config: ControllerConfig,
    ) -> ModuleResult<ModuleController> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModuleError::InvalidArgument {
                argument: "name",
                reason: "module name must not be empty".to_string(),
            });
        }
        if self.contains(&name) {
            return Err(ModuleError::DuplicateModule { name });
        }

        let controller = ModuleController::new(name.clone());
        controller.set_coordinator(Some(self.downgrade()));
        controller.initialize(module, config)?;

        let mut registry = handle_rwlock_write(self.shared.registry.write(), |message| {
            ModuleError::Synchronisation { message }
        })?;
        if registry.controllers.contains_key(&name) {
            return Err(ModuleError::DuplicateModule { name });
        }
        registry.controllers.insert(name.clone(), controller.clone());
        registry.order.push(name.clone());
        drop(registry);

        log::debug!("Registered module '{}'", name);
        Ok(controller)
    }

    /// Unregister a module, stopping it first
    pub fn remove_module(&self, name: &str) -> ModuleResult<ModuleController> {
        let controller = {
            let mut registry = handle_rwlock_write(self.shared.registry.write(), |message| {
                ModuleError::Synchronisation { message }
            })?;
            let controller = registry
                .controllers
                .remove(name)
                .ok_or_else(|| ModuleError::ModuleNotFound {
                    name: name.to_string(),
                })?;
            registry.order.retain(|registered| registered != name);
            controller
        };

        if controller.on_own_worker() {
            controller.stop_async()?;
        } else {
            controller.stop()?;
        }
        controller.set_coordinator(None);
        log::debug!("Removed module '{}'", name);
        Ok(controller)
    }

    pub fn controller(&self, name: &str) -> Option<ModuleController> {
        self.registry().ok()?.controllers.get(name).cloned()
    }

    fn lookup(&self, name: &str) -> ModuleResult<ModuleController> {
        self.registry()?
            .controllers
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::ModuleNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        read_or_recover(&self.shared.registry, "coordinator registry")
            .controllers
            .contains_key(name)
    }

    /// Registered names in registration order
    pub fn module_names(&self) -> Vec<String> {
        read_or_recover(&self.shared.registry, "coordinator registry")
            .order
            .clone()
    }

    /// Registered controllers in registration order
    pub fn controllers(&self) -> Vec<ModuleController> {
        read_or_recover(&self.shared.registry, "coordinator registry").ordered()
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.shared.registry, "coordinator registry")
            .controllers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach `extension` to the named module, keyed by its concrete type
    pub fn add_extension<T: ModuleExtension>(
        &self,
        name: &str,
        extension: Arc<T>,
    ) -> ModuleResult<()> {
        self.lookup(name)?.extensions().add(extension);
        Ok(())
    }

    /// Attach `extension` to the named module under key `K`
    pub fn add_extension_as<K: ?Sized + Any>(
        &self,
        name: &str,
        extension: Arc<dyn ModuleExtension>,
    ) -> ModuleResult<()> {
        self.lookup(name)?.extensions().add_as::<K>(extension);
        Ok(())
    }

    /// Attach one extension, built by `factory`, to every registered module
    pub fn add_extension_to_all<T, F>(&self, factory: F)
    where
        T: ModuleExtension,
        F: Fn(&ModuleController) -> Arc<T>,
    {
        for controller in self.controllers() {
            controller.extensions().add(factory(&controller));
        }
    }

    pub fn get_extension<T: ModuleExtension>(&self, name: &str) -> Option<Arc<T>> {
        self.controller(name)?.extensions().get::<T>()
    }

    /// Enqueue a message on the named module
    ///
    /// Returns `Ok(false)` when an extension cancelled the enqueue.
    pub fn post_message<T: Any + Send + Sync>(&self, name: &str, payload: T) -> ModuleResult<bool> {
        Ok(self.lookup(name)?.enqueue_message(payload))
    }

    /// Enqueue a message on the named module's priority channel
    pub fn post_priority_message<T: Any + Send + Sync>(
        &self,
        name: &str,
        payload: T,
    ) -> ModuleResult<bool> {
        Ok(self.lookup(name)?.enqueue_priority_message(payload))
    }

    /// Start every module in registration order
    ///
    /// Failures are logged and reported to the observers; the remaining
    /// modules are still started.
    pub fn start_all(&self) {
        for controller in self.controllers() {
            if let Err(error) = controller.start() {
                log::error!("Failed to start '{}': {}", controller.name(), error);
                self.notify_unhandled(&error);
            }
        }
    }

    /// Stop every module in reverse registration order
    ///
    /// A module whose own worker calls this is stopped asynchronously.
    pub fn stop_all(&self) {
        for controller in self.controllers().into_iter().rev() {
            let result = if controller.on_own_worker() {
                controller.stop_async()
            } else {
                controller.stop()
            };
            if let Err(error) = result {
                log::error!("Failed to stop '{}': {}", controller.name(), error);
                self.notify_unhandled(&error);
            }
        }
    }

    /// Register an observer for errors nobody handled
    pub fn on_unhandled_exception<F>(&self, observer: F)
    where
        F: Fn(&ModuleError) + Send + Sync + 'static,
    {
        write_or_recover(&self.shared.observers, "coordinator observers").push(Arc::new(observer));
    }

    pub(crate) fn notify_unhandled(&self, error: &ModuleError) {
        let observers: Vec<UnhandledObserver> =
            read_or_recover(&self.shared.observers, "coordinator observers").clone();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(error))).is_err() {
                log::warn!("Unhandled-exception observer panicked");
            }
        }
    }
}

impl std::fmt::Debug for ModuleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCoordinator")
            .field("modules", &self.module_names())
            .finish()
    }
}
