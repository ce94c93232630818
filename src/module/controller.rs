//! Module Controller
//!
//! A [`ModuleController`] hosts one [`Module`]: it owns the message queue,
//! the worker threads that drain it, the extension collection and the
//! start/stop lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//!   new ──initialize──▶ Stopped ──start──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                          ▲                  │                              │
//!                          └──────────────────┴──────── start again ◀────────┘
//! ```
//!
//! `start` and `stop` are idempotent and serialised against each other.
//! Messages may be enqueued in any state; they are consumed only while
//! running, and whatever is still queued when a stop completes stays queued
//! until the next start.
//!
//! Controllers are cheap handles: cloning shares the same controller.

use crate::coordinator::api::{ModuleCoordinator, WeakModuleCoordinator};
use crate::core::sync::{lock_or_recover, read_or_recover, write_or_recover};
use crate::extension::api::{EnqueueEvent, ModuleExtensionCollection};
use crate::extension::traits::ModuleExtension;
use crate::module::dispatch;
use crate::module::error::{ModuleError, ModuleResult};
use crate::module::traits::Module;
use crate::module::types::{ControllerConfig, ModuleState};
use crate::queue::api::{Message, MessageQueue};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ControllerShared {
    pub(super) id: u64,
    pub(super) name: String,
    module: RwLock<Option<Arc<dyn Module>>>,
    config: RwLock<ControllerConfig>,
    pub(super) queue: MessageQueue,
    extensions: ModuleExtensionCollection,
    lifecycle: Mutex<Vec<JoinHandle<()>>>,
    state: AtomicU8,
    pub(super) dispatching: AtomicBool,
    pub(super) live_workers: AtomicUsize,
    coordinator: RwLock<Option<WeakModuleCoordinator>>,
}

impl ControllerShared {
    fn set_state(&self, state: ModuleState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// Handle to a module controller
#[derive(Clone)]
pub struct ModuleController {
    pub(super) shared: Arc<ControllerShared>,
}

/// Non-owning handle to a module controller
#[derive(Clone)]
pub struct WeakModuleController {
    shared: Weak<ControllerShared>,
}

impl WeakModuleController {
    pub fn upgrade(&self) -> Option<ModuleController> {
        self.shared.upgrade().map(ModuleController::from_shared)
    }
}

impl fmt::Debug for WeakModuleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(controller) => write!(f, "WeakModuleController({})", controller.name()),
            None => f.write_str("WeakModuleController(<dropped>)"),
        }
    }
}

impl ModuleController {
    /// Create an uninitialised, stopped controller
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let shared = Arc::new_cyclic(|owner: &Weak<ControllerShared>| ControllerShared {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            queue: MessageQueue::new(name.clone()),
            name,
            module: RwLock::new(None),
            config: RwLock::new(ControllerConfig::default()),
            extensions: ModuleExtensionCollection::new(owner.clone()),
            lifecycle: Mutex::new(Vec::new()),
            state: AtomicU8::new(ModuleState::Stopped.as_u8()),
            dispatching: AtomicBool::new(false),
            live_workers: AtomicUsize::new(0),
            coordinator: RwLock::new(None),
        });
        Self { shared }
    }

    pub(crate) fn from_shared(shared: Arc<ControllerShared>) -> Self {
        Self { shared }
    }

    pub fn downgrade(&self) -> WeakModuleController {
        WeakModuleController {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// True when called from one of this controller's worker threads
    pub fn on_own_worker(&self) -> bool {
        dispatch::is_current_worker(self.shared.id)
    }

    /// True when both handles refer to the same controller
    pub fn ptr_eq(&self, other: &ModuleController) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Install the hosted module and worker configuration
    ///
    /// A controller is initialised exactly once; the module's
    /// [`bind`](Module::bind) hook runs before this returns.
    pub fn initialize(&self, module: Arc<dyn Module>, config: ControllerConfig) -> ModuleResult<()> {
        if config.thread_count == 0 {
            return Err(ModuleError::InvalidArgument {
                argument: "thread_count",
                reason: format!(
                    "thread_count must be at least 1 for module '{}'",
                    self.name()
                ),
            });
        }

        {
            let _workers = lock_or_recover(&self.shared.lifecycle, "controller lifecycle");
            let mut slot = write_or_recover(&self.shared.module, "controller module");
            if slot.is_some() {
                return Err(ModuleError::AlreadyInitialized {
                    module: self.name().to_string(),
                });
            }
            *slot = Some(Arc::clone(&module));
            *write_or_recover(&self.shared.config, "controller config") = config;
        }

        module.bind(self.downgrade());
        log::debug!(
            "Initialised '{}' ({} worker(s){})",
            self.name(),
            config.thread_count,
            if config.background { ", background" } else { "" }
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        read_or_recover(&self.shared.module, "controller module").is_some()
    }

    pub fn module(&self) -> Option<Arc<dyn Module>> {
        read_or_recover(&self.shared.module, "controller module").clone()
    }

    pub fn config(&self) -> ControllerConfig {
        *read_or_recover(&self.shared.config, "controller config")
    }

    pub fn thread_count(&self) -> usize {
        self.config().thread_count
    }

    pub fn state(&self) -> ModuleState {
        ModuleState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ModuleState::Running
    }

    /// Running and at least one worker thread is still dispatching
    pub fn is_alive(&self) -> bool {
        self.is_running() && self.live_workers() > 0
    }

    /// False once a stop, kill or stop message has halted dispatch
    pub fn is_dispatching(&self) -> bool {
        self.shared.dispatching.load(Ordering::SeqCst)
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::SeqCst)
    }

    /// Start the worker threads
    ///
    /// No-op when already running. Fails with
    /// [`ModuleError::NotInitialized`] before `initialize`.
    pub fn start(&self) -> ModuleResult<()> {
        if self.on_own_worker() {
            log::debug!("Ignoring start of '{}' from its own worker", self.name());
            return Ok(());
        }

        let mut workers = lock_or_recover(&self.shared.lifecycle, "controller lifecycle");
        if self.is_running() {
            log::trace!("'{}' already running", self.name());
            return Ok(());
        }
        self.start_locked(&mut workers)
    }

    fn start_locked(&self, workers: &mut Vec<JoinHandle<()>>) -> ModuleResult<()> {
        let module = self.module().ok_or_else(|| ModuleError::NotInitialized {
            module: self.name().to_string(),
        })?;
        let config = self.config();

        self.broadcast("before_module_start", |ext| ext.before_module_start(self));

        self.shared.queue.reset_release();
        self.shared.dispatching.store(true, Ordering::SeqCst);
        for index in 0..config.thread_count {
            match dispatch::spawn_worker(self, Arc::clone(&module), index) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    self.halt_dispatch();
                    join_workers(self.name(), workers);
                    self.shared.set_state(ModuleState::Stopped);
                    return Err(ModuleError::WorkerSpawn {
                        module: self.name().to_string(),
                        source,
                    });
                }
            }
        }
        self.shared.set_state(ModuleState::Running);
        log::debug!(
            "Started '{}' with {} worker(s)",
            self.name(),
            config.thread_count
        );

        self.broadcast("after_module_start", |ext| ext.after_module_start(self));
        Ok(())
    }

    /// Stop dispatching and wait for every worker to exit
    ///
    /// No-op when already stopped. Calling this from one of the controller's
    /// own workers would deadlock, so it fails with
    /// [`ModuleError::StopFromWorker`] (also reported to the extensions as an
    /// unhandled error); use [`stop_async`](Self::stop_async) there instead.
    pub fn stop(&self) -> ModuleResult<()> {
        if self.on_own_worker() {
            let error = ModuleError::StopFromWorker {
                module: self.name().to_string(),
            };
            log::error!("{}", error);
            self.notify_unhandled(&error);
            return Err(error);
        }

        let mut workers = lock_or_recover(&self.shared.lifecycle, "controller lifecycle");
        if self.state() == ModuleState::Stopped {
            log::trace!("'{}' already stopped", self.name());
            return Ok(());
        }
        self.stop_locked(&mut workers);
        Ok(())
    }

    fn stop_locked(&self, workers: &mut Vec<JoinHandle<()>>) {
        self.shared.set_state(ModuleState::Stopping);
        self.broadcast("before_module_stop", |ext| ext.before_module_stop(self));

        self.halt_dispatch();
        join_workers(self.name(), workers);
        self.shared.set_state(ModuleState::Stopped);
        log::debug!(
            "Stopped '{}' ({} message(s) left queued)",
            self.name(),
            self.message_count()
        );

        self.broadcast("after_module_stop", |ext| ext.after_module_stop(self));
    }

    /// Request a stop without waiting for it
    ///
    /// The stop sequence runs on a dedicated thread, so this is safe to call
    /// from the controller's own workers.
    pub fn stop_async(&self) -> ModuleResult<()> {
        if self.state() == ModuleState::Stopped {
            return Ok(());
        }

        let controller = self.clone();
        thread::Builder::new()
            .name(format!("{}-stopper", self.name()))
            .spawn(move || {
                if let Err(error) = controller.stop() {
                    log::error!("Asynchronous stop of '{}' failed: {}", controller.name(), error);
                }
            })
            .map(|_| ())
            .map_err(|source| ModuleError::WorkerSpawn {
                module: self.name().to_string(),
                source,
            })
    }

    /// Make every worker exit without running the stop sequence
    ///
    /// The controller still reports [`ModuleState::Running`] but is no longer
    /// alive; this is the condition a watchdog recovers from.
    pub fn kill(&self) {
        log::warn!("Killing workers of '{}'", self.name());
        self.halt_dispatch();
    }

    /// Restart a controller that is running but has no live workers
    ///
    /// Returns `Ok(true)` when a restart happened. The check and the restart
    /// happen under the lifecycle lock, so an intentional stop in progress is
    /// never mistaken for a dead module.
    pub fn restart_if_dead(&self) -> ModuleResult<bool> {
        let mut workers = lock_or_recover(&self.shared.lifecycle, "controller lifecycle");
        if !self.is_running() || self.live_workers() > 0 {
            return Ok(false);
        }

        log::warn!("'{}' has no live workers; restarting", self.name());
        self.stop_locked(&mut workers);
        self.start_locked(&mut workers)?;
        Ok(true)
    }

    /// Halt dispatch for a consumed [`StopMessage`](crate::module::api::StopMessage)
    pub(super) fn halt_and_stop_async(&self) -> ModuleResult<()> {
        let _ = self.shared.state.compare_exchange(
            ModuleState::Running.as_u8(),
            ModuleState::Stopping.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.halt_dispatch();
        self.stop_async()
    }

    fn halt_dispatch(&self) {
        self.shared.dispatching.store(false, Ordering::SeqCst);
        self.shared.queue.release();
    }

    /// Add a message to the tail of the normal queue
    ///
    /// Returns `false` when an extension cancelled the enqueue.
    pub fn enqueue_message<T: Any + Send + Sync>(&self, payload: T) -> bool {
        self.enqueue(Message::new(payload), false)
    }

    /// Add a message to the priority queue, ahead of every normal message
    pub fn enqueue_priority_message<T: Any + Send + Sync>(&self, payload: T) -> bool {
        self.enqueue(Message::new(payload), true)
    }

    fn enqueue(&self, message: Message, priority: bool) -> bool {
        let mut event = EnqueueEvent::new(&message, priority);
        self.broadcast("before_enqueue_message", |ext| {
            ext.before_enqueue_message(self, &mut event)
        });
        if event.cancel {
            log::trace!(
                "Enqueue of {} {} on '{}' cancelled",
                message.type_name(),
                message.id(),
                self.name()
            );
            return false;
        }

        let priority = event.priority;
        if priority {
            self.shared.queue.enqueue_priority(message.clone());
        } else {
            self.shared.queue.enqueue(message.clone());
        }

        let event = EnqueueEvent::new(&message, priority);
        self.broadcast("after_enqueue_message", |ext| {
            ext.after_enqueue_message(self, &event)
        });
        true
    }

    /// Number of messages waiting in the queue
    pub fn message_count(&self) -> usize {
        self.shared.queue.count()
    }

    /// Copy of the waiting messages in dequeue order
    pub fn messages(&self) -> Vec<Message> {
        self.shared.queue.snapshot()
    }

    /// Remove and return every waiting message
    pub fn clear_messages(&self) -> Vec<Message> {
        self.shared.queue.clear_messages()
    }

    pub fn extensions(&self) -> &ModuleExtensionCollection {
        &self.shared.extensions
    }

    /// The coordinator this controller is registered with, if it still exists
    pub fn coordinator(&self) -> Option<ModuleCoordinator> {
        read_or_recover(&self.shared.coordinator, "controller coordinator")
            .as_ref()
            .and_then(WeakModuleCoordinator::upgrade)
    }

    pub(crate) fn set_coordinator(&self, coordinator: Option<WeakModuleCoordinator>) {
        *write_or_recover(&self.shared.coordinator, "controller coordinator") = coordinator;
    }

    /// Report an error nobody handled
    ///
    /// Extensions see it through `unhandled_module_exception_occurred`, then
    /// the owning coordinator's observers are notified.
    pub fn notify_unhandled(&self, error: &ModuleError) {
        self.broadcast("unhandled_module_exception_occurred", |ext| {
            ext.unhandled_module_exception_occurred(self, error)
        });
        if let Some(coordinator) = self.coordinator() {
            coordinator.notify_unhandled(error);
        }
    }

    pub(super) fn broadcast(&self, hook: &'static str, call: impl FnMut(&dyn ModuleExtension)) {
        self.shared.extensions.broadcast(hook, call);
    }
}

impl fmt::Debug for ModuleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleController")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("live_workers", &self.live_workers())
            .field("queued", &self.message_count())
            .finish()
    }
}

fn join_workers(name: &str, workers: &mut Vec<JoinHandle<()>>) {
    for handle in workers.drain(..) {
        if handle.join().is_err() {
            log::error!("A worker of '{}' terminated with a panic", name);
        }
    }
}
