//! Type-keyed extension collection owned by each controller
//!
//! Extensions are stored under a key type, by default their own concrete
//! type. `add_as::<K>()` stores one under another key, typically a marker
//! trait, so that `get_by_key::<K>()` finds it without knowing the concrete
//! type. At most one extension exists per key; adding a second replaces the
//! first in place, so attachment order is preserved.

use crate::core::sync::{read_or_recover, write_or_recover};
use crate::extension::traits::{AsAny, ModuleExtension};
use crate::module::api::ModuleController;
use crate::module::controller::ControllerShared;
use std::any::{Any, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};

struct ExtensionEntry {
    key: TypeId,
    key_name: &'static str,
    extension: Arc<dyn ModuleExtension>,
}

/// Extensions attached to one controller, in attachment order
pub struct ModuleExtensionCollection {
    entries: RwLock<Vec<ExtensionEntry>>,
    owner: Weak<ControllerShared>,
}

impl ModuleExtensionCollection {
    pub(crate) fn new(owner: Weak<ControllerShared>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            owner,
        }
    }

    /// Add `extension` keyed by its concrete type
    ///
    /// Returns the extension it replaced, which has already been detached.
    pub fn add<T: ModuleExtension>(&self, extension: Arc<T>) -> Option<Arc<dyn ModuleExtension>> {
        self.insert(TypeId::of::<T>(), std::any::type_name::<T>(), extension)
    }

    /// Add `extension` keyed by `K`
    pub fn add_as<K: ?Sized + Any>(
        &self,
        extension: Arc<dyn ModuleExtension>,
    ) -> Option<Arc<dyn ModuleExtension>> {
        self.insert(TypeId::of::<K>(), std::any::type_name::<K>(), extension)
    }

    fn insert(
        &self,
        key: TypeId,
        key_name: &'static str,
        extension: Arc<dyn ModuleExtension>,
    ) -> Option<Arc<dyn ModuleExtension>> {
        let replaced = {
            let mut entries = write_or_recover(&self.entries, "extension collection");
            match entries.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => Some(std::mem::replace(
                    &mut entry.extension,
                    Arc::clone(&extension),
                )),
                None => {
                    entries.push(ExtensionEntry {
                        key,
                        key_name,
                        extension: Arc::clone(&extension),
                    });
                    None
                }
            }
        };

        if let Some(controller) = self.owner_controller() {
            if let Some(old) = &replaced {
                log::debug!(
                    "Replacing extension {} on '{}' ({})",
                    old.name(),
                    controller.name(),
                    key_name
                );
                guarded(old.as_ref(), "detach", |ext| ext.detach(&controller));
            }
            log::debug!(
                "Attaching extension {} to '{}'",
                extension.name(),
                controller.name()
            );
            guarded(extension.as_ref(), "attach", |ext| ext.attach(&controller));
        }

        replaced
    }

    /// Remove and detach the extension stored under `K`
    pub fn remove<K: ?Sized + Any>(&self) -> Option<Arc<dyn ModuleExtension>> {
        let removed = {
            let mut entries = write_or_recover(&self.entries, "extension collection");
            let key = TypeId::of::<K>();
            entries
                .iter()
                .position(|entry| entry.key == key)
                .map(|index| entries.remove(index).extension)
        };

        if let (Some(extension), Some(controller)) = (&removed, self.owner_controller()) {
            guarded(extension.as_ref(), "detach", |ext| ext.detach(&controller));
        }
        removed
    }

    /// Find an extension of concrete type `T`
    ///
    /// The entry keyed by `T` is preferred; otherwise the first entry whose
    /// value is a `T` (stored under some other key) is returned.
    pub fn get<T: ModuleExtension>(&self) -> Option<Arc<T>> {
        let entries = read_or_recover(&self.entries, "extension collection");
        let key = TypeId::of::<T>();
        let found = entries
            .iter()
            .find(|entry| entry.key == key)
            .or_else(|| entries.iter().find(|entry| (*entry.extension).as_any().is::<T>()))?;

        AsAny::into_any_arc(Arc::clone(&found.extension))
            .downcast::<T>()
            .ok()
    }

    /// The extension stored under `K`, whatever its concrete type
    pub fn get_by_key<K: ?Sized + Any>(&self) -> Option<Arc<dyn ModuleExtension>> {
        let key = TypeId::of::<K>();
        read_or_recover(&self.entries, "extension collection")
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| Arc::clone(&entry.extension))
    }

    pub fn contains<K: ?Sized + Any>(&self) -> bool {
        let key = TypeId::of::<K>();
        read_or_recover(&self.entries, "extension collection")
            .iter()
            .any(|entry| entry.key == key)
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.entries, "extension collection").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key type names in attachment order
    pub fn keys(&self) -> Vec<&'static str> {
        read_or_recover(&self.entries, "extension collection")
            .iter()
            .map(|entry| entry.key_name)
            .collect()
    }

    /// Remove and detach every extension
    pub fn clear(&self) {
        let drained: Vec<ExtensionEntry> = {
            let mut entries = write_or_recover(&self.entries, "extension collection");
            entries.drain(..).collect()
        };

        if let Some(controller) = self.owner_controller() {
            for entry in &drained {
                guarded(entry.extension.as_ref(), "detach", |ext| ext.detach(&controller));
            }
        }
    }

    /// Current extensions in attachment order
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ModuleExtension>> {
        read_or_recover(&self.entries, "extension collection")
            .iter()
            .map(|entry| Arc::clone(&entry.extension))
            .collect()
    }

    /// Invoke `hook` on every extension, isolating panics
    ///
    /// Runs over a snapshot, so hooks may add or remove extensions.
    pub(crate) fn broadcast(&self, hook: &'static str, mut call: impl FnMut(&dyn ModuleExtension)) {
        for extension in self.snapshot() {
            guarded(extension.as_ref(), hook, &mut call);
        }
    }

    fn owner_controller(&self) -> Option<ModuleController> {
        self.owner.upgrade().map(ModuleController::from_shared)
    }
}

fn guarded(
    extension: &dyn ModuleExtension,
    hook: &'static str,
    mut call: impl FnMut(&dyn ModuleExtension),
) {
    if catch_unwind(AssertUnwindSafe(|| call(extension))).is_err() {
        log::warn!("Extension {} panicked in {}", extension.name(), hook);
    }
}

impl std::fmt::Debug for ModuleExtensionCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleExtensionCollection")
            .field("keys", &self.keys())
            .finish()
    }
}
