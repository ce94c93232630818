//! Module kinds the binary can instantiate from configuration
//!
//! A kind maps the `kind = "..."` string of a `[[modules]]` entry to a
//! factory. Kinds register themselves with [`module_kind!`](crate::module_kind)
//! and are discovered through `inventory`, so adding one needs no central
//! list.

use crate::app::config::{ConfigError, ModuleConfig};
use crate::module::api::Module;
use std::sync::Arc;

/// Builds a module from its configuration entry
pub type KindFactory = fn(&ModuleConfig) -> Result<Arc<dyn Module>, ConfigError>;

/// Registration record for one module kind
pub struct ModuleKind {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: KindFactory,
}

impl ModuleKind {
    pub fn build(&self, config: &ModuleConfig) -> Result<Arc<dyn Module>, ConfigError> {
        (self.factory)(config)
    }
}

impl std::fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleKind").field("name", &self.name).finish()
    }
}

inventory::collect!(ModuleKind);

/// Register a module kind for discovery
///
/// ```rust,ignore
/// moduleflow::module_kind!("echo", "Logs every text payload", build_echo);
/// ```
#[macro_export]
macro_rules! module_kind {
    ($name:expr, $description:expr, $factory:expr) => {
        inventory::submit! {
            $crate::app::kinds::ModuleKind {
                name: $name,
                description: $description,
                factory: $factory,
            }
        }
    };
}

/// All registered kinds, sorted by name
pub fn discover_kinds() -> Vec<&'static ModuleKind> {
    let mut kinds: Vec<&'static ModuleKind> = inventory::iter::<ModuleKind>().collect();
    kinds.sort_by_key(|kind| kind.name);
    kinds
}

pub fn find_kind(name: &str) -> Option<&'static ModuleKind> {
    inventory::iter::<ModuleKind>().find(|kind| kind.name == name)
}

/// Instantiate the module described by `config`
pub fn build_module(config: &ModuleConfig) -> Result<Arc<dyn Module>, ConfigError> {
    let kind = find_kind(&config.kind).ok_or_else(|| ConfigError::Invalid {
        message: format!(
            "module '{}' has unknown kind '{}' (known: {})",
            config.name,
            config.kind,
            discover_kinds()
                .iter()
                .map(|kind| kind.name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })?;
    log::debug!("Building module '{}' of kind '{}'", config.name, kind.name);
    kind.build(config)
}
