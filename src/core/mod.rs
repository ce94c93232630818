//! Core services and infrastructure

pub mod error_handling;
pub mod logging;
pub mod shutdown;
pub mod sync;
pub mod time;
pub mod timer;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
