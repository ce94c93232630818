//! Module Coordinator
//!
//! The coordinator is the application-facing entry point: it names
//! controllers, routes messages to them by name, starts and stops them in
//! bulk and collects the errors nobody handled.
//!
//! Controllers keep a weak back-reference to their coordinator, which is how
//! built-in modules such as the scheduler and the retry extension route
//! messages to other modules.

mod registry;

pub mod api;

#[cfg(test)]
mod tests;
