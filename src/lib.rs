//! Threaded module framework
//!
//! A *module* consumes messages on worker threads owned by a
//! [`ModuleController`](module::api::ModuleController). Controllers carry a
//! normal and a priority queue, a start/stop lifecycle and a collection of
//! extensions that observe or alter every step. A
//! [`ModuleCoordinator`](coordinator::api::ModuleCoordinator) registers
//! controllers by name and routes messages between them. The [`builtin`]
//! module provides timers, delayed delivery, retries, supervision and
//! draining on stop.

pub mod app;
pub mod builtin;
pub mod coordinator;
pub mod core;
pub mod extension;
pub mod module;
pub mod queue;
