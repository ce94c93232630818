//! Framework integration test modules

pub mod delivery;
pub mod pipeline;
pub mod supervision;
