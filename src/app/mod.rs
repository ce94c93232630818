//! Application layer for the `moduleflow` binary

pub mod cli;
pub mod config;
pub mod demo;
pub mod kinds;
pub mod runtime;
pub mod startup;
