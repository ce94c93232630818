//! Command-line interface: argument parsing and tabular output

pub mod api;
pub mod args;
pub mod display;

#[cfg(test)]
mod tests;
