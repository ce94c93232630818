//! Test modules for controllers
//!
//! Tests are organized by functional area.

mod lifecycle;
