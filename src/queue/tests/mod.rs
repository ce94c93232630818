//! Test modules for the message queue
//!
//! Tests are organized by functional area.
