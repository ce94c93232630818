//! Test modules for controller extensions
