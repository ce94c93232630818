//! Test modules for the built-in modules and extensions
