//! Test modules for the module coordinator
