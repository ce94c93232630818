//! Tests for argument parsing and tabular output
