//! Crate-level test suites.

mod support;
