//! Unit tests for individual components

mod builders_test;
mod config_test;
mod envelope_test;
mod error_test;
