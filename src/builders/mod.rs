//! Builders to construct clients and pools from configuration.

pub mod pool_builder;

pub use pool_builder::{build_client, build_pool, build_pool_from_env};
