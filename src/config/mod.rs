//! Configuration models for clients, pools, and timeouts.

pub mod policy;
pub mod pool;

pub use policy::TimeoutPolicy;
pub use pool::{ClientConfig, PoolConfig, DEFAULT_ENDPOINT, DEFAULT_POOL_SIZE};
