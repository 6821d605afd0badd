//! Core client, pool, and wire abstractions.

pub mod client;
pub mod connector;
pub mod envelope;
pub mod error;
pub mod job;
pub mod pool;

pub use client::{Client, DEFAULT_PING_TIMEOUT};
pub use connector::{Connector, TransportContext, WaitError};
pub use envelope::{BrokerId, CallOutcome, ReplyEnvelope, WorkerId, NO_WORKER, PING};
pub use error::{AppResult, ClientError};
pub use job::Job;
pub use pool::{Pool, PoolStats, DEFAULT_POOL_PING_TIMEOUT};
