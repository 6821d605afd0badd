//! # Dispatch Client
//!
//! Caller-side library for running jobs on a remote broker that hands work to a
//! pool of workers.
//!
//! The broker and its workers live elsewhere; this crate only speaks the wire
//! contract: a request is a serialized [`crate::core::Job`], a reply is
//! `<worker_id>:<OK|KO>:<payload>`, and `PING` asks the broker for its id.
//!
//! ## Components
//!
//! - **[`crate::core::Client`]**: one request/reply connection, one call in flight at a
//!   time, with a per-worker timeout-overflow tolerance policy
//! - **[`crate::core::Pool`]**: a fixed number of clients shared by concurrent callers;
//!   a client whose call fails is closed and replaced before anyone reuses it
//! - **[`crate::core::TransportContext`] / [`crate::core::Connector`]**: the transport seam,
//!   implemented over ZeroMQ (`zmq-transport` feature) and in memory
//!
//! ## Timeout overflow
//!
//! Every call has a base timeout and a larger max-overflow timeout. A worker
//! that answers between the two is tolerated `timeout_overflows` times in a row;
//! after that its late answers are discarded and the call times out. An
//! on-time answer resets the worker's counter.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use dispatch_client::config::PoolConfig;
//! use dispatch_client::core::ClientError;
//! use dispatch_client::infra::zmq::ZmqPool;
//!
//! let pool = ZmqPool::new(&PoolConfig::from_env()?)?;
//! match pool.execute("job body", Some(Duration::from_secs(3))) {
//!     Ok(result) => println!("{}", String::from_utf8_lossy(&result)),
//!     Err(ClientError::NoWorker) => eprintln!("broker saturated"),
//!     Err(ClientError::Execution(msg)) => eprintln!("worker failed: {msg}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! pool.close();
//! ```
//!
//! For complete examples, see:
//! - `tests/client_test.rs` - overflow policy and reply classification
//! - `tests/pool_test.rs` - concurrent use and failure isolation

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Client, pool, envelopes and the transport seam.
pub mod core;
/// Configuration models for clients, pools, and timeouts.
pub mod config;
/// Builders to construct clients and pools from configuration.
pub mod builders;
/// Transport adapters (ZeroMQ, in-memory).
pub mod infra;
/// Shared utilities.
pub mod util;
