//! Self-healing pool of clients.
//!
//! The pool keeps a fixed arena of client slots. Free slot indices travel
//! through a bounded channel that doubles as a counting gate: a caller blocks
//! on it until a slot is free, uses the client, and hands the index back.
//! A slot whose call failed (or panicked) is closed and reconnected before its
//! index is returned, so a connection that may still receive a stale reply is
//! never handed to the next caller.
//!
//! ```rust,ignore
//! use dispatch_client::config::PoolConfig;
//! use dispatch_client::infra::zmq::ZmqPool;
//!
//! let pool = ZmqPool::new(&PoolConfig::default())?;
//! let result = pool.execute("payload", Some(Duration::from_secs(2)))?;
//! pool.close();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, PoolConfig, TimeoutPolicy};
use crate::core::connector::TransportContext;
use crate::core::envelope::BrokerId;
use crate::core::{Client, ClientError, Job};

/// Default ping timeout for a pool.
pub const DEFAULT_POOL_PING_TIMEOUT: Duration = Duration::from_millis(100);

/// Snapshot of pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of slots.
    pub size: usize,
    /// Slots not currently checked out.
    pub available: usize,
    /// Scoped uses that completed successfully.
    pub executed: u64,
    /// Scoped uses that failed.
    pub failed: u64,
    /// Clients closed and replaced after a failure.
    pub replaced: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    executed: AtomicU64,
    failed: AtomicU64,
    replaced: AtomicU64,
}

/// Fixed-size pool of [`Client`]s sharing one transport context.
pub struct Pool<T: TransportContext> {
    config: ClientConfig,
    policy: TimeoutPolicy,
    context: T,
    slots: Vec<Mutex<Option<Client<T>>>>,
    free_tx: Sender<usize>,
    free_rx: Receiver<usize>,
    counters: PoolCounters,
    closed: AtomicBool,
}

impl<T: TransportContext> Pool<T> {
    /// Build a pool on a fresh transport context.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidConfig` for a bad configuration, or
    /// `ClientError::Transport` when a client cannot connect.
    pub fn new(config: &PoolConfig) -> Result<Self, ClientError> {
        config.validate().map_err(ClientError::InvalidConfig)?;
        Self::with_context(config, T::open()?)
    }

    /// Build a pool on `context`. The pool takes ownership: `close` destroys
    /// the context even though it was supplied by the caller.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidConfig` for a bad configuration, or
    /// `ClientError::Transport` when a client cannot connect.
    pub fn with_context(config: &PoolConfig, context: T) -> Result<Self, ClientError> {
        let policy = match config.validate().and_then(|()| config.client.policy()) {
            Ok(policy) => policy,
            Err(e) => {
                context.destroy();
                return Err(ClientError::InvalidConfig(e));
            }
        };

        let (free_tx, free_rx) = bounded(config.size);
        let mut slots = Vec::with_capacity(config.size);
        for index in 0..config.size {
            match Client::with_context(&config.client, context.clone()) {
                Ok(client) => slots.push(Mutex::new(Some(client))),
                Err(e) => {
                    warn!(endpoint = %config.client.endpoint, error = %e, "pool construction failed");
                    drop(slots);
                    context.destroy();
                    return Err(e);
                }
            }
            // Capacity equals the slot count, so this never blocks.
            let _ = free_tx.send(index);
        }

        info!(
            size = config.size,
            endpoint = %config.client.endpoint,
            "client pool initialized"
        );

        Ok(Self {
            config: config.client.clone(),
            policy,
            context,
            slots,
            free_tx,
            free_rx,
            counters: PoolCounters::default(),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of slots in the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Slots not currently checked out.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current utilization counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size(),
            available: self.available(),
            executed: self.counters.executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            replaced: self.counters.replaced.load(Ordering::Relaxed),
        }
    }

    /// Check a client out for the duration of `scope`.
    ///
    /// Blocks up to `timeout` for a free slot, or indefinitely when `None`.
    /// If `scope` returns an error or panics, the client is closed and replaced
    /// before the slot is released; the error is returned unchanged.
    ///
    /// Must not be called re-entrantly from inside `scope` on a pool of size 1,
    /// nor may `scope` call [`Pool::close`].
    ///
    /// # Errors
    ///
    /// - `ClientError::Timeout` if no slot frees up within `timeout`
    /// - `ClientError::PoolClosed` if the pool is closed
    /// - whatever `scope` returns
    pub fn acquire<R, F>(&self, timeout: Option<Duration>, scope: F) -> Result<R, ClientError>
    where
        F: FnOnce(&Client<T>) -> Result<R, ClientError>,
    {
        if self.is_closed() {
            return Err(ClientError::PoolClosed);
        }

        let index = match timeout {
            Some(after) => self.free_rx.recv_timeout(after).map_err(|e| match e {
                RecvTimeoutError::Timeout => ClientError::Timeout { after },
                RecvTimeoutError::Disconnected => ClientError::PoolClosed,
            })?,
            None => self.free_rx.recv().map_err(|_| ClientError::PoolClosed)?,
        };

        let mut checkout = Checkout {
            pool: self,
            index,
            client: None,
            healthy: false,
        };
        if self.is_closed() {
            return Err(ClientError::PoolClosed);
        }
        checkout.client = Some(self.take_client(index)?);

        let result = checkout.client.as_ref().map_or(Err(ClientError::Closed), scope);
        checkout.healthy = result.is_ok();
        result
    }

    /// Run `job` on a pooled client. `timeout` bounds both the wait for a free
    /// client and the call itself.
    ///
    /// # Errors
    ///
    /// Same as [`Client::execute`], plus the acquisition errors of
    /// [`Pool::acquire`].
    pub fn execute(&self, job: impl Into<Job>, timeout: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let job = job.into();
        self.acquire(timeout, |client| client.execute(job, timeout))
    }

    /// Ask the broker for its identifier through a pooled client.
    ///
    /// Acquisition waits up to the base timeout. Returns `None` when no slot
    /// frees up, or no reply arrives within `timeout`; in the latter case the
    /// client is replaced, since its request is still outstanding.
    pub fn ping(&self, timeout: Duration) -> Option<BrokerId> {
        self.acquire(Some(self.policy.base), |client| {
            client
                .ping(timeout)
                .ok_or(ClientError::Timeout { after: timeout })
        })
        .ok()
    }

    /// Wait for every slot to come back, close all clients, and destroy the
    /// shared transport context. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut drained = Vec::with_capacity(self.slots.len());
        while drained.len() < self.slots.len() {
            match self.free_rx.recv() {
                Ok(index) => drained.push(index),
                Err(_) => break,
            }
        }
        for slot in &self.slots {
            if let Some(client) = slot.lock().take() {
                client.close();
            }
        }
        self.context.destroy();

        // Wake callers still blocked on the gate; they observe the closed flag.
        for index in drained {
            let _ = self.free_tx.send(index);
        }
        info!(size = self.slots.len(), "client pool closed");
    }

    /// Take the client out of slot `index`, reconnecting an empty slot.
    fn take_client(&self, index: usize) -> Result<Client<T>, ClientError> {
        if let Some(client) = self.slots[index].lock().take() {
            return Ok(client);
        }
        debug!(slot = index, "reconnecting empty slot");
        Client::with_context(&self.config, self.context.clone()).inspect_err(|e| {
            warn!(slot = index, error = %e, "slot reconnection failed");
        })
    }

    /// Close `client` and put a fresh one in slot `index`.
    fn replace(&self, index: usize, client: Client<T>) {
        let old_id = client.id();
        client.close();
        self.counters.replaced.fetch_add(1, Ordering::Relaxed);

        let replacement = match Client::with_context(&self.config, self.context.clone()) {
            Ok(fresh) => {
                warn!(slot = index, old_client = %old_id, new_client = %fresh.id(), "client replaced after failure");
                Some(fresh)
            }
            Err(e) => {
                warn!(
                    slot = index,
                    old_client = %old_id,
                    error = %e,
                    "replacement failed; slot will reconnect on next use"
                );
                None
            }
        };
        *self.slots[index].lock() = replacement;
    }
}

impl<T: TransportContext> Drop for Pool<T> {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!("pool dropped without explicit close");
            self.close();
        }
    }
}

impl<T: TransportContext> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("endpoint", &self.config.endpoint)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// A checked-out slot. Dropping it returns the slot index to the gate,
/// replacing the client first unless the scope completed successfully.
struct Checkout<'a, T: TransportContext> {
    pool: &'a Pool<T>,
    index: usize,
    client: Option<Client<T>>,
    healthy: bool,
}

impl<T: TransportContext> Drop for Checkout<'_, T> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if self.pool.is_closed() {
                client.close();
            } else if self.healthy {
                self.pool.counters.executed.fetch_add(1, Ordering::Relaxed);
                *self.pool.slots[self.index].lock() = Some(client);
            } else {
                self.pool.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.pool.replace(self.index, client);
            }
        }
        let _ = self.pool.free_tx.send(self.index);
    }
}
