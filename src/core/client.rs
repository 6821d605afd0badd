//! Single-connection client with a timeout-overflow tolerance policy.
//!
//! A [`Client`] owns exactly one [`Connector`] and allows one call in flight at
//! a time. Each call is timed; a worker that answers after the base timeout but
//! before the max-overflow timeout is tolerated a limited number of times in a
//! row, after which its late replies are turned into timeouts.
//!
//! ```rust,ignore
//! use dispatch_client::config::ClientConfig;
//! use dispatch_client::infra::zmq::ZmqClient;
//!
//! let client = ZmqClient::connect(&ClientConfig::new("tcp://127.0.0.1:5555"))?;
//! let result = client.execute("payload", None)?;
//! client.close();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{ClientConfig, TimeoutPolicy};
use crate::core::connector::{Connector, TransportContext};
use crate::core::envelope::{BrokerId, CallOutcome, ReplyEnvelope, WorkerId};
use crate::core::{ClientError, Job};
use crate::util::clock::Deadline;

/// Default ping timeout for a bare client.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Request/reply client bound to one broker endpoint.
pub struct Client<T: TransportContext> {
    id: Uuid,
    endpoint: String,
    policy: TimeoutPolicy,
    debug: bool,
    context: T,
    /// Whether this client created `context` and must destroy it on close.
    owns_context: bool,
    connector: Mutex<Option<T::Connector>>,
    overflows: Mutex<HashMap<WorkerId, u32>>,
    closed: AtomicBool,
}

impl<T: TransportContext> Client<T> {
    /// Connect using a transport context created for, and owned by, this client.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidConfig` for a bad configuration, or
    /// `ClientError::Transport` when the context or connector cannot be opened.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let policy = config.policy().map_err(ClientError::InvalidConfig)?;
        let context = T::open()?;
        Self::from_parts(config, policy, context, true)
    }

    /// Connect using an externally supplied context. The context outlives the
    /// client: `close` leaves it running.
    ///
    /// # Errors
    ///
    /// `ClientError::InvalidConfig` for a bad configuration, or
    /// `ClientError::Transport` when the connector cannot be opened.
    pub fn with_context(config: &ClientConfig, context: T) -> Result<Self, ClientError> {
        let policy = config.policy().map_err(ClientError::InvalidConfig)?;
        Self::from_parts(config, policy, context, false)
    }

    fn from_parts(
        config: &ClientConfig,
        policy: TimeoutPolicy,
        context: T,
        owns_context: bool,
    ) -> Result<Self, ClientError> {
        let connector = match context.connect(&config.endpoint) {
            Ok(connector) => connector,
            Err(e) => {
                if owns_context {
                    context.destroy();
                }
                return Err(e);
            }
        };
        let id = Uuid::new_v4();
        debug!(client_id = %id, endpoint = %config.endpoint, owns_context, "client connected");

        Ok(Self {
            id,
            endpoint: config.endpoint.clone(),
            policy,
            debug: config.debug,
            context,
            owns_context,
            connector: Mutex::new(Some(connector)),
            overflows: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Unique identifier of this client, attached to its log records.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Broker endpoint this client is connected to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Timeout policy applied to every call.
    #[must_use]
    pub const fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Whether this client will destroy its transport context on close.
    #[must_use]
    pub const fn owns_context(&self) -> bool {
        self.owns_context
    }

    /// Consecutive overflows currently recorded for `worker_id`.
    #[must_use]
    pub fn overflow_count(&self, worker_id: WorkerId) -> u32 {
        self.overflows.lock().get(&worker_id).copied().unwrap_or(0)
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run `job` and return the worker's result.
    ///
    /// Waits at most `timeout`, or the policy's max-overflow timeout when `None`.
    /// Calls are serialized: concurrent callers queue on the client's lock.
    ///
    /// # Errors
    ///
    /// - `ClientError::Timeout` when no reply arrives in time, or the worker ran
    ///   past the base timeout more often in a row than the policy tolerates
    /// - `ClientError::NoWorker` when the broker had no worker available
    /// - `ClientError::Execution` when the worker reported a failure
    /// - `ClientError::Transport`, `Protocol` or `Closed` for channel problems
    pub fn execute(&self, job: impl Into<Job>, timeout: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let job = job.into();
        let result = self.execute_job(&job, timeout);
        if let Err(e) = &result {
            error!(
                client_id = %self.id,
                endpoint = %self.endpoint,
                error = %e,
                "failed to execute the job"
            );
        }
        result
    }

    /// Like [`Client::execute`], but folds the four call outcomes into a
    /// [`CallOutcome`].
    ///
    /// # Errors
    ///
    /// Only transport, protocol and lifecycle errors.
    pub fn execute_outcome(
        &self,
        job: impl Into<Job>,
        timeout: Option<Duration>,
    ) -> Result<CallOutcome, ClientError> {
        CallOutcome::from_result(self.execute(job, timeout))
    }

    fn execute_job(&self, job: &Job, timeout: Option<Duration>) -> Result<Vec<u8>, ClientError> {
        let budget = timeout.unwrap_or(self.policy.max_overflow);
        let (elapsed, raw) = self.round_trip(&job.serialize(), budget)?;
        let reply = ReplyEnvelope::decode(&raw)?;

        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if self.debug {
            info!(client_id = %self.id, worker_id = reply.worker_id, elapsed_ms, "job round trip");
        } else {
            debug!(client_id = %self.id, worker_id = reply.worker_id, elapsed_ms, "job round trip");
        }

        self.record_duration(reply.worker_id, elapsed, budget)?;
        reply.into_result()
    }

    /// Send one request and wait for its reply, holding the connector lock
    /// for the whole exchange.
    fn round_trip(&self, request: &[u8], budget: Duration) -> Result<(Duration, Vec<u8>), ClientError> {
        let mut guard = self.connector.lock();
        let connector = guard.as_mut().ok_or(ClientError::Closed)?;

        connector.send(request)?;
        let deadline = Deadline::after(budget);
        if !connector.poll(&deadline)? {
            return Err(ClientError::Timeout { after: budget });
        }
        let raw = connector.recv()?;
        Ok((deadline.elapsed(), raw))
    }

    /// Update the worker's overflow counter for a call that took `elapsed`.
    fn record_duration(
        &self,
        worker_id: WorkerId,
        elapsed: Duration,
        budget: Duration,
    ) -> Result<(), ClientError> {
        let mut overflows = self.overflows.lock();
        if !self.policy.overflowed(elapsed) {
            overflows.insert(worker_id, 0);
            return Ok(());
        }

        let count = overflows.entry(worker_id).or_insert(0);
        *count += 1;
        debug!(
            client_id = %self.id,
            worker_id,
            overflows = *count,
            tolerance = self.policy.tolerance,
            "worker overflowed the base timeout"
        );
        if self.policy.exhausted(*count) {
            return Err(ClientError::Timeout { after: budget });
        }
        Ok(())
    }

    /// Ask the broker for its identifier.
    ///
    /// Returns `None` if no reply arrives within `timeout`, the wait fails, or
    /// the client is closed.
    pub fn ping(&self, timeout: Duration) -> Option<BrokerId> {
        let mut guard = self.connector.lock();
        let connector = guard.as_mut()?;
        connector.probe(timeout)
    }

    /// Dispose the connector, and the transport context if this client
    /// created it. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut connector) = self.connector.lock().take() {
            connector.dispose();
        }
        if self.owns_context {
            self.context.destroy();
        }
        debug!(client_id = %self.id, endpoint = %self.endpoint, "client closed");
    }
}

impl<T: TransportContext> Drop for Client<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: TransportContext> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("owns_context", &self.owns_context)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
