//! Transport seams: request/reply connectors and the contexts that open them.
//!
//! A [`Connector`] is one logical request/reply channel with at most one
//! outstanding request. A [`TransportContext`] opens connectors and can be torn
//! down; several clients may share one context, but exactly one owner destroys it.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::core::envelope::{BrokerId, PING};
use crate::core::ClientError;
use crate::util::clock::Deadline;

/// Failure of a single readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The wait was interrupted by a signal and may be retried.
    Interrupted,
    /// The wait failed for good.
    Fatal(String),
}

/// One request/reply channel to a broker endpoint.
///
/// Implementations are not required to tolerate a second `send` before the
/// previous reply has been received; callers serialize access.
pub trait Connector: Send + 'static {
    /// Endpoint this connector talks to.
    fn endpoint(&self) -> &str;

    /// Transmit a single request.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the request cannot be queued.
    fn send(&mut self, request: &[u8]) -> Result<(), ClientError>;

    /// Block until a reply is readable or `timeout` elapses, once.
    ///
    /// Returns `Ok(true)` when a reply is ready and `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// `WaitError::Interrupted` when a signal cut the wait short.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, WaitError>;

    /// Read the reply made ready by a successful wait.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if no reply can be read.
    fn recv(&mut self) -> Result<Vec<u8>, ClientError>;

    /// Release the channel without waiting for queued data.
    fn dispose(&mut self);

    /// Wait for a reply until `deadline`, retrying interrupted waits with the
    /// time that is left.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` on a non-interrupt wait failure.
    fn poll(&mut self, deadline: &Deadline) -> Result<bool, ClientError> {
        loop {
            match self.wait_readable(deadline.remaining()) {
                Ok(ready) => return Ok(ready),
                Err(WaitError::Interrupted) => {
                    trace!(endpoint = self.endpoint(), "wait interrupted, retrying");
                    if deadline.expired() {
                        return Ok(false);
                    }
                }
                Err(WaitError::Fatal(msg)) => return Err(ClientError::Transport(msg)),
            }
        }
    }

    /// Send the liveness token and return the broker's identifier.
    ///
    /// Returns `None` when no reply arrives in time or any step fails.
    fn probe(&mut self, timeout: Duration) -> Option<BrokerId> {
        if let Err(e) = self.send(PING) {
            warn!(endpoint = self.endpoint(), error = %e, "ping could not be sent");
            return None;
        }
        match self.poll(&Deadline::after(timeout)) {
            Ok(true) => match self.recv() {
                Ok(raw) => Some(BrokerId::parse(&raw)),
                Err(e) => {
                    warn!(endpoint = self.endpoint(), error = %e, "ping reply unreadable");
                    None
                }
            },
            Ok(false) => {
                debug!(endpoint = self.endpoint(), ?timeout, "ping timed out");
                None
            }
            Err(e) => {
                warn!(endpoint = self.endpoint(), error = %e, "ping wait failed");
                None
            }
        }
    }
}

/// Shared factory for connectors.
///
/// Clones refer to the same underlying context; `destroy` on any clone tears
/// the shared context down.
pub trait TransportContext: Clone + Send + Sync + 'static {
    /// Connector type opened by this context.
    type Connector: Connector;

    /// Create a fresh context owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the context cannot be created.
    fn open() -> Result<Self, ClientError>;

    /// Open a connector to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the context was destroyed or the
    /// endpoint cannot be reached.
    fn connect(&self, endpoint: &str) -> Result<Self::Connector, ClientError>;

    /// Tear the context down. Idempotent.
    ///
    /// After `destroy`, `connect` fails on every clone. What happens to
    /// connectors that are already open depends on the transport: the
    /// in-memory context fails them with a fatal error on their next use,
    /// while the ZeroMQ context only releases its shared handle, so sockets
    /// opened earlier keep working until they are disposed and libzmq
    /// terminates the context after the last one closes.
    fn destroy(&self);

    /// Whether `destroy` has been called on this context.
    fn is_destroyed(&self) -> bool;
}
