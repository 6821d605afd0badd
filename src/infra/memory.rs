//! In-process transport with closure-backed brokers.
//!
//! Each endpoint bound on a [`MemoryContext`] is served by a handler that maps a
//! request to a [`BrokerReply`]: the bytes to answer with and how long the
//! answer takes. Connectors follow request/reply rules: a second `send` while a
//! reply is still outstanding is an error, and a late reply stays queued until
//! it is read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use crate::core::connector::{Connector, TransportContext, WaitError};
use crate::core::ClientError;

/// What a broker handler answers to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerReply {
    /// Time before the reply becomes readable.
    pub delay: Duration,
    /// Reply bytes; `None` means the broker never answers.
    pub body: Option<Vec<u8>>,
}

impl BrokerReply {
    /// Reply immediately.
    pub fn now(body: impl Into<Vec<u8>>) -> Self {
        Self::after(Duration::ZERO, body)
    }

    /// Reply after `delay`.
    pub fn after(delay: Duration, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delay,
            body: Some(body.into()),
        }
    }

    /// Never reply.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            delay: Duration::ZERO,
            body: None,
        }
    }
}

type Handler = dyn Fn(&[u8]) -> BrokerReply + Send + Sync;

#[derive(Default)]
struct ContextInner {
    brokers: RwLock<HashMap<String, Arc<Handler>>>,
    destroyed: AtomicBool,
    opened: AtomicUsize,
    failing_connects: AtomicUsize,
}

/// Shared in-memory transport context.
#[derive(Clone, Default)]
pub struct MemoryContext {
    inner: Arc<ContextInner>,
}

impl MemoryContext {
    /// Create an empty context with no brokers bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `endpoint` with `handler`, replacing any previous handler.
    pub fn bind<F>(&self, endpoint: impl Into<String>, handler: F)
    where
        F: Fn(&[u8]) -> BrokerReply + Send + Sync + 'static,
    {
        self.inner
            .brokers
            .write()
            .insert(endpoint.into(), Arc::new(handler));
    }

    /// Make the next `count` calls to `connect` fail with a transport error.
    pub fn fail_next_connects(&self, count: usize) {
        self.inner.failing_connects.store(count, Ordering::Release);
    }

    /// Number of connectors opened through this context so far.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.inner.opened.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContext")
            .field("endpoints", &self.inner.brokers.read().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl TransportContext for MemoryContext {
    type Connector = MemoryConnector;

    fn open() -> Result<Self, ClientError> {
        Ok(Self::new())
    }

    fn connect(&self, endpoint: &str) -> Result<MemoryConnector, ClientError> {
        if self.is_destroyed() {
            return Err(ClientError::Transport("context terminated".into()));
        }
        let refused = self
            .inner
            .failing_connects
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::Transport(format!("connection to {endpoint} refused")));
        }
        self.inner.opened.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryConnector {
            endpoint: endpoint.to_owned(),
            context: Arc::clone(&self.inner),
            pending: None,
            disposed: false,
        })
    }

    fn destroy(&self) {
        if !self.inner.destroyed.swap(true, Ordering::AcqRel) {
            debug!("memory context destroyed");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }
}

struct Pending {
    ready_at: Instant,
    body: Option<Vec<u8>>,
}

/// Connector produced by [`MemoryContext`].
pub struct MemoryConnector {
    endpoint: String,
    context: Arc<ContextInner>,
    pending: Option<Pending>,
    disposed: bool,
}

impl MemoryConnector {
    fn check_usable(&self) -> Result<(), String> {
        if self.disposed {
            return Err("connector disposed".into());
        }
        if self.context.destroyed.load(Ordering::Acquire) {
            return Err("context terminated".into());
        }
        Ok(())
    }
}

impl Connector for MemoryConnector {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&mut self, request: &[u8]) -> Result<(), ClientError> {
        self.check_usable().map_err(ClientError::Transport)?;
        if self.pending.is_some() {
            return Err(ClientError::Transport(
                "request already outstanding on this connector".into(),
            ));
        }

        let handler = self.context.brokers.read().get(&self.endpoint).cloned();
        let reply = handler.map_or_else(BrokerReply::silent, |handler| handler(request));
        self.pending = Some(Pending {
            ready_at: Instant::now() + reply.delay,
            body: reply.body,
        });
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, WaitError> {
        self.check_usable().map_err(WaitError::Fatal)?;

        let ready_at = match &self.pending {
            Some(Pending {
                ready_at,
                body: Some(_),
            }) => *ready_at,
            _ => {
                thread::sleep(timeout);
                return Ok(false);
            }
        };

        let wait = ready_at.saturating_duration_since(Instant::now());
        if wait <= timeout {
            thread::sleep(wait);
            Ok(true)
        } else {
            thread::sleep(timeout);
            Ok(false)
        }
    }

    fn recv(&mut self) -> Result<Vec<u8>, ClientError> {
        self.check_usable().map_err(ClientError::Transport)?;
        match self.pending.take() {
            Some(Pending {
                ready_at,
                body: Some(body),
            }) if Instant::now() >= ready_at => Ok(body),
            other => {
                self.pending = other;
                Err(ClientError::Transport("no reply ready".into()))
            }
        }
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.pending = None;
    }
}
