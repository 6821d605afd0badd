//! ZeroMQ transport: `REQ` sockets opened from a shared `zmq::Context`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::connector::{Connector, TransportContext, WaitError};
use crate::core::{Client, ClientError, Pool};

/// Client speaking ZeroMQ.
pub type ZmqClient = Client<ZmqContext>;
/// Pool of ZeroMQ clients.
pub type ZmqPool = Pool<ZmqContext>;

/// Shareable handle to a ZeroMQ context.
///
/// `destroy` releases the handle for every clone; the underlying context
/// terminates once the last socket opened from it has been closed.
#[derive(Clone)]
pub struct ZmqContext {
    inner: Arc<Mutex<Option<zmq::Context>>>,
}

impl ZmqContext {
    /// Wrap an existing context, e.g. one also used for broker sockets.
    #[must_use]
    pub fn from_raw(context: zmq::Context) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(context))),
        }
    }

    /// The underlying context, unless destroyed.
    #[must_use]
    pub fn raw(&self) -> Option<zmq::Context> {
        self.inner.lock().clone()
    }
}

impl std::fmt::Debug for ZmqContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmqContext")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl TransportContext for ZmqContext {
    type Connector = ZmqConnector;

    fn open() -> Result<Self, ClientError> {
        Ok(Self::from_raw(zmq::Context::new()))
    }

    fn connect(&self, endpoint: &str) -> Result<ZmqConnector, ClientError> {
        let context = self
            .raw()
            .ok_or_else(|| ClientError::Transport("context terminated".into()))?;
        let socket = context.socket(zmq::REQ).map_err(transport)?;
        socket.set_linger(0).map_err(transport)?;
        socket.connect(endpoint).map_err(transport)?;
        debug!(endpoint, "REQ socket connected");

        Ok(ZmqConnector {
            endpoint: endpoint.to_owned(),
            socket: Some(socket),
        })
    }

    fn destroy(&self) {
        if self.inner.lock().take().is_some() {
            debug!("zmq context released");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport(e: zmq::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// `REQ` socket connector.
pub struct ZmqConnector {
    endpoint: String,
    socket: Option<zmq::Socket>,
}

impl ZmqConnector {
    fn socket(&self) -> Result<&zmq::Socket, ClientError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ClientError::Transport("connector disposed".into()))
    }
}

impl Connector for ZmqConnector {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&mut self, request: &[u8]) -> Result<(), ClientError> {
        self.socket()?.send(request, 0).map_err(transport)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, WaitError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| WaitError::Fatal("connector disposed".into()))?;
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        match socket.poll(zmq::POLLIN, timeout_ms) {
            Ok(ready) => Ok(ready > 0),
            Err(zmq::Error::EINTR) => Err(WaitError::Interrupted),
            Err(e) => Err(WaitError::Fatal(e.to_string())),
        }
    }

    fn recv(&mut self) -> Result<Vec<u8>, ClientError> {
        self.socket()?.recv_bytes(0).map_err(transport)
    }

    fn dispose(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.set_linger(0) {
                warn!(endpoint = %self.endpoint, error = %e, "could not reset linger");
            }
            drop(socket);
        }
    }
}

impl Drop for ZmqConnector {
    fn drop(&mut self) {
        self.dispose();
    }
}
