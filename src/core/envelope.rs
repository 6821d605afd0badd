//! Wire envelopes exchanged with the broker.

use std::fmt;

use crate::core::ClientError;

/// Request body used for liveness probes.
pub const PING: &[u8] = b"PING";

/// Failure payload the broker uses when it has no worker to hand the job to.
pub const NO_WORKER: &str = "No worker";

const STATUS_OK: &str = "OK";
const STATUS_KO: &str = "KO";

/// Identifier of the worker that serviced a request (its process id).
pub type WorkerId = u64;

/// Decoded reply to a job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    /// Worker that produced the reply.
    pub worker_id: WorkerId,
    /// Whether the worker reported success.
    pub success: bool,
    /// Result on success, error description on failure.
    pub payload: Vec<u8>,
}

impl ReplyEnvelope {
    /// Successful reply.
    pub fn ok(worker_id: WorkerId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            worker_id,
            success: true,
            payload: payload.into(),
        }
    }

    /// Failed reply.
    pub fn failure(worker_id: WorkerId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            worker_id,
            success: false,
            payload: payload.into(),
        }
    }

    /// Decode `<worker_id>:<OK|KO>:<payload>`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Protocol` when the reply does not have three fields,
    /// the worker id is not an unsigned integer, or the status is unknown.
    pub fn decode(raw: &[u8]) -> Result<Self, ClientError> {
        let mut fields = raw.splitn(3, |b| *b == b':');
        let (Some(worker), Some(status), Some(payload)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ClientError::Protocol(format!(
                "expected 3 fields in reply, got `{}`",
                String::from_utf8_lossy(raw)
            )));
        };

        let worker_id = std::str::from_utf8(worker)
            .ok()
            .and_then(|s| s.trim().parse::<WorkerId>().ok())
            .ok_or_else(|| {
                ClientError::Protocol(format!(
                    "invalid worker id `{}`",
                    String::from_utf8_lossy(worker)
                ))
            })?;

        let success = match status {
            b"OK" => true,
            b"KO" => false,
            other => {
                return Err(ClientError::Protocol(format!(
                    "unknown reply status `{}`",
                    String::from_utf8_lossy(other)
                )))
            }
        };

        Ok(Self {
            worker_id,
            success,
            payload: payload.to_vec(),
        })
    }

    /// Encode into the wire form accepted by [`ReplyEnvelope::decode`].
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let status = if self.success { STATUS_OK } else { STATUS_KO };
        let mut out = format!("{}:{status}:", self.worker_id).into_bytes();
        out.extend_from_slice(&self.payload);
        out
    }

    /// Whether this is the broker's "no worker" sentinel.
    #[must_use]
    pub fn is_no_worker(&self) -> bool {
        !self.success && self.payload == NO_WORKER.as_bytes()
    }

    /// Turn the reply into the value or error `execute` hands back.
    ///
    /// # Errors
    ///
    /// `ClientError::NoWorker` for the sentinel, `ClientError::Execution` for
    /// any other failure.
    pub fn into_result(self) -> Result<Vec<u8>, ClientError> {
        if self.success {
            Ok(self.payload)
        } else if self.is_no_worker() {
            Err(ClientError::NoWorker)
        } else {
            Err(ClientError::Execution(
                String::from_utf8_lossy(&self.payload).into_owned(),
            ))
        }
    }

    /// Classify the reply into a call outcome.
    #[must_use]
    pub fn into_outcome(self) -> CallOutcome {
        if self.success {
            CallOutcome::Ok(self.payload)
        } else if self.is_no_worker() {
            CallOutcome::NoWorker
        } else {
            CallOutcome::WorkerFailure(String::from_utf8_lossy(&self.payload).into_owned())
        }
    }
}

/// Tagged result of a single job call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The worker returned a result.
    Ok(Vec<u8>),
    /// The worker ran the job and reported a failure.
    WorkerFailure(String),
    /// The broker had no worker available.
    NoWorker,
    /// No acceptable reply before the deadline.
    Timeout,
}

impl CallOutcome {
    /// Convert a call result into its tagged outcome.
    ///
    /// Errors that are not one of the four outcomes are handed back unchanged.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and lifecycle errors as-is.
    pub fn from_result(result: Result<Vec<u8>, ClientError>) -> Result<Self, ClientError> {
        match result {
            Ok(payload) => Ok(Self::Ok(payload)),
            Err(ClientError::Execution(payload)) => Ok(Self::WorkerFailure(payload)),
            Err(ClientError::NoWorker) => Ok(Self::NoWorker),
            Err(ClientError::Timeout { .. }) => Ok(Self::Timeout),
            Err(other) => Err(other),
        }
    }
}

/// Identifier returned by the broker in answer to a ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerId {
    /// Numeric identifier, usually the broker process id.
    Pid(i64),
    /// Anything that did not parse as an integer, passed through as received.
    Raw(Vec<u8>),
}

impl BrokerId {
    /// Parse a ping reply, preferring an integer interpretation.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map_or_else(|| Self::Raw(raw.to_vec()), Self::Pid)
    }

    /// Numeric value, if the broker sent one.
    #[must_use]
    pub const fn as_pid(&self) -> Option<i64> {
        match self {
            Self::Pid(pid) => Some(*pid),
            Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pid(pid) => write!(f, "{pid}"),
            Self::Raw(raw) => write!(f, "{}", String::from_utf8_lossy(raw)),
        }
    }
}
