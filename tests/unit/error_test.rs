//! Tests for error types

use std::time::Duration;

use dispatch_client::core::ClientError;

#[test]
fn test_timeout_error() {
    let err = ClientError::Timeout {
        after: Duration::from_secs(5),
    };
    assert_eq!(format!("{}", err), "timed out after 5s");
}

#[test]
fn test_no_worker_error() {
    assert_eq!(format!("{}", ClientError::NoWorker), "no worker available");
}

#[test]
fn test_execution_error() {
    let err = ClientError::Execution("division by zero".to_string());
    assert_eq!(format!("{}", err), "execution failed: division by zero");
}

#[test]
fn test_transport_error() {
    let err = ClientError::Transport("connection refused".to_string());
    assert_eq!(format!("{}", err), "transport error: connection refused");
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(format!("{}", ClientError::Closed), "client is closed");
    assert_eq!(format!("{}", ClientError::PoolClosed), "pool is closed");
}
