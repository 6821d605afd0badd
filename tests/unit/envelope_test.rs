//! Tests for the wire envelopes

use dispatch_client::core::{BrokerId, ClientError, Job, ReplyEnvelope, NO_WORKER};

#[test]
fn test_no_worker_sentinel_needs_failure_status() {
    assert!(ReplyEnvelope::failure(0, NO_WORKER).is_no_worker());
    assert!(!ReplyEnvelope::ok(0, NO_WORKER).is_no_worker());
    assert_eq!(ReplyEnvelope::ok(0, NO_WORKER).into_result(), Ok(b"No worker".to_vec()));
}

#[test]
fn test_into_result() {
    assert_eq!(
        ReplyEnvelope::failure(0, NO_WORKER).into_result(),
        Err(ClientError::NoWorker)
    );
    assert_eq!(
        ReplyEnvelope::failure(3, "no worker").into_result(),
        Err(ClientError::Execution("no worker".into()))
    );
}

#[test]
fn test_decode_wire_reply() {
    let reply = ReplyEnvelope::decode(b"321:KO:No worker").unwrap();
    assert_eq!(reply.worker_id, 321);
    assert!(reply.is_no_worker());
}

#[test]
fn test_broker_id_passthrough() {
    let id = BrokerId::parse(b"not-a-number");
    assert_eq!(id.as_pid(), None);
    assert_eq!(id.to_string(), "not-a-number");
}

#[test]
fn test_job_headers_survive_parse() {
    let job = Job::new("data").with_header("priority", "high").unwrap();
    let parsed = Job::parse(&job.serialize()).unwrap();
    assert_eq!(parsed, job);
}
