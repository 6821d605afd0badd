//! Tests for configuration validation

use std::time::Duration;

use dispatch_client::config::{ClientConfig, PoolConfig, TimeoutPolicy, DEFAULT_ENDPOINT};
use dispatch_client::core::{Client, ClientError, Pool};
use dispatch_client::infra::memory::MemoryContext;

#[test]
fn test_client_config_defaults() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.policy().unwrap(), TimeoutPolicy::default());
    assert!(!cfg.debug);
}

#[test]
fn test_client_config_invalid_endpoint() {
    let cfg = ClientConfig::new("  ");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_client_config_invalid_timeouts() {
    assert!(ClientConfig::default().with_timeouts(0.0, 1.0).validate().is_err());
    assert!(ClientConfig::default().with_timeouts(5.0, 4.9).validate().is_err());
    assert!(ClientConfig::default().with_timeouts(5.0, 5.0).validate().is_ok());
}

#[test]
fn test_client_config_policy() {
    let policy = ClientConfig::default()
        .with_timeouts(0.25, 0.5)
        .with_timeout_overflows(3)
        .policy()
        .unwrap();
    assert_eq!(policy.base, Duration::from_millis(250));
    assert_eq!(policy.max_overflow, Duration::from_millis(500));
    assert_eq!(policy.tolerance, 3);
}

#[test]
fn test_pool_config_invalid_size() {
    let cfg = PoolConfig::new(0, ClientConfig::default());
    assert!(cfg.validate().is_err());
}

#[test]
fn test_pool_config_from_json() {
    let json = r#"{
        "size": 4,
        "endpoint": "tcp://127.0.0.1:5555",
        "timeout_secs": 2.0,
        "timeout_max_overflow_secs": 3.0,
        "timeout_overflows": 2,
        "debug": true
    }"#;

    let cfg = PoolConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.size, 4);
    assert_eq!(cfg.client.endpoint, "tcp://127.0.0.1:5555");
    assert_eq!(cfg.client.timeout_overflows, 2);
    assert!(cfg.client.debug);
}

#[test]
fn test_pool_config_from_json_defaults() {
    let cfg = PoolConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, PoolConfig::default());
}

#[test]
fn test_client_config_from_json_rejects_inverted_timeouts() {
    let json = r#"{ "timeout_secs": 5.0, "timeout_max_overflow_secs": 1.0 }"#;
    assert!(ClientConfig::from_json_str(json).is_err());
}

#[test]
fn test_unrepresentable_timeout_rejected() {
    let json = r#"{ "timeout_secs": 1e20, "timeout_max_overflow_secs": 1e20 }"#;
    assert!(ClientConfig::from_json_str(json).is_err());

    let cfg = ClientConfig::default().with_timeouts(1e20, 1e20);
    assert!(cfg.validate().is_err());
    assert!(cfg.policy().is_err());
    assert!(ClientConfig::default().with_timeouts(1.0, 1e20).validate().is_err());
}

#[test]
fn test_unrepresentable_timeout_fails_construction() {
    let cfg = ClientConfig::default().with_timeouts(1e20, 1e20);
    assert!(matches!(
        Client::<MemoryContext>::connect(&cfg),
        Err(ClientError::InvalidConfig(_))
    ));
    assert!(matches!(
        Pool::<MemoryContext>::new(&PoolConfig::new(2, cfg)),
        Err(ClientError::InvalidConfig(_))
    ));
}
