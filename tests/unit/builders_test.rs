//! Tests for client and pool builders

use dispatch_client::builders::{build_client, build_pool};
use dispatch_client::config::{ClientConfig, PoolConfig};
use dispatch_client::core::TransportContext;
use dispatch_client::infra::memory::MemoryContext;

#[test]
fn test_build_client_with_supplied_context() {
    let ctx = MemoryContext::new();
    let client = build_client(&ClientConfig::new("inproc://a"), Some(ctx.clone())).unwrap();
    assert!(!client.owns_context());
    client.close();
    assert!(!ctx.is_destroyed());
}

#[test]
fn test_build_client_with_own_context() {
    let client = build_client::<MemoryContext>(&ClientConfig::new("inproc://a"), None).unwrap();
    assert!(client.owns_context());
}

#[test]
fn test_build_pool() {
    let ctx = MemoryContext::new();
    let pool = build_pool(
        &PoolConfig::new(3, ClientConfig::new("inproc://a")),
        Some(ctx.clone()),
    )
    .unwrap();
    assert_eq!(pool.size(), 3);
    assert_eq!(ctx.connections_opened(), 3);
    pool.close();
    assert!(ctx.is_destroyed());
}

#[test]
fn test_build_pool_invalid_config() {
    let ctx = MemoryContext::new();
    let result = build_pool(&PoolConfig::new(0, ClientConfig::default()), Some(ctx));
    assert!(result.is_err());
}
