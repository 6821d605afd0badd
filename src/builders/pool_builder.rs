//! Builders to construct clients and pools from configuration.

use tracing::debug;

use crate::config::{ClientConfig, PoolConfig};
use crate::core::{AppResult, Client, ClientError, Pool, TransportContext};

/// Build a client. Context ownership follows from presence: a supplied
/// `context` is left running when the client closes, a created one is not.
///
/// # Errors
///
/// Propagates configuration and connection errors.
pub fn build_client<T: TransportContext>(
    cfg: &ClientConfig,
    context: Option<T>,
) -> Result<Client<T>, ClientError> {
    match context {
        Some(context) => Client::with_context(cfg, context),
        None => Client::connect(cfg),
    }
}

/// Build a pool. The pool destroys its context on close whether or not it
/// was supplied.
///
/// # Errors
///
/// Propagates configuration and connection errors.
pub fn build_pool<T: TransportContext>(
    cfg: &PoolConfig,
    context: Option<T>,
) -> Result<Pool<T>, ClientError> {
    debug!(size = cfg.size, endpoint = %cfg.client.endpoint, "building pool");
    match context {
        Some(context) => Pool::with_context(cfg, context),
        None => Pool::new(cfg),
    }
}

/// Build a pool from `DISPATCH_*` environment variables.
///
/// # Errors
///
/// Fails on unparsable variables, invalid configuration, or connection errors.
pub fn build_pool_from_env<T: TransportContext>() -> AppResult<Pool<T>> {
    let cfg = PoolConfig::from_env()?;
    Ok(build_pool(&cfg, None)?)
}
