//! Error types shared across the routing engine.

use thiserror::Error;

/// Reasons a request cannot be routed to a backend.
///
/// Every variant is terminal for the request and surfaces to the client
/// as `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("unknown path: {path}")]
    PathRejected { path: String },

    #[error("no node available")]
    NoNodeAvailable,

    #[error("unknown binding for sid {sid}")]
    UnknownBinding { sid: String },
}

/// Failures reported by a binding store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Invalid startup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("base path must start with '/': {0}")]
    InvalidPath(String),

    #[error("key expiry must be at least one second")]
    ZeroExpiry,

    #[error("invalid node uri '{uri}': {reason}")]
    InvalidNodeUri { uri: String, reason: String },
}
