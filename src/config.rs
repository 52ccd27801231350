//! Command line and environment configuration.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use hyper::Uri;

use crate::error::ConfigError;
use crate::store::BackendNode;

/// Binding store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Shared Redis instance; required when running more than one proxy.
    Redis,
    /// In-process map, for a single proxy instance.
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Sticky-session reverse proxy for socket.io backend pools.
#[derive(Parser, Debug, Clone)]
#[command(name = "sticky-proxy")]
pub struct Args {
    /// Address the proxy listens on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Address of the gRPC node registry API
    #[arg(long, env = "GRPC_LISTEN", default_value = "0.0.0.0:50051")]
    pub grpc_listen: SocketAddr,

    /// Address of the health probe server
    #[arg(long, env = "HEALTH_LISTEN", default_value = "0.0.0.0:8081")]
    pub health_listen: SocketAddr,

    /// Where session bindings are kept
    #[arg(long, env = "BINDING_STORE", value_enum, default_value = "redis")]
    pub binding_store: StoreKind,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Base path of proxied requests; anything else is rejected
    #[arg(long, env = "ROUTER_PATH", default_value = "/socket.io/")]
    pub path: String,

    /// Namespace of binding keys in the store
    #[arg(long, env = "KEY_PREFIX", default_value = "socket.io#")]
    pub key_prefix: String,

    /// Binding expiry in seconds, extended on every routed request
    #[arg(long, env = "KEY_EXPIRY", default_value = "60")]
    pub key_expiry: u64,

    /// Backend node URI, seeded as connected (repeatable)
    #[arg(long = "node", env = "NODES", value_delimiter = ',')]
    pub nodes: Vec<String>,

    /// Largest handshake body searched for a session id
    #[arg(long, env = "MAX_HANDSHAKE_BYTES", default_value = "65536")]
    pub max_handshake_bytes: usize,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    /// Routing options derived from the arguments.
    pub fn router_options(&self) -> Result<RouterOptions, ConfigError> {
        let options = RouterOptions {
            path: self.path.clone(),
            key_prefix: self.key_prefix.clone(),
            key_expiry: self.key_expiry,
            max_handshake_bytes: self.max_handshake_bytes,
        };
        options.validate()?;
        Ok(options)
    }

    /// Initial node list, all marked connected.
    pub fn seed_nodes(&self) -> Result<Vec<BackendNode>, ConfigError> {
        self.nodes
            .iter()
            .map(|uri| {
                validate_node_uri(uri)?;
                Ok(BackendNode::new(uri.clone(), true))
            })
            .collect()
    }
}

/// Options of the routing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    pub path: String,
    pub key_prefix: String,
    pub key_expiry: u64,
    pub max_handshake_bytes: usize,
}

impl RouterOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }
        if self.key_expiry == 0 {
            return Err(ConfigError::ZeroExpiry);
        }
        Ok(())
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            path: "/socket.io/".to_string(),
            key_prefix: "socket.io#".to_string(),
            key_expiry: 60,
            max_handshake_bytes: 64 * 1024,
        }
    }
}

/// Checks that a node URI is absolute with a supported scheme.
pub fn validate_node_uri(uri: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidNodeUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    let parsed: Uri = uri.parse().map_err(|_| invalid("not a URI"))?;
    match parsed.scheme_str() {
        Some("http" | "https" | "ws" | "wss") => {}
        Some(_) => return Err(invalid("unsupported scheme")),
        None => return Err(invalid("missing scheme")),
    }
    if parsed.host().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(())
}
