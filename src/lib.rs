//! Sticky-session reverse proxy for socket.io backend pools.
//!
//! New clients are spread at random across connected nodes; the session id
//! the node hands out during the handshake is bound to that node in a shared
//! TTL store, and every later request carrying the id is routed back to it.
//! Node liveness is pushed by a controller over gRPC.

mod gen;

pub mod config;
pub mod error;
pub mod grpc;
pub mod health;
pub mod proxy;
pub mod session;
pub mod store;

// Re-export generated types for convenience
pub use gen::registry::v1 as registry_api;
