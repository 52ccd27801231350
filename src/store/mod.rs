//! State the router reads and writes.
//!
//! `NodeStore` holds the backend node list pushed by the controller via gRPC.
//! Session bindings live behind the `BindingStore` trait, backed by Redis in
//! production or by an in-process map for single-instance setups.

mod bindings;
mod memory_store;
mod node_store;
mod redis_store;
#[cfg(test)]
pub(crate) mod testing;

pub use bindings::{BindingClient, BindingStore};
pub use memory_store::MemoryBindingStore;
pub use node_store::{BackendNode, NodeStore};
pub use redis_store::RedisBindingStore;
