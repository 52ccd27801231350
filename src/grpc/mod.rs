//! gRPC server implementation for node registry updates.
//!
//! Provides the NodeRegistry gRPC server through which the cluster
//! controller reports which socket.io nodes exist and which are connected.

mod registry_service;

pub use registry_service::NodeRegistryService;
