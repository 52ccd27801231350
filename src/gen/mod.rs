//! Code generated from `proto/` by tonic-build.

pub mod registry {
    pub mod v1 {
        tonic::include_proto!("registry.v1");
    }
}
