//! gRPC NodeRegistry implementation.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::config::validate_node_uri;
use crate::registry_api::node_registry_server::NodeRegistry;
use crate::registry_api::{
    GetNodesRequest, GetNodesResponse, HealthRequest, HealthResponse, Node, SetNodeStatusRequest,
    SetNodeStatusResponse, UpdateNodesRequest, UpdateNodesResponse,
};
use crate::store::{BackendNode, NodeStore};

/// gRPC service implementation for node registry updates.
pub struct NodeRegistryService {
    store: Arc<NodeStore>,
}

impl NodeRegistryService {
    /// Creates a new NodeRegistryService with the given node store.
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self { store }
    }
}

impl From<Node> for BackendNode {
    fn from(node: Node) -> Self {
        BackendNode::new(node.uri, node.connected)
    }
}

impl From<BackendNode> for Node {
    fn from(node: BackendNode) -> Self {
        Node {
            uri: node.uri,
            connected: node.connected,
        }
    }
}

#[tonic::async_trait]
impl NodeRegistry for NodeRegistryService {
    /// Replaces all nodes with a full sync.
    ///
    /// A request with any malformed URI is rejected as a whole.
    async fn update_nodes(
        &self,
        request: Request<UpdateNodesRequest>,
    ) -> Result<Response<UpdateNodesResponse>, Status> {
        let req = request.into_inner();

        if let Some(err) = req
            .nodes
            .iter()
            .find_map(|node| validate_node_uri(&node.uri).err())
        {
            tracing::warn!(version = req.version, error = %err, "Node update rejected");
            return Ok(Response::new(UpdateNodesResponse {
                success: false,
                error: err.to_string(),
                applied_version: self.store.version(),
                node_count: self.store.node_count(),
            }));
        }

        let nodes: Vec<BackendNode> = req.nodes.into_iter().map(BackendNode::from).collect();
        let applied_version = self.store.update_nodes(nodes, req.version);
        let node_count = self.store.node_count();

        tracing::info!(
            version = applied_version,
            nodes = node_count,
            connected = self.store.connected_count(),
            "Nodes updated"
        );

        Ok(Response::new(UpdateNodesResponse {
            success: true,
            error: String::new(),
            applied_version,
            node_count,
        }))
    }

    /// Flips the connected flag of one node.
    async fn set_node_status(
        &self,
        request: Request<SetNodeStatusRequest>,
    ) -> Result<Response<SetNodeStatusResponse>, Status> {
        let req = request.into_inner();

        if !self.store.set_connected(&req.uri, req.connected) {
            return Err(Status::not_found(format!("unknown node {}", req.uri)));
        }

        tracing::info!(node = %req.uri, connected = req.connected, "Node status changed");

        Ok(Response::new(SetNodeStatusResponse {
            updated: true,
            connected_count: self.store.connected_count(),
        }))
    }

    /// Returns all currently known nodes.
    async fn get_nodes(
        &self,
        _request: Request<GetNodesRequest>,
    ) -> Result<Response<GetNodesResponse>, Status> {
        let nodes = self.store.nodes().into_iter().map(Node::from).collect();
        let version = self.store.version();

        Ok(Response::new(GetNodesResponse { nodes, version }))
    }

    /// Returns the health status of the proxy.
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let connected_nodes = self.store.connected_count();
        let (healthy, status) = if connected_nodes > 0 {
            (true, "ready")
        } else {
            (false, "no connected nodes")
        };

        Ok(Response::new(HealthResponse {
            healthy,
            status: status.to_string(),
            connected_nodes,
            config_version: self.store.version(),
        }))
    }
}
