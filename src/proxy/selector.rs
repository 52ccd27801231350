//! Backend selection for new and returning sessions.
//!
//! New sessions are spread uniformly at random across connected nodes.
//! Returning sessions are a pure lookup of their binding, which slides the
//! binding's expiry forward.

use rand::seq::SliceRandom;

use super::RoutingCtx;
use crate::error::RoutingError;
use crate::session::SessionId;
use crate::store::{BackendNode, BindingClient};

/// Strategy for choosing one node among the connected ones.
pub trait NodePicker: Send + Sync {
    /// Picks a node, or `None` when `nodes` is empty.
    fn pick_one<'a>(&self, nodes: &[&'a BackendNode]) -> Option<&'a BackendNode>;
}

/// Uniform random pick.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl NodePicker for RandomPicker {
    fn pick_one<'a>(&self, nodes: &[&'a BackendNode]) -> Option<&'a BackendNode> {
        nodes.choose(&mut rand::thread_rng()).copied()
    }
}

/// Decides which backend a request goes to.
pub struct TargetSelector {
    picker: Box<dyn NodePicker>,
    bindings: BindingClient,
}

impl TargetSelector {
    /// Creates a selector with uniform random picking.
    pub fn new(bindings: BindingClient) -> Self {
        Self::with_picker(bindings, Box::new(RandomPicker))
    }

    pub fn with_picker(bindings: BindingClient, picker: Box<dyn NodePicker>) -> Self {
        Self { picker, bindings }
    }

    /// Chooses a connected node for a request without a session id.
    ///
    /// Never touches the binding store; the binding is created later from
    /// the handshake response.
    pub fn select_for_new_session(
        &self,
        nodes: &[BackendNode],
        ctx: &mut RoutingCtx,
    ) -> Result<String, RoutingError> {
        let connected: Vec<&BackendNode> = nodes.iter().filter(|n| n.connected).collect();

        let node = self
            .picker
            .pick_one(&connected)
            .ok_or(RoutingError::NoNodeAvailable)?;

        tracing::debug!(backend = %node.uri, "first request, routing to node");
        ctx.is_new_session = true;
        ctx.chosen_target = Some(node.uri.clone());
        Ok(node.uri.clone())
    }

    /// Resolves the node bound to `sid` and refreshes the binding's TTL.
    ///
    /// The refresh is not awaited; its failure does not undo the decision.
    pub async fn select_for_existing_session(
        &self,
        sid: SessionId,
        ctx: &mut RoutingCtx,
    ) -> Result<String, RoutingError> {
        let target = self.bindings.lookup(&sid).await?;

        tracing::debug!(sid = %sid, backend = %target, "sid is bound");
        self.bindings.refresh(&sid);

        ctx.is_new_session = false;
        ctx.session_id = Some(sid);
        ctx.chosen_target = Some(target.clone());
        Ok(target)
    }
}
