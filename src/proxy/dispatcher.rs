//! Per-request routing decisions.
//!
//! Every inbound request goes through the same forward-only sequence:
//! path check, target selection, forwarding (done by the proxy engine),
//! handshake observation for new sessions, and binding removal when the
//! engine fails to reach a bound backend.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::handshake::{HandshakeInterceptor, HandshakeParser, SidFieldParser};
use super::selector::{NodePicker, TargetSelector};
use super::RoutingCtx;
use crate::config::RouterOptions;
use crate::error::RoutingError;
use crate::session::SessionId;
use crate::store::{BindingClient, BindingStore, NodeStore};

/// Query parameter carrying the session id of returning clients.
pub const SID_PARAM: &str = "sid";

/// Routes requests to backends and maintains session bindings.
///
/// Collaborators are injected; the dispatcher keeps no per-request state
/// of its own, so one instance serves all connections.
pub struct Dispatcher {
    options: RouterOptions,
    nodes: Arc<NodeStore>,
    bindings: BindingClient,
    selector: TargetSelector,
    interceptor: HandshakeInterceptor,
}

impl Dispatcher {
    /// Creates a dispatcher with random node picking and `"sid"` field parsing.
    pub fn new(
        options: RouterOptions,
        nodes: Arc<NodeStore>,
        store: Arc<dyn BindingStore>,
    ) -> Self {
        let bindings = BindingClient::new(store, &options.key_prefix, options.key_expiry);
        let selector = TargetSelector::new(bindings.clone());
        let interceptor = HandshakeInterceptor::new(
            Arc::new(SidFieldParser),
            bindings.clone(),
            options.max_handshake_bytes,
        );

        Self {
            options,
            nodes,
            bindings,
            selector,
            interceptor,
        }
    }

    /// Replaces the node picking strategy.
    pub fn with_picker(mut self, picker: Box<dyn NodePicker>) -> Self {
        self.selector = TargetSelector::with_picker(self.bindings.clone(), picker);
        self
    }

    /// Replaces the handshake parser.
    pub fn with_parser(mut self, parser: Arc<dyn HandshakeParser>) -> Self {
        self.interceptor = HandshakeInterceptor::new(
            parser,
            self.bindings.clone(),
            self.options.max_handshake_bytes,
        );
        self
    }

    /// Rejects paths outside the configured base path.
    pub fn check_path(&self, path: &str) -> Result<(), RoutingError> {
        if path.starts_with(&self.options.path) {
            Ok(())
        } else {
            Err(RoutingError::PathRejected {
                path: path.to_string(),
            })
        }
    }

    /// Decides the backend for a request.
    ///
    /// Requests without a `sid` query parameter are new sessions and get a
    /// random connected node; requests with one go where their binding says.
    pub async fn route(
        &self,
        path: &str,
        query: Option<&str>,
        ctx: &mut RoutingCtx,
    ) -> Result<String, RoutingError> {
        self.check_path(path)?;

        match sid_param(query) {
            None => {
                let nodes = self.nodes.nodes();
                self.selector.select_for_new_session(&nodes, ctx)
            }
            Some(raw) => {
                // A malformed id can never have been bound.
                let sid = SessionId::parse(&raw)
                    .ok_or(RoutingError::UnknownBinding { sid: raw })?;
                self.selector.select_for_existing_session(sid, ctx).await
            }
        }
    }

    /// Feeds a response chunk of a forwarded request to the handshake
    /// interceptor.
    pub fn observe_response(
        &self,
        ctx: &mut RoutingCtx,
        chunk: Option<&[u8]>,
        end_of_stream: bool,
    ) -> Option<JoinHandle<()>> {
        self.interceptor.observe(ctx, chunk, end_of_stream)
    }

    /// Handles a forwarding failure reported by the proxy engine.
    ///
    /// Deletes the binding of a returning session so its next request is
    /// treated as unbound. Runs at most once per request.
    pub fn on_forward_error(&self, ctx: &mut RoutingCtx) -> Option<JoinHandle<()>> {
        if ctx.unbound {
            return None;
        }
        let sid = ctx.session_id.as_ref()?;
        ctx.unbound = true;

        tracing::warn!(
            sid = %sid,
            backend = ctx.chosen_target.as_deref().unwrap_or("-"),
            "forwarding failed, unbinding sid"
        );
        Some(self.bindings.unbind(sid))
    }
}

/// Returns the value of the `sid` query parameter, if present.
///
/// Presence is what matters: `?sid=` yields `Some("")`.
pub fn sid_param(query: Option<&str>) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query?).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == SID_PARAM)
        .map(|(_, value)| value)
}
