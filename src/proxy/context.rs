//! Per-request routing state.

use super::handshake::HandshakeBuffer;
use crate::session::SessionId;

/// Routing state for one inbound request.
///
/// Created when the request arrives and dropped with it; never shared
/// between requests or persisted.
#[derive(Debug, Default)]
pub struct RoutingCtx {
    /// The request carried no `sid` and was load balanced.
    pub is_new_session: bool,
    /// Session id of a returning-session request.
    pub session_id: Option<SessionId>,
    /// Backend URI the request is forwarded to.
    pub chosen_target: Option<String>,
    /// Response body accumulated while looking for the session id.
    pub handshake: HandshakeBuffer,
    /// The response body ended and was inspected.
    pub handshake_done: bool,
    /// The binding was already deleted after a forwarding failure.
    pub unbound: bool,
}
