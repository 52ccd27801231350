//! Handshake interception: binding a new session to the node that created it.
//!
//! The backend assigns the session id in the body of the first response
//! (`{"sid":"...", ...}` for engine.io). The body may arrive split across
//! chunks, so it is accumulated until end of stream before parsing.

use std::sync::{Arc, LazyLock};

use regex::bytes::Regex;
use tokio::task::JoinHandle;

use super::RoutingCtx;
use crate::session::SessionId;
use crate::store::BindingClient;

static SID_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""sid":"([A-Za-z0-9_-]{20})""#).expect("sid pattern is valid")
});

/// Extracts a session id from a handshake response body.
pub trait HandshakeParser: Send + Sync {
    fn parse_session_id(&self, body: &[u8]) -> Option<SessionId>;
}

/// Finds the first `"sid":"<20 chars>"` field in the body.
///
/// Later matches are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidFieldParser;

impl HandshakeParser for SidFieldParser {
    fn parse_session_id(&self, body: &[u8]) -> Option<SessionId> {
        let caps = SID_FIELD.captures(body)?;
        let raw = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
        SessionId::parse(raw)
    }
}

/// Response body accumulated for a new-session request.
#[derive(Debug, Default)]
pub struct HandshakeBuffer {
    body: Vec<u8>,
    overflowed: bool,
}

impl HandshakeBuffer {
    /// Appends a chunk unless that would exceed `limit` bytes.
    ///
    /// Once the limit is crossed the buffer is discarded for good.
    pub fn push(&mut self, chunk: &[u8], limit: usize) {
        if self.overflowed {
            return;
        }
        if self.body.len() + chunk.len() > limit {
            self.overflowed = true;
            self.body = Vec::new();
            return;
        }
        self.body.extend_from_slice(chunk);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }
}

/// Observes new-session responses and creates the binding once the session
/// id is known.
#[derive(Clone)]
pub struct HandshakeInterceptor {
    parser: Arc<dyn HandshakeParser>,
    bindings: BindingClient,
    max_body_bytes: usize,
}

impl HandshakeInterceptor {
    pub fn new(
        parser: Arc<dyn HandshakeParser>,
        bindings: BindingClient,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            parser,
            bindings,
            max_body_bytes,
        }
    }

    /// Feeds one response chunk.
    ///
    /// Returns the spawned binding write when the body ended with a session
    /// id in it; `None` otherwise. Returning-session requests are ignored.
    pub fn observe(
        &self,
        ctx: &mut RoutingCtx,
        chunk: Option<&[u8]>,
        end_of_stream: bool,
    ) -> Option<JoinHandle<()>> {
        if !ctx.is_new_session || ctx.handshake_done {
            return None;
        }

        if let Some(chunk) = chunk {
            ctx.handshake.push(chunk, self.max_body_bytes);
        }

        if !end_of_stream {
            return None;
        }
        ctx.handshake_done = true;

        if ctx.handshake.overflowed() {
            tracing::debug!(
                limit = self.max_body_bytes,
                "handshake body too large, sid not searched"
            );
            return None;
        }

        let Some(sid) = self.parser.parse_session_id(ctx.handshake.as_bytes()) else {
            tracing::debug!(
                body = %String::from_utf8_lossy(ctx.handshake.as_bytes()),
                "sid not found in handshake"
            );
            return None;
        };

        let target = ctx.chosen_target.as_deref()?;
        tracing::debug!(sid = %sid, backend = target, "binding sid with target");
        Some(self.bindings.bind(&sid, target))
    }
}
