//! Pingora ProxyHttp implementation for the sticky proxy.
//!
//! Maps the dispatcher onto Pingora's request phases: routing in
//! `request_filter`, peer construction in `upstream_peer`, handshake
//! observation in `response_body_filter`, and binding removal in the
//! connection error hooks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::Uri;
use pingora_core::prelude::*;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};

use super::{Dispatcher, RoutingCtx};

/// Gateway proxy forwarding socket.io traffic to the node chosen by the
/// dispatcher.
pub struct StickyProxy {
    dispatcher: Arc<Dispatcher>,
}

impl StickyProxy {
    /// Creates a new StickyProxy around the given dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl ProxyHttp for StickyProxy {
    type CTX = RoutingCtx;

    fn new_ctx(&self) -> Self::CTX {
        RoutingCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        let uri = &session.req_header().uri;
        let path = uri.path().to_string();
        let query = uri.query().map(str::to_string);
        let upgrade = session.is_upgrade_req();

        match self.dispatcher.route(&path, query.as_deref(), ctx).await {
            Ok(target) => {
                tracing::debug!(path = %path, upgrade = upgrade, backend = %target, "routing request");
                Ok(false)
            }
            Err(e) => {
                tracing::debug!(path = %path, upgrade = upgrade, error = %e, "error while routing");
                respond_bad_request(session).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        self.peer_for(ctx).await
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        // Backends see their own origin, not the proxy's.
        if let Some(target) = ctx.chosen_target.as_deref() {
            upstream_request.insert_header("Host", upstream_host(target)?)?;
        }
        Ok(())
    }

    fn response_body_filter(
        &self,
        session: &mut Session,
        body: &mut Option<Bytes>,
        end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> Result<Option<Duration>>
    where
        Self::CTX: Send + Sync,
    {
        if observes_body(session.is_upgrade_req()) {
            self.dispatcher
                .observe_response(ctx, body.as_deref(), end_of_stream);
        }
        Ok(None)
    }

    fn fail_to_connect(
        &self,
        _session: &mut Session,
        peer: &HttpPeer,
        ctx: &mut Self::CTX,
        e: Box<Error>,
    ) -> Box<Error> {
        tracing::warn!(peer = %peer, error = %e, "failed to connect to backend");
        self.dispatcher.on_forward_error(ctx);
        e
    }

    fn error_while_proxy(
        &self,
        peer: &HttpPeer,
        _session: &mut Session,
        e: Box<Error>,
        ctx: &mut Self::CTX,
        _client_reused: bool,
    ) -> Box<Error> {
        if should_unbind(&e) {
            tracing::warn!(peer = %peer, error = %e, "error while proxying to backend");
            self.dispatcher.on_forward_error(ctx);
        }
        e.more_context(format!("Peer: {}", peer))
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX)
    where
        Self::CTX: Send + Sync,
    {
        let status = session
            .response_written()
            .map(|r| r.status.as_u16())
            .unwrap_or(0);

        let method = session.req_header().method.as_str();
        let path = session.req_header().uri.path();
        let backend = ctx.chosen_target.as_deref().unwrap_or("-");
        let sid = ctx.session_id.as_ref().map(|s| s.as_str()).unwrap_or("-");

        match e {
            Some(e) => tracing::info!(
                method = method,
                path = path,
                status = status,
                backend = backend,
                sid = sid,
                new_session = ctx.is_new_session,
                error = %e,
                "request failed"
            ),
            None => tracing::info!(
                method = method,
                path = path,
                status = status,
                backend = backend,
                sid = sid,
                new_session = ctx.is_new_session,
                "request completed"
            ),
        }
    }
}

impl StickyProxy {
    /// Builds the upstream peer for the selected backend.
    ///
    /// A backend that cannot be addressed counts as a forwarding failure.
    async fn peer_for(&self, ctx: &mut RoutingCtx) -> Result<Box<HttpPeer>> {
        let target = ctx
            .chosen_target
            .as_deref()
            .ok_or_else(|| Error::explain(ErrorType::InternalError, "no backend selected"))?;

        let resolved = match parse_target(target) {
            Ok(backend) => resolve(&backend.connect_addr)
                .await
                .map(|addr| HttpPeer::new(addr, backend.tls, backend.sni)),
            Err(e) => Err(Error::explain(ErrorType::ConnectError, e)),
        };

        resolved.map(Box::new).inspect_err(|e| {
            tracing::warn!(error = %e, "backend address unusable");
            self.dispatcher.on_forward_error(ctx);
        })
    }
}

/// Header of the bodiless `400 Bad Request` sent for rejected requests.
///
/// Used for plain requests and WebSocket upgrades alike.
fn bad_request_header() -> Result<ResponseHeader> {
    let mut header = ResponseHeader::build(400, Some(3))?;
    header.insert_header("Connection", "close")?;
    header.insert_header("Content-Type", "text/html")?;
    header.insert_header("Content-Length", "0")?;
    Ok(header)
}

/// Writes the bad request response and closes the connection.
async fn respond_bad_request(session: &mut Session) -> Result<()> {
    let header = bad_request_header()?;
    session.set_keepalive(None);
    session.write_response_header(Box::new(header), true).await
}

/// `Host` header sent to the backend: the authority of its URI.
fn upstream_host(target: &str) -> Result<String> {
    parse_target(target)
        .map(|backend| backend.authority)
        .map_err(|e| Error::explain(ErrorType::InternalError, e))
}

/// Upgraded connections carry frames, not a handshake body.
fn observes_body(is_upgrade: bool) -> bool {
    !is_upgrade
}

/// Only failures on the backend side drop the binding; client aborts do not.
fn should_unbind(e: &Error) -> bool {
    e.esource() == &ErrorSource::Upstream
}

/// Resolves `host:port` to the first socket address.
async fn resolve(connect_addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(connect_addr)
        .await
        .or_err(ErrorType::ConnectError, "failed to resolve backend")?
        .next()
        .ok_or_else(|| {
            Error::explain(
                ErrorType::ConnectError,
                format!("no address for backend {}", connect_addr),
            )
        })
}

/// Connection details of a backend node URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    /// Authority as written in the URI, used as the upstream `Host`.
    pub authority: String,
    /// `host:port` with the scheme's default port filled in.
    pub connect_addr: String,
    pub tls: bool,
    pub sni: String,
}

/// Parses a backend URI such as `http://10.0.0.12:3000` or `wss://node-a`.
///
/// `https` and `wss` require TLS. IPv6 hosts lose their brackets in the SNI.
pub fn parse_target(target: &str) -> Result<BackendTarget, String> {
    let uri: Uri = target
        .parse()
        .map_err(|e| format!("invalid backend uri '{}': {}", target, e))?;

    let tls = match uri.scheme_str() {
        Some("http" | "ws") => false,
        Some("https" | "wss") => true,
        Some(other) => return Err(format!("unsupported scheme '{}' in '{}'", other, target)),
        None => return Err(format!("missing scheme in '{}'", target)),
    };

    let authority = uri
        .authority()
        .ok_or_else(|| format!("missing host in '{}'", target))?;
    let host = authority.host().trim_start_matches('[').trim_end_matches(']');
    let port = authority.port_u16().unwrap_or(if tls { 443 } else { 80 });

    let connect_addr = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };

    Ok(BackendTarget {
        authority: authority.as_str().to_string(),
        connect_addr,
        tls,
        sni: host.to_string(),
    })
}
