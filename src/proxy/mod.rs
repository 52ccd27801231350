//! Sticky routing of socket.io traffic.
//!
//! The dispatcher decides where each request goes: new sessions are load
//! balanced across connected nodes, returning sessions follow their binding.
//! `StickyProxy` plugs the dispatcher into Pingora, which does the actual
//! forwarding of HTTP and WebSocket traffic.

mod context;
mod dispatcher;
mod gateway;
mod handshake;
mod selector;

pub use context::RoutingCtx;
pub use dispatcher::{sid_param, Dispatcher, SID_PARAM};
pub use gateway::StickyProxy;
pub use handshake::{HandshakeBuffer, HandshakeInterceptor, HandshakeParser, SidFieldParser};
pub use selector::{NodePicker, RandomPicker, TargetSelector};
