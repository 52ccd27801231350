//! Pingora-based sticky-session proxy with a gRPC API for node updates.
//!
//! The proxy routes socket.io traffic to backend nodes, keeps session
//! bindings in Redis, and receives node liveness from the controller via
//! gRPC without restart.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pingora_core::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sticky_proxy::config::{Args, LogFormat, StoreKind};
use sticky_proxy::grpc::NodeRegistryService;
use sticky_proxy::health::start_health_server;
use sticky_proxy::proxy::{Dispatcher, StickyProxy};
use sticky_proxy::registry_api::node_registry_server::NodeRegistryServer;
use sticky_proxy::store::{BindingStore, MemoryBindingStore, NodeStore, RedisBindingStore};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let options = args.router_options()?;
    let nodes = Arc::new(NodeStore::with_nodes(args.seed_nodes()?));

    tracing::info!(
        listen = %args.listen,
        path = %options.path,
        key_prefix = %options.key_prefix,
        key_expiry = options.key_expiry,
        nodes = nodes.node_count(),
        "sticky-proxy starting"
    );

    // Pingora drives its own runtimes; the control plane and the Redis
    // connection driver live on this one.
    let control = tokio::runtime::Runtime::new().context("failed to start control runtime")?;

    let store: Arc<dyn BindingStore> = match args.binding_store {
        StoreKind::Redis => {
            let redis = control
                .block_on(RedisBindingStore::connect(&args.redis_url))
                .with_context(|| format!("failed to connect to redis at {}", args.redis_url))?;
            Arc::new(redis)
        }
        StoreKind::Memory => {
            tracing::warn!("using in-process binding store, bindings are not shared between instances");
            Arc::new(MemoryBindingStore::new())
        }
    };

    control.spawn(serve_registry(args.grpc_listen, Arc::clone(&nodes)));
    control.spawn(serve_health(args.health_listen, Arc::clone(&nodes)));

    let dispatcher = Arc::new(Dispatcher::new(options, nodes, store));

    let mut server = Server::new(None).map_err(|e| anyhow!("failed to create server: {}", e))?;
    server.bootstrap();

    let mut proxy =
        pingora_proxy::http_proxy_service(&server.configuration, StickyProxy::new(dispatcher));
    proxy.add_tcp(&args.listen.to_string());
    server.add_service(proxy);

    server.run_forever()
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn serve_registry(addr: SocketAddr, nodes: Arc<NodeStore>) {
    tracing::info!(addr = %addr, "gRPC node registry listening");

    if let Err(e) = tonic::transport::Server::builder()
        .add_service(NodeRegistryServer::new(NodeRegistryService::new(nodes)))
        .serve(addr)
        .await
    {
        tracing::error!(error = %e, "gRPC server stopped");
    }
}

async fn serve_health(addr: SocketAddr, nodes: Arc<NodeStore>) {
    tracing::info!(addr = %addr, "health server listening");

    if let Err(e) = start_health_server(addr, nodes).await {
        tracing::error!(error = %e, "health server stopped");
    }
}
