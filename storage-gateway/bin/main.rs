//! Storage gateway process entry point.
//!
//! Grounded on `original_source/storageGateway/microservice/gatewayMicroservice.go`:
//! an RPC client/server pair plus an HTTP app, with no gRPC server of its
//! own (the gateway is a gRPC *client* of every storage node) and no
//! lifecycle Add/Delete publish of its own (only storage nodes announce
//! themselves).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dfs_rpc::{RpcClient, RpcServer};
use storage_gateway::config::Config;
use storage_gateway::http::{self, AppState};
use storage_gateway::registry::NodeRegistry;
use storage_gateway::rpc::GatewayRpc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();

    let registry = Arc::new(NodeRegistry::new());

    let rpc_server = Arc::new(RpcServer::connect(&config.amqp_url).await.context("failed to connect rpc server")?);

    let gateway_rpc = Arc::new(GatewayRpc::new(registry.clone()));
    gateway_rpc.spawn_all(rpc_server);

    let http_state = AppState {
        registry: registry.clone(),
        http: reqwest::Client::new(),
    };
    let http_addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr).await.context("failed to bind http listener")?;

    info!(http_addr = %http_addr, "storage gateway online");

    axum::serve(listener, http::router(http_state)).await.context("http server exited")?;

    Ok(())
}
