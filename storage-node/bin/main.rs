//! Storage node process entry point.
//!
//! Grounded on `original_source/storage/microservice/storageMicroservice.go`
//! for the overall wiring (RPC client + RPC server + HTTP app, all started
//! together) and `s5_node`'s `tokio::signal::ctrl_c` shutdown pattern
//! (`s5_node/src/lib.rs`).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dfs_proto::storage_server::StorageServer;
use dfs_rpc::{RpcClient, RpcServer};
use dfs_types::models::{LifeCycleMessage, Node, NodeAction};
use sqlx::sqlite::SqlitePoolOptions;
use storage_node::config::Config;
use storage_node::fs_store::FsStore;
use storage_node::grpc::StorageService;
use storage_node::http::{self, AppState};
use storage_node::repository::FileRepository;
use storage_node::rpc::StorageRpc;
use tonic::transport::Server as GrpcServer;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();

    tokio::fs::create_dir_all(&config.storage_path)
        .await
        .context("failed to create storage root")?;

    let fs = Arc::new(FsStore::new(config.storage_path.clone()));

    let pool = SqlitePoolOptions::new()
        .connect(&config.db_connection_string)
        .await
        .context("failed to connect to the metadata database")?;
    let repo = Arc::new(FileRepository::new(pool));
    repo.migrate().await.context("failed to run metadata migrations")?;

    let rpc_client = Arc::new(RpcClient::connect(&config.amqp_url).await.context("failed to connect rpc client")?);
    let rpc_server = Arc::new(RpcServer::connect(&config.amqp_url).await.context("failed to connect rpc server")?);

    let storage_rpc = Arc::new(StorageRpc::new(fs.clone(), repo.clone()));
    storage_rpc.spawn_all(rpc_server);

    let grpc_addr = config.grpc_addr().parse().context("invalid grpc bind address")?;
    let grpc_service = StorageService::new((*fs).clone(), (*repo).clone());
    tokio::spawn(async move {
        if let Err(e) = GrpcServer::builder()
            .add_service(StorageServer::new(grpc_service))
            .serve(grpc_addr)
            .await
        {
            tracing::error!(error = %e, "grpc server exited");
        }
    });

    let http_state = AppState {
        fs: fs.clone(),
        repo: repo.clone(),
        rpc: rpc_client.clone(),
    };
    let http_addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr).await.context("failed to bind http listener")?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, http::router(http_state)).await {
            tracing::error!(error = %e, "http server exited");
        }
    });

    let self_node = Node {
        uuid: Uuid::new_v4(),
        ip_address: config.ip_address.clone(),
        port: config.port,
        grpc_port: config.grpc_port,
    };

    rpc_client
        .publish_json(
            "rpc_gateway_node_messages",
            &LifeCycleMessage {
                node: self_node.clone(),
                action: NodeAction::Add,
            },
        )
        .await
        .context("failed to announce node to the gateway")?;

    info!(node = %self_node.uuid, http_addr = %http_addr, grpc_addr = %config.grpc_addr(), "storage node online");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!(node = %self_node.uuid, "shutting down, deregistering from gateway");
    rpc_client
        .publish_json(
            "rpc_gateway_node_messages",
            &LifeCycleMessage {
                node: self_node,
                action: NodeAction::Delete,
            },
        )
        .await
        .context("failed to deregister node from the gateway")?;

    Ok(())
}
