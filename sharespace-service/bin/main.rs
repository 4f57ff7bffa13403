//! Sharespace service process entry point.
//!
//! Grounded on `original_source/sharespace/microservice/shareSpaceMicroservice.go`:
//! an RPC client (no server) plus an HTTP app.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dfs_rpc::RpcClient;
use sharespace_service::config::Config;
use sharespace_service::http::{self, AppState};
use sharespace_service::repository::ShareSpaceRepository;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();

    let pool = SqlitePoolOptions::new()
        .connect(&config.db_connection_string)
        .await
        .context("failed to connect to the metadata database")?;

    let repo = ShareSpaceRepository::new(pool);
    repo.migrate().await.context("failed to run share space migrations")?;

    let rpc = Arc::new(RpcClient::connect(&config.amqp_url).await.context("failed to connect rpc client")?);

    let http_state = AppState { repo, rpc };

    let http_addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr).await.context("failed to bind http listener")?;

    info!(http_addr = %http_addr, "sharespace service online");

    axum::serve(listener, http::router(http_state)).await.context("http server exited")?;

    Ok(())
}
