//! Auth service process entry point.
//!
//! Grounded on `original_source/auth/microservice/authMicroservice.go`:
//! an RPC client/server pair plus an HTTP app. No lifecycle publish — auth
//! is not part of the storage fleet.

use std::sync::Arc;

use anyhow::Context;
use auth_service::config::Config;
use auth_service::http::{self, AppState};
use auth_service::mail::MailService;
use auth_service::repository::{UserRepository, VerificationRepository};
use auth_service::rpc::AuthRpc;
use clap::Parser;
use dfs_rpc::{RpcClient, RpcServer};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();

    if config.is_production() && config.jwt_secret_key == "secret" {
        anyhow::bail!("refusing to start in production with the default JWT_SECRET_KEY");
    }

    let pool = SqlitePoolOptions::new()
        .connect(&config.db_connection_string)
        .await
        .context("failed to connect to the metadata database")?;

    let users = UserRepository::new(pool.clone());
    users.migrate().await.context("failed to run user migrations")?;
    let verifications = VerificationRepository::new(pool);
    verifications.migrate().await.context("failed to run verification migrations")?;

    let rpc_client = Arc::new(RpcClient::connect(&config.amqp_url).await.context("failed to connect rpc client")?);
    let rpc_server = Arc::new(RpcServer::connect(&config.amqp_url).await.context("failed to connect rpc server")?);

    let auth_rpc = Arc::new(AuthRpc::new(users.clone(), config.jwt_secret_key.clone()));
    auth_rpc.spawn_all(rpc_server);

    let http_state = AppState {
        users,
        verifications,
        mail: MailService::new(config.sendgrid_api_key.clone()),
        rpc: rpc_client,
        jwt_secret: config.jwt_secret_key.clone(),
    };

    let http_addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr).await.context("failed to bind http listener")?;

    info!(http_addr = %http_addr, "auth service online");

    axum::serve(listener, http::router(http_state)).await.context("http server exited")?;

    Ok(())
}
