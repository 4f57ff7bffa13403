//! AMQP request/reply substrate, §4.A.
//!
//! Every dfs service talks to every other service through a handful of
//! named queues on a single RabbitMQ broker. [`RpcServer`] serves one
//! queue with prefetch=1 and manual ack (never more than one in-flight
//! request per queue); [`RpcClient`] issues a call against an anonymous,
//! exclusive, auto-delete reply queue keyed by a UUIDv4 correlation id
//! and times out after [`DEFAULT_TIMEOUT`] if no matching reply arrives.

mod client;
mod server;

pub use client::RpcClient;
pub use server::RpcServer;

use std::time::Duration;

use dfs_types::Error;
use lapin::{Connection, ConnectionProperties};

/// Deadline for [`RpcClient::call`] absent an explicit override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn connect(uri: &str) -> Result<Connection, Error> {
    Connection::connect(uri, ConnectionProperties::default())
        .await
        .map_err(|e| Error::Transport(format!("failed to connect to RabbitMQ: {e}")))
}
