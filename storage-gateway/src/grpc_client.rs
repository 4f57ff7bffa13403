//! Per-call gRPC dial to a storage node, §9 design notes ("reasonable as a
//! baseline; mention an explicit connection pool ... as an optimization").
//! Grounded on `original_source/storageGateway/services/gRpcStorageClient.go`,
//! which dials fresh for every `NewGrpcStorageClient(...).Connect(...)`.

use std::time::Duration;

use dfs_proto::storage_client::StorageClient;
use dfs_types::{Error, models::Node};
use tonic::Request;
use tonic::transport::Channel;

/// §5's mandated per-call deadline for the gateway's node control plane,
/// mirroring the Go original's `context.WithTimeout(ctx, 10*time.Second)`.
const GRPC_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn connect(node: &Node) -> Result<StorageClient<Channel>, Error> {
    StorageClient::connect(node.grpc_address())
        .await
        .map_err(|e| Error::Transport(format!("cannot connect to grpc server at {}: {e}", node.grpc_address())))
}

/// Wraps `message` in a [`Request`] carrying the default gRPC deadline.
/// Every call made through [`connect`]'s client must go through this.
pub fn deadlined<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(GRPC_TIMEOUT);
    request
}
