//! AMQP RPC surface, §4.D/§6. Same queue names `storage-node` answers — the
//! gateway is a drop-in proxy — routed through [`crate::registry::NodeRegistry`]
//! instead of a single node's local state. Grounded on
//! `original_source/storageGateway/services/rpcServer.go` (queue
//! registration) and `nodeService.go` (master-write + async-fan-out
//! replication).

use std::sync::Arc;

use dfs_rpc::RpcServer;
use dfs_types::models::{FileEntry, LifeCycleMessage, Node, NodeAction};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::grpc_client;
use crate::registry::NodeRegistry;

pub const Q_NODE_MESSAGES: &str = "rpc_gateway_node_messages";
pub const Q_CREATE_HOME_DIR: &str = "rpc_storage_create_home_dir_queue";
pub const Q_GET_OWNED_FILE: &str = "rpc_storage_get_owned_file_queue";
pub const Q_GET_FILE_BY_ID: &str = "rpc_storage_get_file_by_id_queue";
pub const Q_GET_FILE_BY_UNIQUE_NAME: &str = "rpc_storage_get_file_by_unique_name_queue";
pub const Q_SAVE_FILE: &str = "rpc_storage_save_file";
pub const Q_DELETE_FILE: &str = "rpc_storage_delete_file";
pub const Q_GET_FILE_CONTENT: &str = "rpc_storage_get_file_content";

#[derive(Debug, Deserialize)]
pub struct GetOwnedFileRequest {
    pub file_id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SaveFileRequest {
    pub save_path: String,
    pub content: Vec<u8>,
    pub encryption_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeleteFileRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadFileRequest {
    pub read_path: String,
    pub decryption_key: String,
}

pub struct GatewayRpc {
    registry: Arc<NodeRegistry>,
}

impl GatewayRpc {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        GatewayRpc { registry }
    }

    async fn create_home_directory_on(node: &Node, name: &str) -> bool {
        match grpc_client::connect(node).await {
            Ok(mut client) => client
                .create_home_directory(grpc_client::deadlined(dfs_proto::HomeDir { name: name.to_string() }))
                .await
                .map(|r| r.into_inner().success)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn save_file_on(node: &Node, req: &SaveFileRequest) -> bool {
        match grpc_client::connect(node).await {
            Ok(mut client) => client
                .save_file_on_disk(grpc_client::deadlined(dfs_proto::SaveFileRequest {
                    save_path: req.save_path.clone(),
                    content: req.content.clone(),
                    encryption_key: req.encryption_key.clone().into_bytes(),
                }))
                .await
                .map(|r| r.into_inner().success)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete_file_on(node: &Node, req: &DeleteFileRequest) -> bool {
        match grpc_client::connect(node).await {
            Ok(mut client) => client
                .delete_file_from_disk(grpc_client::deadlined(dfs_proto::DeleteFileRequest {
                    file_path: req.file_path.clone(),
                }))
                .await
                .map(|r| r.into_inner().success)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Fans `op` out to every node but `master`, logging (never failing on)
    /// per-replica errors — §4.D's "replica failure never fails the client
    /// operation" policy.
    fn fan_out<T, F, Fut>(&self, master_uuid: uuid::Uuid, payload: T, op: F)
    where
        T: Clone + Send + 'static,
        F: Fn(Node, T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        let replicas: Vec<Node> = self.registry.snapshot().into_iter().filter(|n| n.uuid != master_uuid).collect();
        let op = Arc::new(op);
        for node in replicas {
            let payload = payload.clone();
            let op = op.clone();
            tokio::spawn(async move {
                if !op(node.clone(), payload).await {
                    warn!(node = %node.uuid, "replica fan-out failed, continuing");
                }
            });
        }
    }

    pub fn spawn_all(self: Arc<Self>, server: Arc<RpcServer>) {
        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .consume_json::<LifeCycleMessage, _, _>(Q_NODE_MESSAGES, move |msg| {
                    let this = this.clone();
                    async move { this.handle_lifecycle(msg).await }
                })
                .await
            {
                error!(queue = Q_NODE_MESSAGES, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_CREATE_HOME_DIR, move |body| {
                    let this = this.clone();
                    async move {
                        let name = String::from_utf8_lossy(&body).to_string();
                        let Ok(master) = this.registry.pick_round_robin() else {
                            return bool_reply(false);
                        };
                        let ok = Self::create_home_directory_on(&master, &name).await;
                        if ok {
                            this.fan_out(master.uuid, name, |node, name| async move {
                                Self::create_home_directory_on(&node, &name).await
                            });
                        }
                        bool_reply(ok)
                    }
                })
                .await
            {
                error!(queue = Q_CREATE_HOME_DIR, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_SAVE_FILE, move |body| {
                    let this = this.clone();
                    async move {
                        let Ok(req) = serde_json::from_slice::<SaveFileRequest>(&body) else {
                            return bool_reply(false);
                        };
                        let Ok(master) = this.registry.pick_round_robin() else {
                            return bool_reply(false);
                        };
                        let ok = Self::save_file_on(&master, &req).await;
                        if ok {
                            this.fan_out(master.uuid, req, |node, req| async move {
                                Self::save_file_on(&node, &req).await
                            });
                        }
                        bool_reply(ok)
                    }
                })
                .await
            {
                error!(queue = Q_SAVE_FILE, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_DELETE_FILE, move |body| {
                    let this = this.clone();
                    async move {
                        let Ok(req) = serde_json::from_slice::<DeleteFileRequest>(&body) else {
                            return bool_reply(false);
                        };
                        let Ok(master) = this.registry.pick_round_robin() else {
                            return bool_reply(false);
                        };
                        let ok = Self::delete_file_on(&master, &req).await;
                        if ok {
                            this.fan_out(master.uuid, req, |node, req| async move {
                                Self::delete_file_on(&node, &req).await
                            });
                        }
                        bool_reply(ok)
                    }
                })
                .await
            {
                error!(queue = Q_DELETE_FILE, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_GET_FILE_CONTENT, move |body| {
                    let this = this.clone();
                    async move {
                        let Ok(req) = serde_json::from_slice::<ReadFileRequest>(&body) else {
                            return Vec::new();
                        };
                        let Ok(node) = this.registry.pick_round_robin() else {
                            return Vec::new();
                        };
                        match grpc_client::connect(&node).await {
                            Ok(mut client) => client
                                .get_file_content_from_disk(grpc_client::deadlined(dfs_proto::ReadFileRequest {
                                    read_path: req.read_path,
                                    decryption_key: req.decryption_key,
                                }))
                                .await
                                .map(|r| r.into_inner().content)
                                .unwrap_or_default(),
                            Err(_) => Vec::new(),
                        }
                    }
                })
                .await
            {
                error!(queue = Q_GET_FILE_CONTENT, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve_json::<GetOwnedFileRequest, Option<FileEntry>, _, _>(Q_GET_OWNED_FILE, move |req| {
                    let this = this.clone();
                    async move {
                        let Ok(node) = this.registry.pick_round_robin() else {
                            return Ok(None);
                        };
                        let Ok(client) = grpc_client::connect(&node).await else {
                            return Ok(None);
                        };
                        Ok(query_owned_file(client, req.file_id, req.owner_id).await)
                    }
                })
                .await
            {
                error!(queue = Q_GET_OWNED_FILE, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve_json::<i64, Option<FileEntry>, _, _>(Q_GET_FILE_BY_ID, move |id| {
                    let this = this.clone();
                    async move {
                        let Ok(node) = this.registry.pick_round_robin() else {
                            return Ok(None);
                        };
                        let Ok(mut client) = grpc_client::connect(&node).await else {
                            return Ok(None);
                        };
                        let entry = client
                            .get_file_by_id(grpc_client::deadlined(dfs_proto::GetFileByIdRequest { file_id: id as u64 }))
                            .await
                            .ok()
                            .map(|r| from_proto(r.into_inner()));
                        Ok(entry)
                    }
                })
                .await
            {
                error!(queue = Q_GET_FILE_BY_ID, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server
                .serve_json::<String, Option<FileEntry>, _, _>(Q_GET_FILE_BY_UNIQUE_NAME, move |name| {
                    let this = this.clone();
                    async move {
                        let Ok(node) = this.registry.pick_round_robin() else {
                            return Ok(None);
                        };
                        let Ok(mut client) = grpc_client::connect(&node).await else {
                            return Ok(None);
                        };
                        let entry = client
                            .get_file_by_unique_name(grpc_client::deadlined(dfs_proto::FileUniqueName { name }))
                            .await
                            .ok()
                            .map(|r| from_proto(r.into_inner()));
                        Ok(entry)
                    }
                })
                .await
            {
                error!(queue = Q_GET_FILE_BY_UNIQUE_NAME, error = %e, "rpc server loop exited");
            }
        });
    }

    async fn handle_lifecycle(&self, msg: LifeCycleMessage) {
        match msg.action {
            NodeAction::Add => {
                let registry = self.registry.clone();
                let joined = registry
                    .admit(msg.node.clone(), |existing, newcomer| async move {
                        sync_new_node(&existing, &newcomer).await
                    })
                    .await;
                if !joined {
                    warn!(node = %msg.node.uuid, "node join rejected, awaiting retry");
                }
            }
            NodeAction::Delete => {
                self.registry.remove(msg.node.uuid);
            }
        }
    }
}

async fn sync_new_node(existing: &Node, newcomer: &Node) -> bool {
    let Ok(mut existing_client) = grpc_client::connect(existing).await else {
        return false;
    };
    let Ok(files) = existing_client.get_stored_files(grpc_client::deadlined(())).await else {
        return false;
    };

    let Ok(mut new_client) = grpc_client::connect(newcomer).await else {
        return false;
    };

    new_client
        .sync_stored_files(grpc_client::deadlined(files.into_inner()))
        .await
        .map(|r| r.into_inner().success)
        .unwrap_or(false)
}

async fn query_owned_file(
    mut client: dfs_proto::storage_client::StorageClient<tonic::transport::Channel>,
    file_id: i64,
    owner_id: i64,
) -> Option<FileEntry> {
    client
        .get_owned_file(grpc_client::deadlined(dfs_proto::OwnedFileRequest {
            file_id: file_id as u64,
            owner_id: owner_id as u64,
        }))
        .await
        .ok()
        .map(|r| from_proto(r.into_inner()))
}

fn from_proto(entry: dfs_proto::FileEntry) -> FileEntry {
    let creation_date = entry
        .creation_date
        .map(|ts| chrono::DateTime::from_timestamp(ts.seconds, ts.nanos as u32).unwrap_or_default())
        .unwrap_or_default();
    FileEntry {
        id: entry.id as i64,
        unique_name: entry.unique_name,
        display_name: entry.name,
        creation_date,
        owner_id: entry.owner_id as i64,
    }
}

fn bool_reply(value: bool) -> Vec<u8> {
    if value { b"true".to_vec() } else { b"false".to_vec() }
}
