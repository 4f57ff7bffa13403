//! AMQP RPC surface, §6. Grounded on
//! `original_source/storage/services/rpcServer.go`: one queue per
//! operation, wired onto [`dfs_rpc::RpcServer`] instead of the Go
//! codebase's hand-copied `RegisterXxx` methods.

use std::sync::Arc;

use dfs_rpc::RpcServer;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::fs_store::FsStore;
use crate::repository::FileRepository;

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

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveFileRequest {
    pub save_path: String,
    pub content: Vec<u8>,
    pub encryption_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteFileRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadFileRequest {
    pub read_path: String,
    pub decryption_key: String,
}

pub struct StorageRpc {
    fs: Arc<FsStore>,
    repo: Arc<FileRepository>,
}

impl StorageRpc {
    pub fn new(fs: Arc<FsStore>, repo: Arc<FileRepository>) -> Self {
        StorageRpc { fs, repo }
    }

    /// Spawns one task per queue; returns immediately, the tasks run until
    /// the process exits.
    pub fn spawn_all(self: Arc<Self>, server: Arc<RpcServer>) {
        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_CREATE_HOME_DIR, move |body| {
                    let this = this.clone();
                    async move {
                        let name = String::from_utf8_lossy(&body).to_string();
                        let ok = this.fs.create_home_directory(&name).await.is_ok();
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
                .serve_json::<GetOwnedFileRequest, Option<dfs_types::models::FileEntry>, _, _>(
                    Q_GET_OWNED_FILE,
                    move |req| {
                        let this = this.clone();
                        async move {
                            Ok(this
                                .repo
                                .get_owned_file_by_id(req.file_id, req.owner_id)
                                .await
                                .unwrap_or(None))
                        }
                    },
                )
                .await
            {
                error!(queue = Q_GET_OWNED_FILE, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve_json::<i64, Option<dfs_types::models::FileEntry>, _, _>(Q_GET_FILE_BY_ID, move |id| {
                    let this = this.clone();
                    async move { Ok(this.repo.get_file_by_id(id).await.unwrap_or(None)) }
                })
                .await
            {
                error!(queue = Q_GET_FILE_BY_ID, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve_json::<String, Option<dfs_types::models::FileEntry>, _, _>(
                    Q_GET_FILE_BY_UNIQUE_NAME,
                    move |name| {
                        let this = this.clone();
                        async move { Ok(this.repo.get_file_by_unique_name(&name).await.unwrap_or(None)) }
                    },
                )
                .await
            {
                error!(queue = Q_GET_FILE_BY_UNIQUE_NAME, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_SAVE_FILE, move |body| {
                    let this = this.clone();
                    async move {
                        let ok = match serde_json::from_slice::<SaveFileRequest>(&body) {
                            Ok(req) => this
                                .fs
                                .encrypt_and_save(&req.save_path, &req.content, &req.encryption_key)
                                .await
                                .is_ok(),
                            Err(_) => false,
                        };
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
                        let ok = match serde_json::from_slice::<DeleteFileRequest>(&body) {
                            Ok(req) => this.fs.remove(&req.file_path).await.is_ok(),
                            Err(_) => false,
                        };
                        bool_reply(ok)
                    }
                })
                .await
            {
                error!(queue = Q_DELETE_FILE, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server
                .serve(Q_GET_FILE_CONTENT, move |body| {
                    let this = this.clone();
                    async move {
                        match serde_json::from_slice::<ReadFileRequest>(&body) {
                            Ok(req) => this
                                .fs
                                .decrypt_and_read(&req.read_path, &req.decryption_key)
                                .await
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
    }
}

fn bool_reply(value: bool) -> Vec<u8> {
    if value { b"true".to_vec() } else { b"false".to_vec() }
}
