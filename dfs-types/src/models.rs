//! Entity types shared across services, mirroring `DATA MODEL` §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
    pub verified: bool,
    pub home_directory: String,
    /// base64-encoded 32-byte AES key, generated once at creation.
    pub crypt_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationCode {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileEntry {
    pub id: i64,
    pub unique_name: String,
    pub display_name: String,
    pub creation_date: DateTime<Utc>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareGrant {
    pub file_id: i64,
    pub shared_for_id: i64,
    pub shared_by_id: i64,
    pub expiration_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareSpace {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub home_directory: String,
    pub crypt_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum ShareSpaceRole {
    Member,
    Moderator,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareSpaceMember {
    pub share_space_id: i64,
    pub user_id: i64,
    pub role: ShareSpaceRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareSpaceFile {
    pub id: i64,
    pub share_space_id: i64,
    pub unique_name: String,
    pub display_name: String,
    pub path: String,
    pub creation_date: DateTime<Utc>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: uuid::Uuid,
    pub ip_address: String,
    pub port: u16,
    pub grpc_port: u16,
}

impl Node {
    pub fn grpc_address(&self) -> String {
        format!("http://{}:{}", self.ip_address, self.grpc_port)
    }
}

/// Lifecycle message exchanged on `rpc_gateway_node_messages`, §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeCycleMessage {
    pub node: Node,
    pub action: NodeAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAction {
    Add,
    Delete,
}
