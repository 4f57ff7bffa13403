//! AMQP RPC surface consumed by the other services, §6. Grounded on
//! `original_source/auth/services/rpcServer.go`'s `ValidateJwt`/
//! `GetUserHomeDirectory` handlers, widened per SPEC_FULL.md to also serve
//! `GetUserDataByJwt`/`GetUserDataById` (consumed by `share-service` and
//! `sharespace-service` per `share/services/rpcClient.go`).

use std::sync::Arc;

use dfs_rpc::RpcServer;
use dfs_types::models::User;
use tracing::error;

use crate::jwt;
use crate::repository::UserRepository;

pub const Q_VALIDATE_JWT: &str = "rpc_auth_validate_jwt_queue";
pub const Q_GET_USER_DATA_BY_JWT: &str = "rpc_auth_get_user_data_by_jwt_queue";
pub const Q_GET_USER_DATA_BY_ID: &str = "rpc_auth_get_user_data_by_id_queue";

pub struct AuthRpc {
    users: UserRepository,
    jwt_secret: String,
}

impl AuthRpc {
    pub fn new(users: UserRepository, jwt_secret: String) -> Self {
        AuthRpc { users, jwt_secret }
    }

    pub fn spawn_all(self: Arc<Self>, server: Arc<RpcServer>) {
        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve(Q_VALIDATE_JWT, move |body| {
                    let this = this.clone();
                    async move {
                        let raw = String::from_utf8_lossy(&body);
                        let valid = jwt::verify(&raw, &this.jwt_secret).is_some();
                        bool_reply(valid)
                    }
                })
                .await
            {
                error!(queue = Q_VALIDATE_JWT, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        let srv = server.clone();
        tokio::spawn(async move {
            if let Err(e) = srv
                .serve_json::<String, Option<User>, _, _>(Q_GET_USER_DATA_BY_JWT, move |raw| {
                    let this = this.clone();
                    async move { Ok(this.resolve_by_jwt(&raw).await) }
                })
                .await
            {
                error!(queue = Q_GET_USER_DATA_BY_JWT, error = %e, "rpc server loop exited");
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server
                .serve_json::<i64, Option<User>, _, _>(Q_GET_USER_DATA_BY_ID, move |id| {
                    let this = this.clone();
                    async move { Ok(this.users.get_by_id(id).await.unwrap_or(None)) }
                })
                .await
            {
                error!(queue = Q_GET_USER_DATA_BY_ID, error = %e, "rpc server loop exited");
            }
        });
    }

    /// Returns `None` on any parse/signature/lookup failure — §6's
    /// "both return null on any failure" contract.
    async fn resolve_by_jwt(&self, raw_jwt: &str) -> Option<User> {
        let claims = jwt::verify(raw_jwt, &self.jwt_secret)?;
        let user_id = claims.user_id()?;
        self.users.get_by_id(user_id).await.ok().flatten()
    }
}

fn bool_reply(value: bool) -> Vec<u8> {
    if value { b"true".to_vec() } else { b"false".to_vec() }
}
