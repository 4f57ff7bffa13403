//! HTTP surface, §4.F/§6. Grounded on
//! `original_source/share/controllers/shareController.go`'s
//! `shareFile`/`unshareFile`/`getSharedFiles`, ported from a Fiber
//! session store holding `userData` to an `axum` request extension
//! populated by a JWT-RPC auth middleware (the same pattern
//! `storage-node::http` uses), and extended per SPEC_FULL.md with
//! `/api/share/me` and the `/api/share/:uniqueName` download route the
//! distillation's `SharedFileDto`/`SharedForDto` types imply but the
//! available controller snapshot doesn't wire up.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use dfs_rpc::RpcClient;
use dfs_types::dto::{OwnedFileRequestDto, ShareDto, SharedFileDto, SharedForDto, UnshareDto};
use dfs_types::models::{FileEntry, ShareGrant, User};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::repository::ShareRepository;

const Q_GET_USER_DATA_BY_JWT: &str = "rpc_auth_get_user_data_by_jwt_queue";
const Q_GET_USER_DATA_BY_ID: &str = "rpc_auth_get_user_data_by_id_queue";
const Q_GET_OWNED_FILE: &str = "rpc_storage_get_owned_file_queue";
const Q_GET_FILE_BY_ID: &str = "rpc_storage_get_file_by_id_queue";
const Q_GET_FILE_BY_UNIQUE_NAME: &str = "rpc_storage_get_file_by_unique_name_queue";
const Q_GET_FILE_CONTENT: &str = "rpc_storage_get_file_content";

#[derive(Clone)]
pub struct AppState {
    pub repo: ShareRepository,
    pub rpc: Arc<RpcClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/share", post(share_file).delete(unshare_file).get(shared_with_me))
        .route("/api/share/me", get(shared_by_me))
        .route("/api/share/{unique_name}", get(download_shared_file))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(State(state): State<AppState>, jar: CookieJar, mut request: axum::extract::Request, next: Next) -> Response {
    let Some(jwt) = jar.get("jwt").map(|c| c.value().to_string()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user: Option<User> = state.rpc.call_json(Q_GET_USER_DATA_BY_JWT, &jwt).await.ok().flatten();

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn get_owned_file(rpc: &RpcClient, file_id: i64, owner_id: i64) -> Option<FileEntry> {
    rpc.call_json::<_, Option<FileEntry>>(Q_GET_OWNED_FILE, &OwnedFileRequestDto { file_id, owner_id })
        .await
        .ok()
        .flatten()
}

async fn get_file_by_id(rpc: &RpcClient, file_id: i64) -> Option<FileEntry> {
    rpc.call_json::<_, Option<FileEntry>>(Q_GET_FILE_BY_ID, &file_id).await.ok().flatten()
}

async fn get_file_by_unique_name(rpc: &RpcClient, unique_name: &str) -> Option<FileEntry> {
    rpc.call_json::<_, Option<FileEntry>>(Q_GET_FILE_BY_UNIQUE_NAME, &unique_name.to_string()).await.ok().flatten()
}

async fn get_user_by_id(rpc: &RpcClient, user_id: i64) -> Option<User> {
    rpc.call_json::<_, Option<User>>(Q_GET_USER_DATA_BY_ID, &user_id).await.ok().flatten()
}

async fn share_file(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>, Json(dto): Json<ShareDto>) -> StatusCode {
    if dto.shared_by_id == dto.shared_to_id {
        return StatusCode::BAD_REQUEST;
    }
    if dto.shared_by_id != caller.id {
        return StatusCode::UNAUTHORIZED;
    }

    let Some(recipient) = get_user_by_id(&state.rpc, dto.shared_to_id).await else {
        return StatusCode::BAD_REQUEST;
    };

    let Some(file) = get_owned_file(&state.rpc, dto.file_id, dto.shared_by_id).await else {
        return StatusCode::BAD_REQUEST;
    };

    let grant = ShareGrant {
        file_id: file.id,
        shared_for_id: recipient.id,
        shared_by_id: caller.id,
        expiration_time: dto.expiration_time,
    };

    match state.repo.create(&grant).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "failed to persist share grant");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn unshare_file(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>, Json(dto): Json<UnshareDto>) -> StatusCode {
    if get_owned_file(&state.rpc, dto.file_id, caller.id).await.is_none() {
        return StatusCode::NOT_FOUND;
    }

    match state.repo.delete(dto.file_id, dto.shared_to_id).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "failed to delete share grant");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn shared_with_me(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>) -> Result<Json<Vec<SharedFileDto>>, StatusCode> {
    let grants = state.repo.shared_with_me(caller.id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut out = Vec::with_capacity(grants.len());
    for grant in grants {
        let Some(file) = get_file_by_id(&state.rpc, grant.file_id).await else { continue };
        let Some(owner) = get_user_by_id(&state.rpc, file.owner_id).await else { continue };
        let Some(shared_by) = get_user_by_id(&state.rpc, grant.shared_by_id).await else { continue };

        out.push(SharedFileDto {
            unique_name: file.unique_name,
            name: file.display_name,
            owner: owner.email,
            shared_by: shared_by.email,
            available_to: grant.expiration_time,
        });
    }

    Ok(Json(out))
}

async fn shared_by_me(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>) -> Result<Json<Vec<SharedForDto>>, StatusCode> {
    let grants = state.repo.shared_by_me(caller.id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut by_file: HashMap<i64, (FileEntry, Vec<String>, DateTime<Utc>)> = HashMap::new();
    for grant in grants {
        let Some(file) = get_file_by_id(&state.rpc, grant.file_id).await else { continue };
        let Some(recipient) = get_user_by_id(&state.rpc, grant.shared_for_id).await else { continue };

        by_file
            .entry(grant.file_id)
            .or_insert_with(|| (file.clone(), Vec::new(), grant.expiration_time))
            .1
            .push(recipient.email);
    }

    let out = by_file
        .into_values()
        .map(|(file, shared_for, available_to)| SharedForDto {
            unique_name: file.unique_name,
            name: file.display_name,
            shared_for,
            available_to,
        })
        .collect();

    Ok(Json(out))
}

async fn download_shared_file(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Path(unique_name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    let file = get_file_by_unique_name(&state.rpc, &unique_name).await.ok_or(StatusCode::NOT_FOUND)?;

    state.repo.get(file.id, caller.id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?.ok_or(StatusCode::NOT_FOUND)?;

    let owner = get_user_by_id(&state.rpc, file.owner_id).await.ok_or(StatusCode::NOT_FOUND)?;

    #[derive(Serialize)]
    struct ReadReq {
        read_path: String,
        decryption_key: String,
    }
    let read_path = format!("{}/{}", owner.home_directory, file.unique_name);
    let body = serde_json::to_vec(&ReadReq { read_path, decryption_key: owner.crypt_key }).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    state.rpc.call_raw(Q_GET_FILE_CONTENT, body).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
