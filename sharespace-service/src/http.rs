//! HTTP surface, §4.F/§6. Grounded on
//! `original_source/sharespace/controllers/shareSpaceController.go`,
//! ported from a Fiber session store holding `userData` to an `axum`
//! request extension populated by a JWT-RPC auth middleware, matching
//! `storage-node::http`/`share-service::http`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use axum_extra::extract::CookieJar;
use dfs_rpc::RpcClient;
use dfs_types::dto::{CreateShareSpaceDto, ShareSpaceDto, ShareSpaceMemberDto};
use dfs_types::models::{ShareSpaceRole, User};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::repository::ShareSpaceRepository;

const Q_GET_USER_DATA_BY_JWT: &str = "rpc_auth_get_user_data_by_jwt_queue";
const Q_GET_USER_DATA_BY_ID: &str = "rpc_auth_get_user_data_by_id_queue";
const Q_CREATE_HOME_DIR: &str = "rpc_storage_create_home_dir_queue";
const Q_SAVE_FILE: &str = "rpc_storage_save_file";
const Q_DELETE_FILE: &str = "rpc_storage_delete_file";
const Q_GET_FILE_CONTENT: &str = "rpc_storage_get_file_content";

#[derive(Clone)]
pub struct AppState {
    pub repo: ShareSpaceRepository,
    pub rpc: Arc<RpcClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sharespace", post(create_share_space).get(get_share_spaces))
        .route("/api/sharespace/user", post(add_to_share_space).delete(delete_from_share_space))
        .route("/api/sharespace/{share_space_id}", delete(delete_share_space).get(get_share_space_members))
        .route("/api/sharespace/{share_space_id}/file", post(upload_file_to_share_space).get(get_files_from_share_space))
        .route(
            "/api/sharespace/{share_space_id}/file/{unique_file_name}",
            get(download_file_from_share_space).delete(delete_file_from_share_space),
        )
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

async fn get_user_by_id(rpc: &RpcClient, user_id: i64) -> Option<User> {
    rpc.call_json::<_, Option<User>>(Q_GET_USER_DATA_BY_ID, &user_id).await.ok().flatten()
}

async fn create_home_directory(rpc: &RpcClient, directory: &str) -> bool {
    rpc.call_raw(Q_CREATE_HOME_DIR, directory.as_bytes().to_vec()).await.map(|b| b == b"true").unwrap_or(false)
}

fn parse_id(raw: &str) -> Result<i64, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

async fn create_share_space(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Json(dto): Json<CreateShareSpaceDto>,
) -> StatusCode {
    if dto.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }

    let home_directory = format!("{}_{}", caller.email, dto.share_space_name);

    if !create_home_directory(&state.rpc, &home_directory).await {
        error!("cannot create home directory for share space");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let crypt_key = dfs_crypto::generate_key_base64();

    let Ok(share_space_id) = state.repo.create_share_space(&dto.share_space_name, caller.id, &home_directory, &crypt_key).await else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    match state.repo.add_user_to_share_space(caller.id, share_space_id, ShareSpaceRole::Owner).await {
        Ok(()) => StatusCode::CREATED,
        Err(e) => {
            error!(error = %e, "failed to register owner as share space member");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn delete_share_space(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>, Path(share_space_id): Path<String>) -> StatusCode {
    let Ok(share_space_id) = parse_id(&share_space_id) else { return StatusCode::BAD_REQUEST };

    let Ok(Some(share_space)) = state.repo.get_owned_share_space_by_id(share_space_id, caller.id).await else {
        return StatusCode::UNAUTHORIZED;
    };

    if state.repo.delete_entire_share_space(share_space_id).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    #[derive(Serialize)]
    struct DeleteReq {
        file_path: String,
    }
    let _: bool = state
        .rpc
        .call_json(Q_DELETE_FILE, &DeleteReq { file_path: share_space.home_directory })
        .await
        .unwrap_or(false);

    StatusCode::OK
}

async fn get_share_spaces(State(state): State<AppState>, axum::Extension(caller): axum::Extension<User>) -> Result<Json<Vec<ShareSpaceDto>>, StatusCode> {
    let spaces = state.repo.get_user_share_spaces(caller.id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(spaces.into_iter().map(ShareSpaceDto::from).collect()))
}

async fn add_to_share_space(State(state): State<AppState>, Json(dto): Json<ShareSpaceMemberDto>) -> StatusCode {
    match state.repo.add_user_to_share_space(dto.user_id, dto.share_space_id, ShareSpaceRole::Member).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "cannot add user to share space");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn delete_from_share_space(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Json(dto): Json<ShareSpaceMemberDto>,
) -> StatusCode {
    match state.repo.can_user_delete_members(caller.id, dto.share_space_id).await {
        Ok(true) => {}
        _ => {
            error!(user_id = caller.id, share_space_id = dto.share_space_id, "user is not permitted to delete members");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    match state.repo.delete_user_from_share_space(dto.user_id, dto.share_space_id).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct MemberInfo {
    id: i64,
    name: String,
    email: String,
}

async fn get_share_space_members(State(state): State<AppState>, Path(share_space_id): Path<String>) -> Result<Json<Vec<MemberInfo>>, StatusCode> {
    let share_space_id = parse_id(&share_space_id)?;
    let members = state.repo.get_share_space_members(share_space_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut out = Vec::with_capacity(members.len());
    for member in members {
        if let Some(user) = get_user_by_id(&state.rpc, member.user_id).await {
            out.push(MemberInfo { id: user.id, name: user.name, email: user.email });
        }
    }

    Ok(Json(out))
}

async fn upload_file_to_share_space(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Path(share_space_id): Path<String>,
    mut multipart: Multipart,
) -> Result<StatusCode, StatusCode> {
    let share_space_id = parse_id(&share_space_id)?;

    let share_space = state
        .repo
        .get_share_space_by_id(share_space_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        if field.name() != Some("file") {
            continue;
        }

        let display_name = field.file_name().unwrap_or("file").to_string();
        let content = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let unique_name = Uuid::new_v4().to_string();
        let save_path = format!("{}/{}", share_space.home_directory, unique_name);

        #[derive(Serialize)]
        struct SaveReq {
            save_path: String,
            content: Vec<u8>,
            encryption_key: String,
        }
        let saved: bool = state
            .rpc
            .call_json(
                Q_SAVE_FILE,
                &SaveReq { save_path: save_path.clone(), content: content.to_vec(), encryption_key: share_space.crypt_key.clone() },
            )
            .await
            .unwrap_or(false);

        if !saved {
            error!("cannot save file on the disk");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }

        return state
            .repo
            .add_file_to_share_space(share_space_id, &unique_name, &display_name, &save_path, caller.id)
            .await
            .map(|_| StatusCode::CREATED)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR);
    }

    Err(StatusCode::BAD_REQUEST)
}

async fn delete_file_from_share_space(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Path((share_space_id, unique_file_name)): Path<(String, String)>,
) -> StatusCode {
    let Ok(share_space_id) = parse_id(&share_space_id) else { return StatusCode::BAD_REQUEST };

    let Ok(Some(file)) = state.repo.get_file_from_share_space(share_space_id, &unique_file_name).await else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    if file.owner_id != caller.id {
        let can_delete = state.repo.can_user_delete_members(caller.id, share_space_id).await.unwrap_or(false);
        if !can_delete {
            error!(user_id = caller.id, share_space_id, "user is not permitted to delete a file from the share space");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    #[derive(Serialize)]
    struct DeleteReq {
        file_path: String,
    }
    let deleted: bool = state.rpc.call_json(Q_DELETE_FILE, &DeleteReq { file_path: file.path.clone() }).await.unwrap_or(false);

    if !deleted {
        error!("cannot delete file from disk");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    match state.repo.delete_file_from_share_space(share_space_id, &unique_file_name).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ShareSpaceFileDto {
    id: i64,
    unique_name: String,
    name: String,
    owner_id: i64,
}

async fn get_files_from_share_space(State(state): State<AppState>, Path(share_space_id): Path<String>) -> Result<Json<Vec<ShareSpaceFileDto>>, StatusCode> {
    let share_space_id = parse_id(&share_space_id)?;
    let files = state.repo.get_files_from_share_space(share_space_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(
        files
            .into_iter()
            .map(|f| ShareSpaceFileDto { id: f.id, unique_name: f.unique_name, name: f.display_name, owner_id: f.owner_id })
            .collect(),
    ))
}

async fn download_file_from_share_space(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<User>,
    Path((share_space_id, unique_file_name)): Path<(String, String)>,
) -> Result<Vec<u8>, StatusCode> {
    let share_space_id = parse_id(&share_space_id)?;

    let is_member = state.repo.get_share_space_member(caller.id, share_space_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?.is_some();
    if !is_member {
        error!(user_id = caller.id, share_space_id, "user is not a member of the share space");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let file = state
        .repo
        .get_file_from_share_space(share_space_id, &unique_file_name)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let share_space = state.repo.get_share_space_by_id(share_space_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?.ok_or(StatusCode::NOT_FOUND)?;

    #[derive(Serialize)]
    struct ReadFileReq {
        read_path: String,
        decryption_key: String,
    }
    state
        .rpc
        .call_raw(
            Q_GET_FILE_CONTENT,
            serde_json::to_vec(&ReadFileReq { read_path: file.path, decryption_key: share_space.crypt_key }).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        )
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
