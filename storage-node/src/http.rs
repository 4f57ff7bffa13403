//! HTTP surface, §6. Grounded on
//! `original_source/storage/{routes/routes.go,controllers/fileController.go}`:
//! same four endpoints, behind the same cookie-based auth gate the Go
//! `main.go` installs as global middleware — ported here to an
//! `axum::middleware::from_fn_with_state` layer instead of a Fiber
//! `app.Use` closure.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use dfs_rpc::RpcClient;
use dfs_types::models::{FileEntry, User};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::fs_store::FsStore;
use crate::repository::FileRepository;

#[derive(Clone)]
pub struct AppState {
    pub fs: Arc<FsStore>,
    pub repo: Arc<FileRepository>,
    pub rpc: Arc<RpcClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/file", post(upload_file).get(list_files))
        .route("/api/file/{unique_name}", get(download_file).delete(delete_file))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: Next,
) -> Response {
    let Some(jwt) = jar.get("jwt").map(|c| c.value().to_string()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user: Option<User> = state
        .rpc
        .call_json("rpc_auth_get_user_data_by_jwt_queue", &jwt)
        .await
        .ok()
        .flatten();

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Serialize)]
struct FileDto {
    id: i64,
    name: String,
    unique_name: String,
}

impl From<FileEntry> for FileDto {
    fn from(f: FileEntry) -> Self {
        FileDto {
            id: f.id,
            name: f.display_name,
            unique_name: f.unique_name,
        }
    }
}

/// A gateway replicating a write carries the master-assigned `unique_name`
/// in this header so every replica stores the same ciphertext under the
/// same name and path, instead of each node minting its own.
const UNIQUE_NAME_HEADER: &str = "x-unique-name";

async fn upload_file(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<User>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<FileDto>, StatusCode> {
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        if field.name() != Some("file") {
            continue;
        }

        let display_name = field.file_name().unwrap_or("file").to_string();
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let unique_name = headers
            .get(UNIQUE_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let path = format!("{}/{}", user.home_directory, unique_name);

        state
            .fs
            .encrypt_and_save(&path, &bytes, &user.crypt_key)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let id = state
            .repo
            .create_file(&unique_name, &display_name, user.id)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        return Ok(Json(FileDto {
            id,
            name: display_name,
            unique_name,
        }));
    }

    Err(StatusCode::BAD_REQUEST)
}

async fn list_files(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<User>,
) -> Result<Json<Vec<FileDto>>, StatusCode> {
    let files = state
        .repo
        .list_owned_files(user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(files.into_iter().map(FileDto::from).collect()))
}

async fn download_file(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<User>,
    Path(unique_name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    let entry = state
        .repo
        .get_owned_file_by_unique_name(&unique_name, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let path = format!("{}/{}", user.home_directory, entry.unique_name);
    state
        .fs
        .decrypt_and_read(&path, &user.crypt_key)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn delete_file(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<User>,
    Path(unique_name): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let entry = state
        .repo
        .get_owned_file_by_unique_name(&unique_name, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let path = format!("{}/{}", user.home_directory, entry.unique_name);
    state
        .fs
        .remove(&path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state
        .repo
        .delete_file(&unique_name)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(StatusCode::NO_CONTENT)
}
