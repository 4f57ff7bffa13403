//! HTTP surface: the gateway is a drop-in proxy for the storage node's
//! `/api/file...` routes (§6: "Gateway service: same storage surface as the
//! storage node"). Requests are forwarded to a node picked by the same
//! routing table as the AMQP surface (master round-robin + async fan-out
//! for writes, single round-robin for reads, §4.D) rather than reimplemented
//! gateway-side, since file metadata lives in each node's own database.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::registry::NodeRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/file", post(upload_file).get(list_files))
        .route("/api/file/{unique_name}", get(download_file).delete(delete_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn node_base_url(node: &dfs_types::models::Node) -> String {
    format!("http://{}:{}", node.ip_address, node.port)
}

fn forward_headers(headers: &HeaderMap) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::new();
    for (name, value) in headers {
        if name == header::HOST {
            continue;
        }
        if let Ok(value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
            out.insert(name.as_str(), value);
        }
    }
    out
}

async fn proxy_response(resp: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = resp.bytes().await.unwrap_or_default();
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// The subset of storage-node's upload response this proxy needs: the
/// master-assigned `unique_name`, so replicas can be told to store the same
/// bytes under the same name instead of minting their own.
#[derive(serde::Deserialize)]
struct UploadedFile {
    unique_name: String,
}

async fn upload_file(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Ok(master) = state.registry.pick_round_robin() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let url = format!("{}/api/file", node_base_url(&master));
    let result = state
        .http
        .post(&url)
        .headers(forward_headers(&headers))
        .body(body.clone())
        .send()
        .await;

    let Ok(resp) = result else {
        return StatusCode::BAD_GATEWAY.into_response();
    };
    let ok = resp.status().is_success();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let response_bytes = resp.bytes().await.unwrap_or_default();

    if ok {
        match serde_json::from_slice::<UploadedFile>(&response_bytes) {
            Ok(uploaded) => {
                let mut replica_headers = forward_headers(&headers);
                if let Ok(value) = reqwest::header::HeaderValue::from_str(&uploaded.unique_name) {
                    replica_headers.insert("x-unique-name", value);
                }
                fan_out(state, master.uuid, "/api/file".into(), replica_headers, body, reqwest::Method::POST);
            }
            Err(e) => warn!(error = %e, "master upload response missing unique_name, skipping replica fan-out"),
        }
    }

    (status, [(header::CONTENT_TYPE, content_type)], response_bytes).into_response()
}

async fn list_files(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Ok(node) = state.registry.pick_round_robin() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    match state
        .http
        .get(format!("{}/api/file", node_base_url(&node)))
        .headers(forward_headers(&headers))
        .send()
        .await
    {
        Ok(resp) => proxy_response(resp).await,
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn download_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(unique_name): Path<String>,
) -> Response {
    let Ok(node) = state.registry.pick_round_robin() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    match state
        .http
        .get(format!("{}/api/file/{unique_name}", node_base_url(&node)))
        .headers(forward_headers(&headers))
        .send()
        .await
    {
        Ok(resp) => proxy_response(resp).await,
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(unique_name): Path<String>,
) -> Response {
    let Ok(master) = state.registry.pick_round_robin() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let path = format!("/api/file/{unique_name}");
    let result = state
        .http
        .delete(format!("{}{path}", node_base_url(&master)))
        .headers(forward_headers(&headers))
        .send()
        .await;

    let Ok(resp) = result else {
        return StatusCode::BAD_GATEWAY.into_response();
    };
    let ok = resp.status().is_success();
    let rendered = proxy_response(resp).await;

    if ok {
        fan_out(state, master.uuid, path, forward_headers(&headers), Bytes::new(), reqwest::Method::DELETE);
    }

    rendered
}

/// Best-effort replica fan-out for writes: logged on failure, never
/// surfaced to the client (§4.D replication policy). `method` is the
/// caller's actual HTTP method — never inferred from `path`/`body` shape,
/// since an empty-body upload and a delete are otherwise indistinguishable.
fn fan_out(
    state: AppState,
    master_uuid: uuid::Uuid,
    path: String,
    headers: reqwest::header::HeaderMap,
    body: Bytes,
    method: reqwest::Method,
) {
    let replicas: Vec<_> = state
        .registry
        .snapshot()
        .into_iter()
        .filter(|n| n.uuid != master_uuid)
        .collect();

    for node in replicas {
        let url = format!("{}{path}", node_base_url(&node));
        let client = state.http.clone();
        let headers = headers.clone();
        let body = body.clone();
        let method = method.clone();
        tokio::spawn(async move {
            match client.request(method, &url).headers(headers).body(body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(%url, status = %resp.status(), "replica fan-out returned an error"),
                Err(e) => warn!(%url, error = %e, "replica fan-out request failed"),
            }
        });
    }
}
