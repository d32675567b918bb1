#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";

// 1x1 PNG
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

#[derive(Default)]
pub struct MockState {
    /// `localDateTime` handed out by the random search; `None` returns an empty list.
    pub random_date_time: Option<String>,
    /// Metadata search results, one entry per page.
    pub pages: Vec<Vec<Value>>,
    /// Assets whose original download fails with 404.
    pub missing: HashSet<String>,
    pub exif: HashMap<String, Value>,
    /// Force every metadata request to fail with this status.
    pub metadata_status: Option<StatusCode>,
    /// Hand out the same next page token forever.
    pub loop_pages: bool,
    /// Stall the random search this long before answering.
    pub random_delay: Option<Duration>,
    pub metadata_requests: Vec<Value>,
    pub downloads: Vec<String>,
    pub info_requests: Vec<String>,
}

#[derive(Clone)]
pub struct MockImmich {
    pub state: Arc<Mutex<MockState>>,
    pub addr: SocketAddr,
}

impl MockImmich {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let router = Router::new()
            .route("/api/search/random", post(random))
            .route("/api/search/metadata", post(metadata))
            .route("/api/assets/{id}", get(asset_info))
            .route("/api/assets/{id}/original", get(original))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });
        Self { state, addr }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

pub fn asset(id: &str, local_date_time: &str, file: &str, mime: &str) -> Value {
    json!({
        "id": id,
        "localDateTime": local_date_time,
        "originalFileName": file,
        "originalPath": format!("/library/{file}"),
        "originalMimeType": mime,
        "type": "IMAGE"
    })
}

type Shared = Arc<Mutex<MockState>>;

fn unauthorized(headers: &HeaderMap) -> Option<Response> {
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if key == Some(API_KEY) {
        return None;
    }
    Some(
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "message": "Invalid API key",
                "error": "Unauthorized",
                "statusCode": 401
            })),
        )
            .into_response(),
    )
}

async fn random(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(resp) = unauthorized(&headers) {
        return resp;
    }
    let size = body.get("size").and_then(Value::as_u64).unwrap_or(0) as usize;
    let delay = state.lock().unwrap().random_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let state = state.lock().unwrap();
    let assets = match &state.random_date_time {
        Some(ts) => (1..=size)
            .map(|n| json!({ "id": format!("random-{n}"), "localDateTime": ts }))
            .collect(),
        None => Vec::new(),
    };
    Json(assets).into_response()
}

async fn metadata(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(resp) = unauthorized(&headers) {
        return resp;
    }
    let mut state = state.lock().unwrap();
    state.metadata_requests.push(body.clone());
    if let Some(status) = state.metadata_status {
        return (status, Json(json!({"message": "boom", "statusCode": status.as_u16()})))
            .into_response();
    }
    let page = body.get("page").and_then(Value::as_u64).unwrap_or(1) as usize;
    let items = state.pages.get(page - 1).cloned().unwrap_or_default();
    let next = if state.loop_pages {
        json!("2")
    } else if page < state.pages.len() {
        json!((page + 1).to_string())
    } else {
        Value::Null
    };
    Json(json!({
        "albums": {"items": [], "nextPage": null},
        "assets": {
            "total": items.len(),
            "count": items.len(),
            "items": items,
            "nextPage": next
        }
    }))
    .into_response()
}

async fn asset_info(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(resp) = unauthorized(&headers) {
        return resp;
    }
    let mut state = state.lock().unwrap();
    state.info_requests.push(id.clone());
    let exif = state.exif.get(&id).cloned().unwrap_or_else(|| json!({}));
    Json(json!({ "id": id, "exifInfo": exif })).into_response()
}

async fn original(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(resp) = unauthorized(&headers) {
        return resp;
    }
    let mut state = state.lock().unwrap();
    state.downloads.push(id.clone());
    if state.missing.contains(&id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Asset not found", "statusCode": 404})),
        )
            .into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], PNG.to_vec()).into_response()
}
