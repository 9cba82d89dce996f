//! HTTP routes
//!
//! | Route                      | Handler          |
//! |----------------------------|------------------|
//! | `GET /`                    | liveness text    |
//! | `GET /health`              | status summary   |
//! | `GET /api/clinics`         | full clinic list |
//! | `GET /api/clinics/search`  | filtered list    |
//! | `POST /ask`                | assistant proxy  |
//! | any other `GET`            | offline cache    |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::VERSION;
use crate::assistant::AssistantProxy;
use crate::directory::ClinicDirectory;
use crate::models::{ClinicRecord, SearchQuery};
use crate::offline::{AssetOrigin, AssetResponse, OfflineCache};

pub const ROOT_MESSAGE: &str = "✅ Backend is running. Visit /api/clinics to get clinic data.";
pub const EMPTY_PROMPT_ERROR: &str = "prompt must not be empty";

/// Static assets, served cache-first when a cache is available
pub struct AssetService {
    cache: Option<OfflineCache>,
    origin: Arc<dyn AssetOrigin>,
}

impl AssetService {
    pub fn new(cache: Option<OfflineCache>, origin: Arc<dyn AssetOrigin>) -> Self {
        Self { cache, origin }
    }

    pub async fn serve(&self, asset: &str) -> AssetResponse {
        match &self.cache {
            Some(cache) => cache.fetch(self.origin.as_ref(), asset).await,
            None => match self.origin.fetch(asset).await {
                Ok(fetched) => AssetResponse {
                    status: fetched.status,
                    status_text: fetched.status_text(),
                    content_type: fetched.content_type,
                    body: fetched.body,
                    from_cache: false,
                },
                Err(_) => AssetResponse::offline(),
            },
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub directory: ClinicDirectory,
    pub assistant: Arc<AssistantProxy>,
    pub assets: Arc<AssetService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/clinics", get(list_clinics))
        .route("/api/clinics/search", get(search_clinics))
        .route("/ask", post(ask))
        .fallback(serve_asset)
        .with_state(state)
}

async fn root() -> &'static str {
    ROOT_MESSAGE
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    clinics: usize,
    assistant: &'static str,
    version: &'static str,
}

async fn health(State(st): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        clinics: st.directory.len(),
        assistant: if st.assistant.is_enabled() {
            "enabled"
        } else {
            "disabled"
        },
        version: VERSION,
    })
}

async fn list_clinics(State(st): State<AppState>) -> Json<Arc<[ClinicRecord]>> {
    Json(st.directory.all())
}

#[instrument(skip(st))]
async fn search_clinics(
    State(st): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ClinicRecord>> {
    let results = st.directory.search(&query);
    debug!("{} of {} clinics matched", results.len(), st.directory.len());
    Json(results)
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
}

async fn ask(State(st): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    if request.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": EMPTY_PROMPT_ERROR })),
        )
            .into_response();
    }

    let answer = st.assistant.ask(&request.prompt).await;
    Json(AskResponse {
        answer: answer.answer,
    })
    .into_response()
}

async fn serve_asset(State(st): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }

    let asset = uri.path().trim_start_matches('/');
    let served = st.assets.serve(asset).await;

    let status = StatusCode::from_u16(served.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, served.body).into_response();
    if let Some(value) = served
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}
