mod http;
mod idempotency;
mod market;
mod metrics;
mod models;
mod security;
mod sessions;
mod wizard;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use market::categories::{self, CategoryNode};
use market::listings::{
    DemoListingBackend, EditBundle, ItemImage, ListingFetchError, ListingSubmission,
    MarketListingClient, PersistedItem,
};
use market::uploads::{CompletedUpload, UploadError};
use market::watchlist::{DemoWatchlistRemote, MarketWatchlistClient};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, DraftView, SubmitResponse};
use security::{AuthContext, AuthState, require_api_auth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sessions::{SessionStore, WatchRegistry};
use std::{collections::BTreeMap, collections::HashMap, net::SocketAddr, sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;
use wizard::controller::{ListingBackend, StepWizard, SubmitError, SubmitReceipt, WizardPhase};
use wizard::draft::{AuctionInfoPatch, BasicDetailsPatch, DraftState, LogisticsPatch};
use wizard::media::ImageVariant;
use wizard::optimistic::{ToggleError, ToggleOutcome, WatchlistEntry, WatchlistRemote};

const MERCURY_USER_SCOPES: &[&str] = &[
    "https://api.mercury.market/oauth/scope/sell.listings",
    "https://api.mercury.market/oauth/scope/watchlist",
];

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "mercury.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let auth_state = AuthState::from_env();
    let network_enabled = parse_env_bool("MERCURY_ENABLE_NETWORK");
    let access_token = if network_enabled {
        match market::auth::get_session_token_from_refresh(
            &market::config::MERCURY_REFRESH_TOKEN,
            MERCURY_USER_SCOPES,
        )
        .await
        {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(target = "mercury.market", error = %err, "session_token_unavailable");
                None
            }
        }
    } else {
        None
    };

    let tree = match &access_token {
        Some(token) => match categories::fetch_category_tree(token).await {
            Ok(tree) if !tree.is_empty() => tree,
            Ok(_) => {
                warn!(target = "mercury.market", "empty category tree; using demo tree");
                categories::demo_tree()
            }
            Err(err) => {
                warn!(target = "mercury.market", error = %err, "category_tree_fallback");
                categories::demo_tree()
            }
        },
        None => categories::demo_tree(),
    };

    let listings = match &access_token {
        Some(token) => SubmitBackendKind::Remote(MarketListingClient::new(token.clone())),
        None => SubmitBackendKind::Demo(DemoListingBackend),
    };
    let watchlist = match &access_token {
        Some(token) => WatchBackendKind::Remote(MarketWatchlistClient::new(token.clone())),
        None => WatchBackendKind::Demo(DemoWatchlistRemote),
    };

    let openapi_raw = include_str!("../docs/openapi.yaml");
    let openapi: serde_json::Value =
        serde_yaml::from_str(openapi_raw).unwrap_or(serde_json::json!({"openapi":"3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prom recorder");
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|url| redis::Client::open(url).ok());

    let state = AppState {
        sessions: SessionStore::new(),
        watches: WatchRegistry::new(),
        tree: Arc::new(tree),
        listings,
        watchlist,
        access_token,
        openapi: Arc::new(openapi),
        idempotency: Arc::new(Mutex::new(HashMap::new())),
        prometheus_handle,
        redis,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/drafts", post(create_draft))
        .route("/drafts/hydrate", post(hydrate_draft))
        .route("/drafts/resume", post(resume_draft))
        .route("/drafts/{id}", get(get_draft).delete(discard_draft))
        .route("/drafts/{id}/basic", patch(patch_basic))
        .route("/drafts/{id}/auction", patch(patch_auction))
        .route("/drafts/{id}/logistics", patch(patch_logistics))
        .route("/drafts/{id}/images", post(add_image))
        .route("/drafts/{id}/images/upload", post(upload_image))
        .route("/drafts/{id}/images/order", put(reorder_images))
        .route("/drafts/{id}/images/{image_id}", delete(remove_image))
        .route("/drafts/{id}/next", post(next_step))
        .route("/drafts/{id}/back", post(back_step))
        .route("/drafts/{id}/submit", post(submit_draft))
        .route("/categories", get(get_categories))
        .route("/watchlist/{item_id}/toggle", post(toggle_watch))
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "mercury.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    sessions: SessionStore,
    watches: WatchRegistry,
    tree: Arc<Vec<CategoryNode>>,
    listings: SubmitBackendKind,
    watchlist: WatchBackendKind,
    access_token: Option<String>,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<Mutex<HashMap<String, SubmitResponse>>>,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
}

#[derive(Clone)]
enum SubmitBackendKind {
    Demo(DemoListingBackend),
    Remote(MarketListingClient),
}

impl ListingBackend for SubmitBackendKind {
    async fn create_listing(
        &self,
        payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        match self {
            SubmitBackendKind::Demo(backend) => backend.create_listing(payload).await,
            SubmitBackendKind::Remote(backend) => backend.create_listing(payload).await,
        }
    }

    async fn update_listing(
        &self,
        item_id: &str,
        payload: &ListingSubmission,
    ) -> Result<SubmitReceipt, SubmitError> {
        match self {
            SubmitBackendKind::Demo(backend) => backend.update_listing(item_id, payload).await,
            SubmitBackendKind::Remote(backend) => backend.update_listing(item_id, payload).await,
        }
    }
}

#[derive(Clone)]
enum WatchBackendKind {
    Demo(DemoWatchlistRemote),
    Remote(MarketWatchlistClient),
}

impl WatchlistRemote for WatchBackendKind {
    async fn add(&self, item_id: &str) -> Result<WatchlistEntry, ToggleError> {
        match self {
            WatchBackendKind::Demo(remote) => remote.add(item_id).await,
            WatchBackendKind::Remote(remote) => remote.add(item_id).await,
        }
    }

    async fn remove(&self, entry_id: &str) -> Result<(), ToggleError> {
        match self {
            WatchBackendKind::Demo(remote) => remote.remove(entry_id).await,
            WatchBackendKind::Remote(remote) => remote.remove(entry_id).await,
        }
    }
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mercury-api-rs",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::invalid("docs", "unauthorized"));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Mercury API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

// -------- Draft wizard endpoints --------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDraftResponse {
    draft_id: String,
    step: u8,
    phase: WizardPhase,
}

/// Start a brand-new, never-submitted draft.
async fn create_draft(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Json<CreateDraftResponse> {
    metrics::inc_requests("/drafts");
    let wizard = StepWizard::new(DraftState::new());
    let id = state.sessions.create(wizard).await;
    info!(
        target = "mercury.api",
        org_id = %context.org_id,
        api_key = %context.api_key_id,
        draft_id = %id,
        "draft session opened",
    );
    Json(CreateDraftResponse {
        draft_id: id.to_string(),
        step: 1,
        phase: WizardPhase::Step1,
    })
}

fn default_step() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HydrateRequest {
    item: PersistedItem,
    #[serde(default)]
    images: Vec<ItemImage>,
    /// Optional: when absent the tree loaded at startup is used.
    #[serde(default)]
    category_tree: Option<Vec<CategoryNode>>,
    #[serde(default = "default_step")]
    step: i32,
}

/// Edit/resume entry: the server-supplied item, image list, tree, and
/// last-saved step arrive in the body and become a fully populated draft.
async fn hydrate_draft(
    State(state): State<AppState>,
    Json(payload): Json<HydrateRequest>,
) -> Result<Json<DraftView>, AppError> {
    metrics::inc_requests("/drafts/hydrate");
    let draft = match &payload.category_tree {
        Some(tree) => DraftState::hydrate(&payload.item, &payload.images, tree, payload.step),
        None => DraftState::hydrate(&payload.item, &payload.images, &state.tree, payload.step),
    };
    let wizard = StepWizard::new(draft);
    let id = state.sessions.create(wizard).await;
    let session = state.sessions.get(id).await.expect("session just created");
    let view = DraftView::from_wizard(id, &*session.lock().await);
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeRequest {
    item_id: String,
}

/// Resume by item id: fetches the persisted draft bundle from the
/// marketplace and hydrates from it. Requires networking.
async fn resume_draft(
    State(state): State<AppState>,
    Json(payload): Json<ResumeRequest>,
) -> Result<Json<DraftView>, AppError> {
    metrics::inc_requests("/drafts/resume");
    let Some(token) = state.access_token.clone() else {
        return Err(AppError::invalid(
            "resume",
            "marketplace networking is disabled",
        ));
    };
    let EditBundle { item, images, step } =
        market::listings::fetch_item_for_edit(&payload.item_id, &token).await?;
    let draft = DraftState::hydrate(&item, &images, &state.tree, step);
    let id = state.sessions.create(StepWizard::new(draft)).await;
    let session = state.sessions.get(id).await.expect("session just created");
    let view = DraftView::from_wizard(id, &*session.lock().await);
    Ok(Json(view))
}

async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let wizard = session.lock().await;
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

#[derive(Debug, Serialize)]
struct DiscardResponse {
    discarded: bool,
}

/// Navigation-away analog: drop the in-memory draft without submitting.
async fn discard_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DiscardResponse>, AppError> {
    let (id, _) = resolve_session(&state, &id).await?;
    Ok(Json(DiscardResponse {
        discarded: state.sessions.discard(id).await,
    }))
}

async fn patch_basic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<BasicDetailsPatch>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    wizard.note_edited();
    wizard.draft.patch_basic(payload);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

async fn patch_auction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AuctionInfoPatch>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    wizard.note_edited();
    wizard.draft.patch_auction(payload);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

async fn patch_logistics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<LogisticsPatch>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    wizard.note_edited();
    wizard.draft.patch_logistics(payload);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

#[derive(Debug, Deserialize)]
struct AddImageRequest {
    id: String,
    #[serde(default)]
    variants: BTreeMap<String, String>,
}

/// Register a completed upload on the draft. The wizard only ever consumes
/// the completed-variant shape; upload progress stays with the collaborator.
async fn add_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AddImageRequest>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    if wizard.draft.images.len() >= max_images_allowed() {
        return Err(AppError::invalid("images", "too_many_images"));
    }
    // only the three fixed variant names are recognized
    let variants = payload
        .variants
        .into_iter()
        .filter(|(name, _)| ImageVariant::from_raw(name).is_some())
        .collect();
    wizard.note_edited();
    wizard.draft.add_image(payload.id, variants);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

/// Raw-bytes passthrough to the image upload collaborator. Offline the
/// variants are synthesized so the flow stays exercisable end to end.
async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DraftView>, AppError> {
    metrics::inc_requests("/drafts/images/upload");
    let (id, session) = resolve_session(&state, &id).await?;
    if body.is_empty() {
        return Err(AppError::invalid("images", "empty_image_body"));
    }
    let content_type = headers
        .get("Content-Type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let completed = match &state.access_token {
        Some(token) => market::uploads::upload_image(body.to_vec(), &content_type, token).await?,
        None => demo_upload(),
    };

    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    if wizard.draft.images.len() >= max_images_allowed() {
        return Err(AppError::invalid("images", "too_many_images"));
    }
    wizard.note_edited();
    wizard.draft.add_image(completed.id, completed.variants);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

fn demo_upload() -> CompletedUpload {
    let id = format!("img-{}", Uuid::new_v4().simple());
    let variants = [("thumbnail", 200), ("medium", 600), ("full", 1200)]
        .iter()
        .map(|(name, width)| {
            (
                name.to_string(),
                format!("https://cdn.sandbox.mercury.market/{id}/{width}.jpg"),
            )
        })
        .collect();
    CompletedUpload { id, variants }
}

async fn remove_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    if !wizard.draft.remove_image(&image_id) {
        return Err(AppError::not_found("image_not_found"));
    }
    wizard.note_edited();
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    order: Vec<String>,
}

async fn reorder_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    wizard.note_edited();
    wizard.draft.reorder_images(&payload.order);
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

/// Validate the current step and advance. Gate failures return 422 with the
/// field-keyed errors and leave the step untouched.
async fn next_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    metrics::inc_requests("/drafts/next");
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    let started = Instant::now();
    let step = wizard.draft.step();
    match wizard.next() {
        Ok(_) => {
            metrics::step_latency(step, started.elapsed().as_millis());
            Ok(Json(DraftView::from_wizard(id, &wizard)))
        }
        Err(errors) => Err(AppError::Validation(errors)),
    }
}

async fn back_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = resolve_session(&state, &id).await?;
    let mut wizard = session.lock().await;
    ensure_editable(&wizard)?;
    wizard.back();
    Ok(Json(DraftView::from_wizard(id, &wizard)))
}

/// The single create-or-update submission. Honors `Idempotency-Key`; on
/// success the session is discarded and the item id returned.
async fn submit_draft(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SubmitResponse>, AppError> {
    metrics::inc_requests("/drafts/submit");
    let (id, session) = resolve_session(&state, &id).await?;

    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if let Some(key) = &idempotency_key {
        if let Some(client) = &state.redis {
            if let Some(existing) = idempotency::redis_get(client, key).await {
                return Ok(Json(existing));
            }
        } else if let Some(existing) = state.idempotency.lock().await.get(key).cloned() {
            return Ok(Json(existing));
        }
    }

    let receipt = {
        let mut wizard = session.lock().await;
        wizard.submit(&state.listings).await?
    };
    state.sessions.discard(id).await;
    info!(
        target = "mercury.api",
        org_id = %context.org_id,
        item_id = %receipt.id,
        "draft submitted",
    );

    let response = SubmitResponse {
        item_id: receipt.id,
    };
    if let Some(key) = idempotency_key {
        if let Some(client) = &state.redis {
            let ttl = std::env::var("IDEMPOTENCY_TTL_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(3600);
            idempotency::redis_set(client, &key, &response, ttl).await;
        } else {
            state.idempotency.lock().await.insert(key, response.clone());
        }
    }
    Ok(Json(response))
}

async fn get_categories(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "categories": &*state.tree }))
}

// -------- Watchlist endpoint --------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest {
    /// Known entry id for items the page already knows are watchlisted.
    entry_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    watchlisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_id: Option<String>,
    ignored: bool,
}

async fn toggle_watch(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    payload: Option<Json<ToggleRequest>>,
) -> Result<Json<ToggleResponse>, AppError> {
    metrics::inc_requests("/watchlist/toggle");
    let seed = payload.and_then(|Json(body)| body.entry_id);
    let toggle = state.watches.get_or_create(&item_id, seed).await;

    // A toggle already awaiting its network call keeps the lock; rapid
    // repeated interaction is reported as ignored instead of queued.
    let Ok(mut toggle) = toggle.try_lock() else {
        return Ok(Json(ToggleResponse {
            watchlisted: None,
            entry_id: None,
            ignored: true,
        }));
    };

    let outcome = toggle.toggle(&state.watchlist).await?;
    Ok(Json(ToggleResponse {
        watchlisted: Some(toggle.watchlisted),
        entry_id: toggle.entry_id.clone(),
        ignored: outcome == ToggleOutcome::Ignored,
    }))
}

// -------- Shared plumbing --------

async fn resolve_session(
    state: &AppState,
    raw_id: &str,
) -> Result<(Uuid, Arc<Mutex<StepWizard>>), AppError> {
    let Ok(id) = Uuid::parse_str(raw_id) else {
        return Err(AppError::invalid("drafts", "invalid_draft_id"));
    };
    match state.sessions.get(id).await {
        Some(session) => Ok((id, session)),
        None => Err(AppError::not_found("draft_not_found")),
    }
}

fn ensure_editable(wizard: &StepWizard) -> Result<(), AppError> {
    match wizard.phase() {
        WizardPhase::Submitting => Err(AppError::Submit(SubmitError::InFlight)),
        WizardPhase::Success => Err(AppError::Submit(SubmitError::AlreadySubmitted)),
        _ => Ok(()),
    }
}

#[derive(Debug)]
enum AppError {
    NotFound(&'static str),
    Invalid {
        code: &'static str,
        detail: String,
    },
    Validation(BTreeMap<String, String>),
    Submit(SubmitError),
    Upload(UploadError),
    Toggle(ToggleError),
    Fetch(ListingFetchError),
}

impl AppError {
    fn invalid(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            detail: detail.into(),
        }
    }

    fn not_found(code: &'static str) -> Self {
        Self::NotFound(code)
    }
}

impl From<SubmitError> for AppError {
    fn from(value: SubmitError) -> Self {
        Self::Submit(value)
    }
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        Self::Upload(value)
    }
}

impl From<ToggleError> for AppError {
    fn from(value: ToggleError) -> Self {
        Self::Toggle(value)
    }
}

impl From<ListingFetchError> for AppError {
    fn from(value: ListingFetchError) -> Self {
        Self::Fetch(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::NotFound(code) => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: code.to_string(),
                    detail: None,
                    fields: None,
                },
            ),
            AppError::Invalid { code, detail } => {
                (StatusCode::BAD_REQUEST, ApiError::new(code, detail))
            }
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError {
                    error: "validation_failed".to_string(),
                    detail: None,
                    fields: Some(fields),
                },
            ),
            AppError::Submit(err) => match err {
                SubmitError::Rejected { fields } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ApiError {
                        error: "listing_rejected".to_string(),
                        detail: None,
                        fields: Some(fields),
                    },
                ),
                SubmitError::Request(detail) => (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("submission_failed", detail),
                ),
                SubmitError::InFlight | SubmitError::AlreadySubmitted | SubmitError::NotOnReview => {
                    (
                        StatusCode::CONFLICT,
                        ApiError::new("submission_conflict", err.to_string()),
                    )
                }
            },
            AppError::Upload(err) => match err {
                UploadError::Processing(detail) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ApiError::new("upload_failed", detail),
                ),
                UploadError::Request(detail) => (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("upload_failed", detail),
                ),
            },
            AppError::Toggle(err) => (
                StatusCode::BAD_GATEWAY,
                ApiError::new("watchlist_failed", err.to_string()),
            ),
            AppError::Fetch(err) => match err {
                ListingFetchError::NotFound => (
                    StatusCode::NOT_FOUND,
                    ApiError::new("item_not_found", "no draft for that item"),
                ),
                ListingFetchError::Request(detail) => (
                    StatusCode::BAD_GATEWAY,
                    ApiError::new("resume_failed", detail),
                ),
            },
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

fn parse_env_bool(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(256 * 1024)
}

fn max_images_allowed() -> usize {
    std::env::var("MAX_IMAGES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(12)
}
