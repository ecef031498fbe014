//! HTTP facade exposing the session store to phones and polling clients

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};
use crate::lifecycle::spawn_sweeper;
use crate::session_store::{SessionStore, StoreStats};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::mapper::format_scale;
use shared::{
    Axis, LatestResponse, MotionConfig, MotionSample, ReadState, ScaleReading, StartResponse,
    StopResponse, UpdateRequest, UpdateResponse, CENTER_AXIS,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// State shared by every request handler
///
/// Cloned into each request by axum. The store sits behind a single
/// `RwLock`: polls take the read half, while session creation, updates and
/// the sweeper take the write half. The clock is injected so that expiry can
/// be driven by hand in tests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<SessionStore>>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates an empty store configured from `config.store`.
    pub fn new(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(RwLock::new(SessionStore::new(config.store.clone()))),
            clock,
            config: Arc::new(config),
        }
    }

    /// Filtered estimate of a session still within the read TTL.
    ///
    /// Returns `None` for malformed, unknown and stale tokens alike; the
    /// polling endpoints turn that into the center value. Malformed tokens
    /// never touch the lock.
    async fn fresh_reading(&self, token: &str) -> Option<MotionSample> {
        if !self.config.store.tokens.is_well_formed(token) {
            debug!("Read of malformed token {:?} degraded to center", token);
            return None;
        }

        let now = self.clock.now_millis();
        let store = self.store.read().await;
        let session = store.get(token);

        match ReadState::classify(session.map(|s| s.age(now)), self.config.read_ttl_ms) {
            ReadState::Fresh => session.map(|s| s.filtered()),
            state => {
                debug!("Read of {} degraded to center ({:?})", token, state);
                None
            }
        }
    }
}

/// Payload of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: StoreStats,
    pub read_ttl_ms: u64,
    pub session_ttl_ms: u64,
    pub sweep_interval_ms: u64,
    pub motion: MotionConfig,
}

/// Builds the router with CORS and no-cache headers on every response.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/start", post(start_session))
        .route("/update", post(update_json).get(update_query))
        .route("/stop/:token", post(stop_session))
        .route("/simple/:token", get(read_scale))
        .route("/x/:token", get(read_x))
        .route("/y/:token", get(read_y))
        .route("/latest/:token", get(read_latest))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `POST /start`: pairs a new phone and returns its token.
///
/// Fails with 503 when the table is full of live sessions, or with 500 when
/// no unused token could be drawn.
async fn start_session(State(state): State<AppState>) -> Result<Json<StartResponse>> {
    let now = state.clock.now_millis();
    let token = state.store.write().await.create(now).map_err(|e| {
        warn!("Session creation failed: {}", e);
        e
    })?;
    Ok(Json(StartResponse { ok: true, token }))
}

/// `POST /update` with a JSON body.
///
/// A body that does not deserialize is reported as invalid motion data
/// rather than axum's default rejection, so every client sees the same
/// error shape.
async fn update_json(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected update body: {}", e);
        BridgeError::InvalidMotionData
    })?;
    apply_update(&state, request).await
}

/// `GET /update?token=..&x=..&y=..` for clients that cannot send a body.
async fn update_query(
    State(state): State<AppState>,
    payload: std::result::Result<Query<UpdateRequest>, QueryRejection>,
) -> Result<Json<UpdateResponse>> {
    let Query(request) = payload.map_err(|e| {
        warn!("Rejected update query: {}", e);
        BridgeError::InvalidMotionData
    })?;
    apply_update(&state, request).await
}

/// Validates the sample, then feeds it through the session's filter.
///
/// x and y are checked before the token so a malformed sample for an unknown
/// session is reported as 400 rather than 404. Debounced updates still
/// return `ok: true` with `throttled` set and the unchanged estimate.
async fn apply_update(state: &AppState, request: UpdateRequest) -> Result<Json<UpdateResponse>> {
    let (x, y) = match (request.x.to_finite(), request.y.to_finite()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            warn!("Non-numeric motion data for {}", request.token);
            return Err(BridgeError::InvalidMotionData);
        }
    };

    let now = state.clock.now_millis();
    let outcome = state
        .store
        .write()
        .await
        .update(&request.token, x, y, now)
        .map_err(|e| {
            warn!("Update for {} rejected: {}", request.token, e);
            e
        })?;

    Ok(Json(UpdateResponse {
        ok: true,
        throttled: outcome.throttled,
        x: outcome.filtered.x,
        y: outcome.filtered.y,
        updates: outcome.update_count,
    }))
}

/// `POST /stop/{token}`: always succeeds; `removed` tells whether the
/// session existed.
async fn stop_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<StopResponse> {
    let removed = state.store.write().await.remove(&token);
    Json(StopResponse { ok: true, removed })
}

/// `GET /simple/{token}`: the `X##Y##` text PictoBlox polls.
///
/// Never fails. Unknown, stale or corrupted sessions read as the center.
async fn read_scale(State(state): State<AppState>, Path(token): Path<String>) -> String {
    let reading = match state.fresh_reading(&token).await {
        Some(sample) => state.config.mapping.scale_reading(sample),
        None => ScaleReading::center(),
    };
    format_scale(reading)
}

/// Shared body of `GET /x` and `GET /y`: one clamped integer as plain text.
async fn read_axis(state: &AppState, token: &str, axis: Axis) -> String {
    let value = match state.fresh_reading(token).await {
        Some(sample) => state.config.mapping.axis_reading(sample, axis),
        None => CENTER_AXIS,
    };
    value.to_string()
}

async fn read_x(State(state): State<AppState>, Path(token): Path<String>) -> String {
    read_axis(&state, &token, Axis::X).await
}

async fn read_y(State(state): State<AppState>, Path(token): Path<String>) -> String {
    read_axis(&state, &token, Axis::Y).await
}

/// `GET /latest/{token}`: JSON diagnostics for one fresh session.
///
/// Unlike the polling endpoints this one reports 404 for malformed, unknown
/// and stale tokens, so a debugging client can tell them from a centered
/// phone.
async fn read_latest(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<LatestResponse>> {
    if !state.config.store.tokens.is_well_formed(&token) {
        return Err(BridgeError::InvalidToken);
    }

    let now = state.clock.now_millis();
    let store = state.store.read().await;
    let session = store
        .get_fresh(&token, state.config.read_ttl_ms, now)
        .ok_or(BridgeError::InvalidToken)?;

    let filtered = session.filtered();
    Ok(Json(LatestResponse {
        x: filtered.x,
        y: filtered.y,
        raw: session.last_raw,
        updates: session.update_count,
        throttled: session.throttled_count,
        window: session.history_len(),
        age_ms: session.age(now),
    }))
}

/// `GET /health`: table statistics plus the effective configuration.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = state.clock.now_millis();
    let sessions = state.store.read().await.stats(now, state.config.read_ttl_ms);
    Json(HealthResponse {
        status: "ok",
        sessions,
        read_ttl_ms: state.config.read_ttl_ms,
        session_ttl_ms: state.config.sweep.session_ttl.as_millis() as u64,
        sweep_interval_ms: state.config.sweep.interval.as_millis() as u64,
        motion: state.config.motion(),
    })
}

/// Bound HTTP server plus its background sweeper
///
/// Binding happens in `new` so callers learn about port conflicts before
/// anything is spawned. `run` starts the sweeper and serves until the
/// listener fails.
pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Binds to `config.bind_address()`; port 0 picks an ephemeral port.
    pub async fn new(config: ServerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let address = config.bind_address();
        let listener = TcpListener::bind(&address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            state: AppState::new(config, clock),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until the listener fails.
    ///
    /// The sweeper is aborted when serving stops, so a failed server does not
    /// leave a task mutating a table nobody reads.
    pub async fn run(self) -> Result<()> {
        let sweeper = spawn_sweeper(
            Arc::clone(&self.state.store),
            Arc::clone(&self.state.clock),
            self.state.config.sweep,
        );

        info!("Server started successfully");
        let result = axum::serve(self.listener, router(self.state)).await;
        sweeper.abort();

        result.map_err(|e| {
            error!("HTTP server stopped: {}", e);
            BridgeError::Io(e)
        })
    }
}
