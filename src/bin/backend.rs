#![forbid(unsafe_code)]

//! Axum backend in front of the cached YouTube lookup service.
//!
//! The story front end asks this process for search results, the trending
//! chart and single-video details. Every request is answered from the
//! short-lived in-memory cache when possible; misses go to the YouTube Data
//! API with the key from `YOUTUBE_API_KEY`. Failures always come back as
//! `{"error": "..."}` with a status derived from the error kind.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::TimeDelta;
use newtube_lookup::{
    cache::{Clock, MemoryCache, SystemClock},
    config::{API_KEY_VAR, LookupConfig, LookupOverrides, resolve_lookup_config},
    error::LookupError,
    lookup::VideoLookupService,
    upstream::HttpVideoApi,
    video::{VideoSummary, extract_video_id},
};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "newtube_lookup=info,backend=info";
// Upper bound for the sweep period so very long TTLs still get swept.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct BackendArgs {
    config: LookupConfig,
    listen_host: IpAddr,
}

impl BackendArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut port_override: Option<u16> = None;
        let mut host_override: Option<IpAddr> = None;
        let mut env_path: Option<PathBuf> = None;
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--port=") {
                port_override = Some(parse_port_arg(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--host=") {
                host_override = Some(parse_host_arg(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                env_path = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--port" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--port requires a value"))?;
                    port_override = Some(parse_port_arg(&value)?);
                }
                "--host" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--host requires a value"))?;
                    host_override = Some(parse_host_arg(&value)?);
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--env-file requires a value"))?;
                    env_path = Some(PathBuf::from(value));
                }
                _ => return Err(anyhow!("unknown argument: {arg}")),
            }
        }

        let config = resolve_lookup_config(LookupOverrides {
            newtube_port: port_override,
            newtube_host: None,
            env_path,
        })?;
        let listen_host = match host_override {
            Some(host) => host,
            None => parse_host_arg(&config.newtube_host)?,
        };

        Ok(Self {
            config,
            listen_host,
        })
    }
}

fn parse_port_arg(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("expected a numeric port between 0 and 65535")
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/NEWTUBE_HOST")
}

/// Shared state injected into every Axum handler.
#[derive(Clone)]
struct AppState {
    lookup: Arc<VideoLookupService>,
}

/// Query string accepted by the lookup routes. Everything arrives as text so
/// a malformed `maxResults` falls back to the default instead of failing the
/// whole request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupParams {
    query: Option<String>,
    q: Option<String>,
    max_results: Option<String>,
    region: Option<String>,
    video_id: Option<String>,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl LookupParams {
    fn text(&self) -> Option<&str> {
        non_blank(self.query.as_deref()).or_else(|| non_blank(self.q.as_deref()))
    }

    fn max_results(&self) -> Option<u32> {
        self.max_results
            .as_deref()
            .and_then(|value| value.trim().parse::<u32>().ok())
    }

    fn region(&self) -> Option<&str> {
        non_blank(self.region.as_deref())
    }

    /// `videoId` wins over `url`; a `url` that is not a YouTube video link is
    /// a client error.
    fn video_id(&self) -> ApiResult<Option<String>> {
        if let Some(id) = non_blank(self.video_id.as_deref()) {
            return Ok(Some(id.to_string()));
        }
        match non_blank(self.url.as_deref()) {
            Some(url) => extract_video_id(url)
                .map(Some)
                .ok_or_else(|| ApiError::bad_request("Invalid YouTube URL")),
            None => Ok(None),
        }
    }

    fn kind(&self) -> ApiResult<LookupKind> {
        match non_blank(self.kind.as_deref()).map(str::to_ascii_lowercase) {
            None => Ok(LookupKind::Search),
            Some(kind) => match kind.as_str() {
                "search" => Ok(LookupKind::Search),
                "trending" => Ok(LookupKind::Trending),
                "genre" => Ok(LookupKind::Genre),
                _ => Err(ApiError::bad_request(format!("Invalid lookup type: {kind}"))),
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LookupKind {
    Search,
    Trending,
    Genre,
}

/// `/api/videos` returns either a list or a single video depending on the
/// parameters.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LookupPayload {
    Many(Vec<VideoSummary>),
    One(VideoSummary),
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        let status = match &err {
            LookupError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LookupError::NotFound(_) => StatusCode::NOT_FOUND,
            LookupError::UpstreamRejected { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|status| status.is_client_error() || status.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            LookupError::Configuration
            | LookupError::UpstreamUnreachable { .. }
            | LookupError::InvalidResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let BackendArgs {
        config,
        listen_host,
    } = BackendArgs::parse()?;

    if config.api_key.is_none() {
        warn!("{API_KEY_VAR} is not set; lookups will fail until it is configured");
    }

    let cache = Arc::new(MemoryCache::new(config.cache_max_entries));
    let api = Arc::new(HttpVideoApi::new(config.api_base.clone()));
    let lookup = VideoLookupService::new(api, cache.clone(), config.api_key.clone())
        .with_ttl(config.cache_ttl());
    spawn_cache_sweeper(cache, lookup.ttl());

    let state = AppState {
        lookup: Arc::new(lookup),
    };
    let app = router(state);

    let addr = SocketAddr::new(listen_host, config.newtube_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(
        %addr,
        api_base = %config.api_base,
        cache_ttl_secs = config.cache_ttl_secs,
        "lookup server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running lookup server")?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("building log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/videos", get(lookup_videos))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/search", get(search_videos))
        .route("/api/trending", get(trending_videos))
        .fallback(endpoint_not_found)
        .with_state(state)
}

/// Expired entries are never served, so the sweep only bounds memory.
fn spawn_cache_sweeper(cache: Arc<MemoryCache>, ttl: TimeDelta) {
    let period = ttl
        .to_std()
        .unwrap_or(MAX_SWEEP_PERIOD)
        .clamp(Duration::from_secs(1), MAX_SWEEP_PERIOD);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; nothing can be stale yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired(SystemClock.now(), ttl);
            if removed > 0 {
                debug!(removed, remaining = cache.len(), "purged expired cache entries");
            }
        }
    });
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still ends the process.
    if let Err(err) = signal::ctrl_c().await {
        warn!(%err, "failed to install Ctrl+C handler");
    }
}

async fn endpoint_not_found(uri: Uri) -> ApiError {
    debug!(path = uri.path(), "unknown endpoint");
    ApiError::not_found("endpoint not found")
}

/// Combined entry point: a `videoId`/`url` selects a detail lookup, otherwise
/// `type` picks search, genre or trending.
async fn lookup_videos(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Json<LookupPayload>> {
    require_api_key(&state)?;
    if let Some(video_id) = params.video_id()? {
        let video = state.lookup.get_video_details(&video_id).await?;
        return Ok(Json(LookupPayload::One(video)));
    }

    let videos = match params.kind()? {
        LookupKind::Trending => {
            state
                .lookup
                .get_trending_videos(params.max_results(), params.region())
                .await?
        }
        kind @ (LookupKind::Search | LookupKind::Genre) => {
            let text = params.text().ok_or_else(|| {
                ApiError::bad_request("Query parameter is required for search and genre types")
            })?;
            let term = match kind {
                LookupKind::Genre => format!("{text} videos"),
                _ => text.to_string(),
            };
            state
                .lookup
                .search_videos(&term, params.max_results())
                .await?
        }
    };
    Ok(Json(LookupPayload::Many(videos)))
}

// A missing key outranks any parameter error.
fn require_api_key(state: &AppState) -> ApiResult<()> {
    if state.lookup.is_configured() {
        Ok(())
    } else {
        Err(LookupError::Configuration.into())
    }
}

async fn search_videos(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Json<Vec<VideoSummary>>> {
    require_api_key(&state)?;
    let text = params
        .text()
        .ok_or_else(|| ApiError::bad_request("Query parameter is required"))?;
    let videos = state
        .lookup
        .search_videos(text, params.max_results())
        .await?;
    Ok(Json(videos))
}

async fn trending_videos(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> ApiResult<Json<Vec<VideoSummary>>> {
    let videos = state
        .lookup
        .get_trending_videos(params.max_results(), params.region())
        .await?;
    Ok(Json(videos))
}

async fn get_video(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<VideoSummary>> {
    let video = state.lookup.get_video_details(&id).await?;
    Ok(Json(video))
}
