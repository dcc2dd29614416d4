//! `VideoLookupService`: validate, consult the cache, fetch on miss,
//! normalize, store.
//!
//! Concurrent misses on the same key may both reach upstream; the last write
//! wins. Nothing here retries.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{debug, warn};

use crate::{
    cache::{CacheEntry, CachedValue, Clock, LookupCache, SystemClock},
    config::DEFAULT_CACHE_TTL_SECS,
    error::{LookupError, VIDEO_NOT_FOUND},
    upstream::{UpstreamRequest, VideoApi},
    video::{DetailParts, ListResponse, VideoSummary, summarize, summarize_all},
};

pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const MAX_RESULTS_LIMIT: u32 = 50;
pub const DEFAULT_REGION: &str = "US";

pub fn search_key(query: &str, max_results: u32) -> String {
    format!("search:{query}:{max_results}")
}

pub fn trending_key(region: &str, max_results: u32) -> String {
    format!("trending:{region}:{max_results}")
}

pub fn video_key(video_id: &str) -> String {
    format!("video:{video_id}")
}

/// Missing or zero means the default; anything above the upstream page limit
/// is clamped to it.
pub fn normalize_max_results(max_results: Option<u32>) -> u32 {
    match max_results {
        None | Some(0) => DEFAULT_MAX_RESULTS,
        Some(value) => value.min(MAX_RESULTS_LIMIT),
    }
}

fn normalize_region(region: Option<&str>) -> String {
    region
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

pub struct VideoLookupService {
    api: Arc<dyn VideoApi>,
    cache: Arc<dyn LookupCache>,
    clock: Arc<dyn Clock>,
    api_key: Option<String>,
    ttl: TimeDelta,
}

impl VideoLookupService {
    pub fn new(
        api: Arc<dyn VideoApi>,
        cache: Arc<dyn LookupCache>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            api,
            cache,
            clock: Arc::new(SystemClock),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            ttl: TimeDelta::seconds(DEFAULT_CACHE_TTL_SECS as i64),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search_videos(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<Vec<VideoSummary>, LookupError> {
        let api_key = self.api_key()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::invalid_request("Query parameter is required"));
        }
        let max_results = normalize_max_results(max_results);
        let key = search_key(query, max_results);

        if let Some(CachedValue::Videos(videos)) = self.cached(&key) {
            return Ok(videos);
        }

        let request = UpstreamRequest::new("search")
            .param("part", DetailParts::SNIPPET_ONLY.part_param())
            .param("type", "video")
            .param("maxResults", max_results.to_string())
            .param("q", query);
        let response = self.fetch(request, api_key).await?;
        let videos = summarize_all(response, DetailParts::SNIPPET_ONLY);
        debug!(%query, found = videos.len(), "search complete");

        self.store(key, CachedValue::Videos(videos.clone()));
        Ok(videos)
    }

    pub async fn get_trending_videos(
        &self,
        max_results: Option<u32>,
        region: Option<&str>,
    ) -> Result<Vec<VideoSummary>, LookupError> {
        let api_key = self.api_key()?;
        let max_results = normalize_max_results(max_results);
        let region = normalize_region(region);
        let key = trending_key(&region, max_results);

        if let Some(CachedValue::Videos(videos)) = self.cached(&key) {
            return Ok(videos);
        }

        let request = UpstreamRequest::new("videos")
            .param("part", DetailParts::FULL.part_param())
            .param("chart", "mostPopular")
            .param("regionCode", region.as_str())
            .param("maxResults", max_results.to_string());
        let response = self.fetch(request, api_key).await?;
        let videos = summarize_all(response, DetailParts::FULL);
        debug!(%region, found = videos.len(), "trending complete");

        self.store(key, CachedValue::Videos(videos.clone()));
        Ok(videos)
    }

    pub async fn get_video_details(&self, video_id: &str) -> Result<VideoSummary, LookupError> {
        let api_key = self.api_key()?;
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(LookupError::invalid_request("Video ID is required"));
        }
        let key = video_key(video_id);

        if let Some(CachedValue::Video(video)) = self.cached(&key) {
            return Ok(video);
        }

        let request = UpstreamRequest::new("videos")
            .param("part", DetailParts::FULL.part_param())
            .param("id", video_id);
        let response = self.fetch(request, api_key).await?;
        let video = response
            .items
            .into_iter()
            .next()
            .and_then(|item| summarize(item.or_id(video_id), DetailParts::FULL))
            .ok_or_else(|| LookupError::NotFound(VIDEO_NOT_FOUND.to_string()))?;

        self.store(key, CachedValue::Video(video.clone()));
        Ok(video)
    }

    fn api_key(&self) -> Result<&str, LookupError> {
        self.api_key.as_deref().ok_or(LookupError::Configuration)
    }

    /// Returns the cached value only while it is fresh. An entry of the wrong
    /// shape for its key is treated like a miss by the callers' pattern.
    fn cached(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now();
        match self.cache.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                debug!(cache_key = key, "cache hit");
                Some(entry.value)
            }
            Some(_) => {
                debug!(cache_key = key, "cache entry expired");
                None
            }
            None => {
                debug!(cache_key = key, "cache miss");
                None
            }
        }
    }

    fn store(&self, key: String, value: CachedValue) {
        self.cache.set(key, CacheEntry::new(value, self.clock.now()));
    }

    async fn fetch(
        &self,
        request: UpstreamRequest,
        api_key: &str,
    ) -> Result<ListResponse, LookupError> {
        let api = Arc::clone(&self.api);
        let api_key = api_key.to_string();
        let resource = request.resource;
        let result = tokio::task::spawn_blocking(move || api.fetch(&request, &api_key))
            .await
            .map_err(|err| LookupError::unreachable(format!("upstream task failed: {err}")))?;

        if let Err(err) = &result {
            warn!(
                resource,
                status = ?err.upstream_status(),
                error = %err,
                "upstream lookup failed"
            );
        }
        result
    }
}
