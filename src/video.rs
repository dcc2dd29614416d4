//! Upstream payload shapes and the normalized `VideoSummary` handed to callers.
//!
//! Search, trending and detail responses differ only in which optional parts
//! (`contentDetails`, `statistics`) were requested, so a single
//! [`summarize`] routine handles all three.

use serde::{Deserialize, Serialize};
use url::Url;

const VIDEO_ID_LEN: usize = 11;

/// One video as returned to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_caption: Option<bool>,
}

/// Which optional resource parts an upstream call asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailParts {
    pub content_details: bool,
    pub statistics: bool,
}

impl DetailParts {
    pub const SNIPPET_ONLY: Self = Self {
        content_details: false,
        statistics: false,
    };
    pub const FULL: Self = Self {
        content_details: true,
        statistics: true,
    };

    /// Value of the upstream `part` query parameter.
    pub fn part_param(self) -> String {
        let mut parts = vec!["snippet"];
        if self.content_details {
            parts.push("contentDetails");
        }
        if self.statistics {
            parts.push("statistics");
        }
        parts.join(",")
    }
}

/// Envelope shared by `/search` and `/videos`.
#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: Option<ItemId>,
    #[serde(default)]
    pub snippet: Snippet,
    pub content_details: Option<ContentDetails>,
    pub statistics: Option<Statistics>,
}

impl VideoItem {
    /// Uses `id` when the payload carries no usable video id.
    pub fn or_id(mut self, id: &str) -> Self {
        let missing = self
            .id
            .as_ref()
            .and_then(ItemId::video_id)
            .is_none_or(|value| value.trim().is_empty());
        if missing {
            self.id = Some(ItemId::Plain(id.to_string()));
        }
        self
    }
}

/// `/videos` returns the id as a string, `/search` wraps it in a resource
/// object (`{"kind": "youtube#video", "videoId": "..."}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Plain(String),
    Resource {
        #[serde(rename = "videoId")]
        video_id: Option<String>,
    },
}

impl ItemId {
    fn video_id(&self) -> Option<&str> {
        match self {
            ItemId::Plain(id) => Some(id),
            ItemId::Resource { video_id } => video_id.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snippet {
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: String,
    pub thumbnails: Thumbnails,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub maxres: Option<Thumbnail>,
    pub standard: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: Option<String>,
}

impl Thumbnails {
    /// Highest resolution first: maxres, standard, high, medium, default.
    pub fn best_url(&self) -> Option<&str> {
        [
            &self.maxres,
            &self.standard,
            &self.high,
            &self.medium,
            &self.default,
        ]
        .into_iter()
        .filter_map(|tier| tier.as_ref()?.url.as_deref())
        .find(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContentDetails {
    pub duration: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    pub view_count: Option<Count>,
}

// Counts arrive as decimal strings from the Data API.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Text(String),
    Number(u64),
}

impl Count {
    fn value(&self) -> Option<u64> {
        match self {
            Count::Text(text) => text.trim().parse().ok(),
            Count::Number(value) => Some(*value),
        }
    }
}

/// Normalizes one upstream item. Items without a usable video id (channels
/// or playlists slipping through a search) yield `None`.
pub fn summarize(item: VideoItem, parts: DetailParts) -> Option<VideoSummary> {
    let id = item
        .id
        .as_ref()
        .and_then(ItemId::video_id)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let thumbnail_url = item
        .snippet
        .thumbnails
        .best_url()
        .map(str::to_string)
        .unwrap_or_else(|| fallback_thumbnail(&id));

    let content = item.content_details.unwrap_or_default();
    let (duration, has_caption) = if parts.content_details {
        (
            content.duration.filter(|value| !value.is_empty()),
            Some(content.caption.as_deref() == Some("true")),
        )
    } else {
        (None, None)
    };

    let (view_count, tags) = if parts.statistics {
        let views = item
            .statistics
            .as_ref()
            .and_then(|stats| stats.view_count.as_ref())
            .and_then(Count::value)
            .unwrap_or(0);
        (Some(views), Some(item.snippet.tags.unwrap_or_default()))
    } else {
        (None, None)
    };

    Some(VideoSummary {
        id,
        title: item.snippet.title,
        description: item.snippet.description,
        thumbnail_url,
        channel_title: item.snippet.channel_title,
        published_at: item.snippet.published_at,
        duration,
        view_count,
        tags,
        has_caption,
    })
}

pub fn summarize_all(response: ListResponse, parts: DetailParts) -> Vec<VideoSummary> {
    response
        .items
        .into_iter()
        .filter_map(|item| summarize(item, parts))
        .collect()
}

fn fallback_thumbnail(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/hqdefault.jpg")
}

pub fn is_video_id(value: &str) -> bool {
    value.len() == VIDEO_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Pulls the 11-character video id out of a YouTube URL. A bare id is
/// returned as is.
pub fn extract_video_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if is_video_id(trimmed) {
        return Some(trimmed.to_string());
    }

    let url = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(host.as_str());
    let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "v" | "e" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> VideoItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn prefers_highest_thumbnail() {
        let summary = summarize(
            item(json!({
                "id": "abc",
                "snippet": {
                    "title": "t",
                    "thumbnails": {
                        "default": {"url": "d.jpg"},
                        "medium": {"url": "m.jpg"},
                        "high": {"url": "h.jpg"},
                        "maxres": {"url": "x.jpg"}
                    }
                }
            })),
            DetailParts::SNIPPET_ONLY,
        )
        .unwrap();
        assert_eq!(summary.thumbnail_url, "x.jpg");
    }

    #[test]
    fn thumbnail_falls_back_medium_then_default() {
        let medium = summarize(
            item(json!({
                "id": "abc",
                "snippet": {"thumbnails": {"default": {"url": "d.jpg"}, "medium": {"url": "m.jpg"}}}
            })),
            DetailParts::SNIPPET_ONLY,
        )
        .unwrap();
        assert_eq!(medium.thumbnail_url, "m.jpg");

        let default = summarize(
            item(json!({
                "id": "abc",
                "snippet": {"thumbnails": {"default": {"url": "d.jpg"}}}
            })),
            DetailParts::SNIPPET_ONLY,
        )
        .unwrap();
        assert_eq!(default.thumbnail_url, "d.jpg");
    }

    #[test]
    fn missing_thumbnails_use_static_url() {
        let summary = summarize(item(json!({"id": "abc"})), DetailParts::SNIPPET_ONLY).unwrap();
        assert_eq!(
            summary.thumbnail_url,
            "https://img.youtube.com/vi/abc/hqdefault.jpg"
        );
    }

    #[test]
    fn search_items_have_no_detail_fields() {
        let summary = summarize(
            item(json!({
                "id": {"kind": "youtube#video", "videoId": "vid123"},
                "snippet": {
                    "title": "Cats",
                    "description": "purr",
                    "channelTitle": "Cat TV",
                    "publishedAt": "2024-01-01T00:00:00Z",
                    "tags": ["ignored"]
                },
                "contentDetails": {"duration": "PT1M"}
            })),
            DetailParts::SNIPPET_ONLY,
        )
        .unwrap();
        assert_eq!(summary.id, "vid123");
        assert_eq!(summary.channel_title, "Cat TV");
        assert!(summary.duration.is_none());
        assert!(summary.view_count.is_none());
        assert!(summary.tags.is_none());
        assert!(summary.has_caption.is_none());
    }

    #[test]
    fn full_items_carry_details_and_statistics() {
        let summary = summarize(
            item(json!({
                "id": "vid123",
                "snippet": {"title": "Cats", "tags": ["cat", "funny"]},
                "contentDetails": {"duration": "PT4M13S", "caption": "true"},
                "statistics": {"viewCount": "12345"}
            })),
            DetailParts::FULL,
        )
        .unwrap();
        assert_eq!(summary.duration.as_deref(), Some("PT4M13S"));
        assert_eq!(summary.view_count, Some(12345));
        assert_eq!(summary.tags, Some(vec!["cat".into(), "funny".into()]));
        assert_eq!(summary.has_caption, Some(true));
    }

    #[test]
    fn full_items_default_missing_statistics() {
        let summary = summarize(
            item(json!({"id": "vid123", "snippet": {"title": "Cats"}})),
            DetailParts::FULL,
        )
        .unwrap();
        assert_eq!(summary.view_count, Some(0));
        assert_eq!(summary.tags, Some(Vec::new()));
        assert_eq!(summary.has_caption, Some(false));
        assert!(summary.duration.is_none());
    }

    #[test]
    fn items_without_video_id_are_skipped() {
        let response: ListResponse = serde_json::from_value(json!({
            "items": [
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                {"id": {"kind": "youtube#video", "videoId": "vid123"}}
            ]
        }))
        .unwrap();
        let summaries = summarize_all(response, DetailParts::SNIPPET_ONLY);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "vid123");
    }

    #[test]
    fn or_id_fills_only_missing_ids() {
        let filled = item(json!({"id": {"kind": "youtube#video"}})).or_id("fallback001");
        assert_eq!(summarize(filled, DetailParts::FULL).unwrap().id, "fallback001");

        let kept = item(json!({"id": "original001"})).or_id("fallback001");
        assert_eq!(summarize(kept, DetailParts::FULL).unwrap().id, "original001");
    }

    #[test]
    fn missing_items_decode_as_empty() {
        let response: ListResponse = serde_json::from_value(json!({"kind": "x"})).unwrap();
        assert!(summarize_all(response, DetailParts::FULL).is_empty());
    }

    #[test]
    fn part_param_lists_requested_parts() {
        assert_eq!(DetailParts::SNIPPET_ONLY.part_param(), "snippet");
        assert_eq!(
            DetailParts::FULL.part_param(),
            "snippet,contentDetails,statistics"
        );
    }

    #[test]
    fn summary_serializes_camel_case_without_absent_fields() {
        let summary = summarize(item(json!({"id": "abc"})), DetailParts::SNIPPET_ONLY).unwrap();
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("thumbnailUrl").is_some());
        assert!(value.get("channelTitle").is_some());
        assert!(value.get("viewCount").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn extract_video_id_handles_common_urls() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "youtube.com/v/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ];
        for case in cases {
            assert_eq!(
                extract_video_id(case).as_deref(),
                Some("dQw4w9WgXcQ"),
                "{case}"
            );
        }
    }

    #[test]
    fn extract_video_id_rejects_other_urls() {
        assert!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ").is_none());
        assert!(extract_video_id("https://www.youtube.com/watch?v=short").is_none());
        assert!(extract_video_id("https://www.youtube.com/channel/UC123").is_none());
        assert!(extract_video_id("").is_none());
    }
}
