//! Failure taxonomy shared by every lookup operation.
//!
//! Callers branch on the variant, never on the message text. The message is
//! for humans (and for the `{"error": ...}` body the backend returns).

use serde::Deserialize;
use thiserror::Error;

pub const API_KEY_MISSING: &str = "YouTube API key is not configured; set YOUTUBE_API_KEY";
pub const VIDEO_NOT_FOUND: &str = "Video not found";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No API key was configured. Raised before any cache or network access.
    #[error("{}", API_KEY_MISSING)]
    Configuration,

    /// A required parameter was missing or blank.
    #[error("{0}")]
    InvalidRequest(String),

    /// Upstream answered with a non-2xx status.
    #[error("{message}")]
    UpstreamRejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// No response at all (DNS, connect, TLS, timeout).
    #[error("{message}")]
    UpstreamUnreachable { message: String },

    /// Single-entity lookup matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// 2xx response whose body could not be decoded.
    #[error("unexpected upstream response: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            message: message.into(),
        }
    }

    /// Builds an `UpstreamRejected` from the status line and raw body of a
    /// failed upstream response. The body is optional; anything that does not
    /// look like the Google error envelope yields the generic message.
    pub fn from_upstream_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error);

        let (message, code) = match parsed {
            Some(body) => {
                let code = body.code_token();
                (body.message.filter(|message| !message.trim().is_empty()), code)
            }
            None => (None, None),
        };

        Self::UpstreamRejected {
            status,
            code,
            message: message.unwrap_or_else(|| format!("request failed with status {status}")),
        }
    }

    /// HTTP status reported by upstream. `Some` means upstream was reachable
    /// and rejected the request; `None` covers everything else.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<ErrorCode>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

// The Data API sends a numeric `code` plus a `reason` per error; some proxies
// and older payloads send the reason token directly as `code`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorCode {
    Token(String),
    Numeric(i64),
}

#[derive(Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

impl ErrorBody {
    fn code_token(&self) -> Option<String> {
        match &self.code {
            Some(ErrorCode::Token(token)) => Some(token.clone()),
            Some(ErrorCode::Numeric(number)) => Some(
                self.first_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| number.to_string()),
            ),
            None => self.first_reason().map(str::to_string),
        }
    }

    fn first_reason(&self) -> Option<&str> {
        self.errors
            .iter()
            .filter_map(|detail| detail.reason.as_deref())
            .find(|reason| !reason.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_code_is_kept_verbatim() {
        let err = LookupError::from_upstream_response(
            403,
            r#"{"error":{"message":"quota exceeded","code":"quotaExceeded"}}"#,
        );
        assert_eq!(
            err,
            LookupError::UpstreamRejected {
                status: 403,
                code: Some("quotaExceeded".into()),
                message: "quota exceeded".into(),
            }
        );
        assert_eq!(err.upstream_status(), Some(403));
    }

    #[test]
    fn numeric_code_prefers_reason() {
        let err = LookupError::from_upstream_response(
            400,
            r#"{"error":{"code":400,"message":"API key not valid.","errors":[{"reason":"badRequest"}]}}"#,
        );
        let LookupError::UpstreamRejected { code, message, .. } = err else {
            panic!("expected rejection");
        };
        assert_eq!(code.as_deref(), Some("badRequest"));
        assert_eq!(message, "API key not valid.");
    }

    #[test]
    fn numeric_code_without_reason_is_rendered() {
        let err =
            LookupError::from_upstream_response(404, r#"{"error":{"code":404,"message":"gone"}}"#);
        let LookupError::UpstreamRejected { code, .. } = err else {
            panic!("expected rejection");
        };
        assert_eq!(code.as_deref(), Some("404"));
    }

    #[test]
    fn unparseable_body_gets_generic_message() {
        let err = LookupError::from_upstream_response(502, "<html>bad gateway</html>");
        assert_eq!(
            err,
            LookupError::UpstreamRejected {
                status: 502,
                code: None,
                message: "request failed with status 502".into(),
            }
        );
    }

    #[test]
    fn empty_message_gets_generic_message() {
        let err = LookupError::from_upstream_response(500, r#"{"error":{"message":""}}"#);
        assert_eq!(err.to_string(), "request failed with status 500");
    }

    #[test]
    fn unreachable_has_no_status() {
        let err = LookupError::unreachable("connection refused");
        assert_eq!(err.upstream_status(), None);
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn configuration_message_is_stable() {
        assert_eq!(LookupError::Configuration.to_string(), API_KEY_MISSING);
    }
}
