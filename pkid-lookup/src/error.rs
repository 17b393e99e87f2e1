//! Error types for pkid-lookup
//!
//! One request to the membership API either succeeds, fails at the network
//! level ([`GatewayError::Transport`]) or comes back with an HTTP error status
//! ([`GatewayError::Upstream`]). Missing credentials surface as
//! [`GatewayError::Configuration`] and are fatal for the whole batch.

use std::fmt;
use thiserror::Error;

/// Maximum characters of an error body kept for display
pub const BODY_EXCERPT_CHARS: usize = 500;

/// Classification of HTTP error statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// 401 / 403: wrong key/secret, token format, or API region
    AuthFailure,
    /// 404: wrong base URL / region or program id
    NotFound,
    /// Any other status >= 400
    Other,
}

impl UpstreamKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => UpstreamKind::AuthFailure,
            404 => UpstreamKind::NotFound,
            _ => UpstreamKind::Other,
        }
    }

    /// Operator-facing hint for likely misconfiguration
    pub fn hint(self) -> Option<&'static str> {
        match self {
            UpstreamKind::AuthFailure => Some(
                "check PK_API_KEY / PK_API_SECRET, the token header style and claim shape, \
                 and that PK_API_BASE points at the right region",
            ),
            UpstreamKind::NotFound => {
                Some("check PK_API_BASE (pub1 vs pub2) and PROGRAM_ID")
            }
            UpstreamKind::Other => None,
        }
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamKind::AuthFailure => f.write_str("authentication failed"),
            UpstreamKind::NotFound => f.write_str("endpoint not found"),
            UpstreamKind::Other => f.write_str("upstream error"),
        }
    }
}

/// Membership API gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials or program id missing/invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure (timeout, connection refused, DNS, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP status >= 400
    #[error("HTTP {status} {kind}: {body_excerpt}")]
    Upstream {
        status: u16,
        kind: UpstreamKind,
        body_excerpt: String,
    },

    /// Request body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Build an upstream error from a status code and raw response body
    pub fn upstream(status: u16, body: &str) -> Self {
        GatewayError::Upstream {
            status,
            kind: UpstreamKind::from_status(status),
            body_excerpt: excerpt(body, BODY_EXCERPT_CHARS),
        }
    }

    /// Whether the rest of a per-name batch should keep going after this error
    ///
    /// Configuration errors poison every request; the others are isolated to
    /// the name that triggered them.
    pub fn is_isolated(&self) -> bool {
        !matches!(
            self,
            GatewayError::Configuration(_) | GatewayError::Serialization(_)
        )
    }
}

impl From<pkid_common::Error> for GatewayError {
    fn from(err: pkid_common::Error) -> Self {
        match err {
            pkid_common::Error::Config(msg) => GatewayError::Configuration(msg),
            other => GatewayError::Configuration(other.to_string()),
        }
    }
}

/// First `max_chars` characters of `text`, on a char boundary
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_kind_from_status() {
        assert_eq!(UpstreamKind::from_status(401), UpstreamKind::AuthFailure);
        assert_eq!(UpstreamKind::from_status(403), UpstreamKind::AuthFailure);
        assert_eq!(UpstreamKind::from_status(404), UpstreamKind::NotFound);
        assert_eq!(UpstreamKind::from_status(429), UpstreamKind::Other);
        assert_eq!(UpstreamKind::from_status(500), UpstreamKind::Other);
    }

    #[test]
    fn test_upstream_error_truncates_body() {
        let body = "x".repeat(2000);
        match GatewayError::upstream(500, &body) {
            GatewayError::Upstream {
                status,
                body_excerpt,
                ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(body_excerpt.chars().count(), BODY_EXCERPT_CHARS + 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "會員姓名會員姓名";
        assert_eq!(excerpt(text, 4), "會員姓名…");
        assert_eq!(excerpt(text, 100), text);
        assert_eq!(excerpt("", 10), "");
    }

    #[test]
    fn test_display_includes_status_and_kind() {
        let err = GatewayError::upstream(403, "forbidden");
        assert_eq!(err.to_string(), "HTTP 403 authentication failed: forbidden");
    }

    #[test]
    fn test_isolation_policy() {
        assert!(GatewayError::Transport("timeout".into()).is_isolated());
        assert!(GatewayError::upstream(500, "").is_isolated());
        assert!(!GatewayError::Configuration("missing".into()).is_isolated());
    }
}
