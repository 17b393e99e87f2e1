//! PassKit membership API client
//!
//! Lists members of one program through
//! `POST {base}/members/member/list/{programId}`. Every request carries a
//! freshly minted token; nothing is retried.

use crate::error::GatewayError;
use crate::models::MemberRecord;
use crate::services::envelope::{parse_envelope, EnvelopeShape};
use crate::services::query_builder::FilterRequest;
use async_trait::async_trait;
use pkid_common::auth::TokenProvider;
use pkid_common::config::Credentials;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

const USER_AGENT: &str = concat!("pkid/", env!("CARGO_PKG_VERSION"));

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Records returned by one list call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberPage {
    pub records: Vec<MemberRecord>,
    /// Envelope the body was recognized as; `None` when no known shape matched
    pub shape: Option<EnvelopeShape>,
}

impl MemberPage {
    pub fn shape_mismatch(&self) -> bool {
        self.shape.is_none()
    }
}

/// Source of member records
///
/// Implemented by [`PassKitClient`] for the live API and by in-memory fakes
/// in tests.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Run one filter request and return the page with its envelope shape
    async fn fetch_page(&self, request: &FilterRequest) -> Result<MemberPage, GatewayError>;

    /// Run one filter request, keeping only the records
    async fn list_members(
        &self,
        request: &FilterRequest,
    ) -> Result<Vec<MemberRecord>, GatewayError> {
        Ok(self.fetch_page(request).await?.records)
    }
}

/// HTTP client for the member list endpoint
pub struct PassKitClient {
    http_client: reqwest::Client,
    base_url: String,
    program_id: String,
    tokens: TokenProvider,
}

impl PassKitClient {
    pub fn new(
        credentials: &Credentials,
        tokens: TokenProvider,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        if credentials.program_id.trim().is_empty() {
            return Err(GatewayError::Configuration("Missing PROGRAM_ID".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: credentials.api_base.trim_end_matches('/').to_string(),
            program_id: credentials.program_id.trim().to_string(),
            tokens,
        })
    }

    /// Full URL of the list endpoint
    pub fn list_url(&self) -> String {
        format!(
            "{}/members/member/list/{}",
            self.base_url, self.program_id
        )
    }
}

/// Describe a reqwest failure with the detail an operator needs
fn transport_error(err: reqwest::Error) -> GatewayError {
    let detail = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };
    GatewayError::Transport(detail)
}

#[async_trait]
impl MemberDirectory for PassKitClient {
    async fn fetch_page(&self, request: &FilterRequest) -> Result<MemberPage, GatewayError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        let authorization = self.tokens.authorization_for(&body)?;
        let url = self.list_url();

        tracing::debug!(
            url = %url,
            clauses = request.filters.filter_groups.iter().map(|g| g.field_filters.len()).sum::<usize>(),
            limit = request.filters.limit,
            "Querying member list"
        );

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status.as_u16() >= 400 {
            let err = GatewayError::upstream(status.as_u16(), &text);
            tracing::debug!(status = status.as_u16(), error = %err, "Member list request rejected");
            return Err(err);
        }

        let Some(parsed) = parse_envelope(&text) else {
            tracing::warn!(
                status = status.as_u16(),
                body_len = text.len(),
                "Unrecognized response shape, treating as zero records"
            );
            return Ok(MemberPage::default());
        };

        let records: Vec<MemberRecord> = parsed.items.iter().map(MemberRecord::from_value).collect();

        tracing::debug!(
            shape = %parsed.shape,
            records = records.len(),
            "Parsed member list response"
        );

        Ok(MemberPage {
            records,
            shape: Some(parsed.shape),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkid_common::auth::{ClaimShape, HeaderStyle, DEFAULT_TTL_SECS};

    fn credentials(base: &str, program: &str) -> Credentials {
        Credentials {
            api_key: "key-1".to_string(),
            api_secret: "s3cret".to_string(),
            program_id: program.to_string(),
            api_base: base.to_string(),
        }
    }

    fn tokens() -> TokenProvider {
        TokenProvider::new(
            "key-1",
            "s3cret",
            ClaimShape::Standard,
            HeaderStyle::Bearer,
            DEFAULT_TTL_SECS,
        )
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = PassKitClient::new(
            &credentials("https://api.pub2.passkit.io/", "prog-1"),
            tokens(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
        .unwrap();
        assert_eq!(
            client.list_url(),
            "https://api.pub2.passkit.io/members/member/list/prog-1"
        );
    }

    #[test]
    fn test_client_requires_program_id() {
        let result = PassKitClient::new(
            &credentials("https://api.pub1.passkit.io", "  "),
            tokens(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn test_shape_mismatch_flag() {
        assert!(MemberPage::default().shape_mismatch());
        let page = MemberPage {
            records: vec![],
            shape: Some(EnvelopeShape::BareList),
        };
        assert!(!page.shape_mismatch());
    }
}
