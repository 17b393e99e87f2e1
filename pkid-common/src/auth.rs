//! API token minting
//!
//! The PassKit REST API authenticates every request with a short-lived
//! HS256 JWT derived from the API key/secret pair.
//!
//! # Claim shapes
//!
//! Deployments disagree on the claim set they expect, so both are supported
//! and chosen through configuration:
//! - [`ClaimShape::Standard`]: `iss` / `iat` / `exp`
//! - [`ClaimShape::Signed`]: `uid` / `iat` / `exp` / `signature`, where
//!   `signature` is the SHA-256 hex digest of the request body
//!
//! Header style (bare token vs. `Bearer ` prefix) is configured the same way.
//!
//! Tokens are never cached: a fresh one is minted for each outbound request.

use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime (1 hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// ========================================
// Configuration Choices
// ========================================

/// Which claim set the token carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimShape {
    /// `iss` / `iat` / `exp`
    #[default]
    Standard,
    /// `uid` / `iat` / `exp` / `signature` (body-bound)
    Signed,
}

/// How the token is placed in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderStyle {
    /// `Authorization: Bearer <token>`
    #[default]
    Bearer,
    /// `Authorization: <token>`
    Bare,
}

impl FromStr for ClaimShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "iss" => Ok(ClaimShape::Standard),
            "signed" | "uid" => Ok(ClaimShape::Signed),
            other => Err(Error::InvalidInput(format!(
                "Unknown claim shape '{}' (expected 'standard' or 'signed')",
                other
            ))),
        }
    }
}

impl FromStr for HeaderStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(HeaderStyle::Bearer),
            "bare" | "raw" => Ok(HeaderStyle::Bare),
            other => Err(Error::InvalidInput(format!(
                "Unknown header style '{}' (expected 'bearer' or 'bare')",
                other
            ))),
        }
    }
}

impl fmt::Display for ClaimShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimShape::Standard => f.write_str("standard"),
            ClaimShape::Signed => f.write_str("signed"),
        }
    }
}

impl fmt::Display for HeaderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderStyle::Bearer => f.write_str("bearer"),
            HeaderStyle::Bare => f.write_str("bare"),
        }
    }
}

// ========================================
// Claims
// ========================================

/// JWT claim set
///
/// Exactly one of `iss` / `uid` is populated depending on [`ClaimShape`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Claims {
    /// Build the claim set for `shape` issued at `now`
    pub fn new(
        shape: ClaimShape,
        issuer: &str,
        now: i64,
        ttl_secs: u64,
        body_digest: Option<&str>,
    ) -> Self {
        let exp = now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
        let signature = body_digest.map(str::to_string);
        match shape {
            ClaimShape::Standard => Claims {
                iss: Some(issuer.to_string()),
                uid: None,
                iat: now,
                exp,
                signature,
            },
            ClaimShape::Signed => Claims {
                iss: None,
                uid: Some(issuer.to_string()),
                iat: now,
                exp,
                signature,
            },
        }
    }
}

// ========================================
// Minting and Verification
// ========================================

/// SHA-256 of a request body as 64 lowercase hex characters
///
/// # Examples
///
/// ```
/// use pkid_common::auth::body_digest;
///
/// let digest = body_digest(b"{}");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// Mint a token with `iss` / `iat` / `exp` claims, expiring `ttl_secs` from now
///
/// When `body_digest` is supplied it is embedded as a `signature` claim.
///
/// # Errors
///
/// [`Error::Config`] when `issuer` or `secret` is empty.
pub fn issue_token(
    issuer: &str,
    secret: &str,
    ttl_secs: u64,
    body_digest: Option<&str>,
) -> Result<String> {
    let claims = Claims::new(
        ClaimShape::Standard,
        issuer,
        chrono::Utc::now().timestamp(),
        ttl_secs,
        body_digest,
    );
    encode(&claims, issuer, secret)
}

/// Sign `claims` into a compact JWT
pub fn encode(claims: &Claims, issuer: &str, secret: &str) -> Result<String> {
    if issuer.trim().is_empty() {
        return Err(Error::Config("API key (token issuer) is empty".to_string()));
    }
    if secret.is_empty() {
        return Err(Error::Config("API secret is empty".to_string()));
    }

    let payload = serde_json::to_vec(claims)
        .map_err(|e| Error::Internal(format!("Failed to serialize claims: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWT_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, sig))
}

/// Verify a token's HS256 signature and return its claims
///
/// Expiry is not checked; that is the receiving API's concern.
pub fn decode(token: &str, secret: &str) -> Result<Claims> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::InvalidInput("Token must have three parts".to_string()));
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(e.to_string()))?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());

    let expected = URL_SAFE_NO_PAD
        .decode(sig)
        .map_err(|e| Error::InvalidInput(format!("Bad token signature encoding: {}", e)))?;
    mac.verify_slice(&expected)
        .map_err(|_| Error::InvalidInput("Token signature mismatch".to_string()))?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::InvalidInput(format!("Bad token payload encoding: {}", e)))?;
    serde_json::from_slice(&payload_bytes)
        .map_err(|e| Error::InvalidInput(format!("Bad token payload: {}", e)))
}

// ========================================
// Per-request Provider
// ========================================

/// Mints `Authorization` header values for outbound requests
#[derive(Clone)]
pub struct TokenProvider {
    api_key: String,
    api_secret: String,
    shape: ClaimShape,
    style: HeaderStyle,
    ttl_secs: u64,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("shape", &self.shape)
            .field("style", &self.style)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenProvider {
    /// # Errors
    ///
    /// [`Error::Config`] when key or secret is blank.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        shape: ClaimShape,
        style: HeaderStyle,
        ttl_secs: u64,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() || api_secret.trim().is_empty() {
            return Err(Error::Config(
                "Missing PK_API_KEY / PK_API_SECRET".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            api_secret,
            shape,
            style,
            ttl_secs,
        })
    }

    pub fn shape(&self) -> ClaimShape {
        self.shape
    }

    pub fn style(&self) -> HeaderStyle {
        self.style
    }

    /// Mint a fresh token for a request with the given body
    ///
    /// The body digest is only embedded for [`ClaimShape::Signed`].
    pub fn token_for(&self, body: &[u8]) -> Result<String> {
        let digest = match self.shape {
            ClaimShape::Signed => Some(body_digest(body)),
            ClaimShape::Standard => None,
        };
        let claims = Claims::new(
            self.shape,
            &self.api_key,
            chrono::Utc::now().timestamp(),
            self.ttl_secs,
            digest.as_deref(),
        );
        encode(&claims, &self.api_key, &self.api_secret)
    }

    /// Mint a fresh token and format it for the `Authorization` header
    pub fn authorization_for(&self, body: &[u8]) -> Result<String> {
        let token = self.token_for(body)?;
        Ok(match self.style {
            HeaderStyle::Bearer => format!("Bearer {}", token),
            HeaderStyle::Bare => token,
        })
    }
}

// ========================================
// Tests
// ========================================
