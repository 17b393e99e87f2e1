//! pkid-lookup library interface
//!
//! Batch lookup of PassKit member ids by display name. Exposes the
//! building blocks used by the `pkid` binary so they can be tested in
//! isolation.

pub mod console;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod services;
pub mod session;
pub mod settings;

pub use crate::error::{GatewayError, UpstreamKind};
pub use crate::models::{BatchOutcome, MatchMode, MatchResult, MemberRecord};
pub use crate::session::{CopyStateTracker, Session};
pub use crate::settings::{LookupSettings, SettingsOverrides};

use pkid_common::auth::TokenProvider;
use pkid_common::config::Credentials;
use services::{BatchRunner, PassKitClient};

/// Wire credentials and settings into a ready-to-run batch runner
///
/// # Errors
///
/// [`GatewayError::Configuration`] when the token provider or client cannot
/// be built from `credentials`.
pub fn build_runner(
    credentials: &Credentials,
    settings: &LookupSettings,
) -> Result<BatchRunner<PassKitClient>, GatewayError> {
    let tokens = TokenProvider::new(
        &credentials.api_key,
        &credentials.api_secret,
        settings.claim_shape,
        settings.header_style,
        settings.ttl_secs,
    )?;
    let client = PassKitClient::new(credentials, tokens, settings.timeout)?;
    Ok(BatchRunner::new(client, settings.query, settings.strategy))
}
