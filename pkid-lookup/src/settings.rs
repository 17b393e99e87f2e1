//! Lookup tuning resolved from the config file and command-line overrides
//!
//! Credentials are resolved separately by
//! [`pkid_common::config::ConfigResolver`]; this covers the `[lookup]` and
//! `[token]` tables. A command-line value always beats the file.

use crate::models::MatchMode;
use crate::services::passkit_client::DEFAULT_TIMEOUT_SECS;
use crate::services::query_builder::{clamp_limit, FilterStrategy, OrderBy, QueryOptions};
use pkid_common::auth::{ClaimShape, HeaderStyle, DEFAULT_TTL_SECS};
use pkid_common::config::TomlConfig;
use pkid_common::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Command-line overrides; `None` defers to the config file
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub match_mode: Option<MatchMode>,
    pub strategy: Option<FilterStrategy>,
    pub limit: Option<u32>,
    pub order_by: Option<OrderBy>,
    pub order_desc: bool,
    pub timeout_secs: Option<u64>,
}

/// Effective lookup settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub query: QueryOptions,
    pub strategy: FilterStrategy,
    pub timeout: Duration,
    pub claim_shape: ClaimShape,
    pub header_style: HeaderStyle,
    pub ttl_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            query: QueryOptions::default(),
            strategy: FilterStrategy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            claim_shape: ClaimShape::default(),
            header_style: HeaderStyle::default(),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

fn parse_opt<T>(value: Option<&String>) -> Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    value.map(|v| v.parse::<T>()).transpose()
}

impl LookupSettings {
    /// Merge the config file's tables with command-line overrides
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for unparseable values in the file, or a zero
    /// timeout or TTL.
    pub fn resolve(toml: &TomlConfig, overrides: &SettingsOverrides) -> Result<Self> {
        let defaults = Self::default();
        let lookup = &toml.lookup;
        let token = &toml.token;

        let match_mode = match overrides.match_mode {
            Some(mode) => mode,
            None => parse_opt(lookup.match_mode.as_ref())?.unwrap_or(defaults.query.match_mode),
        };
        let strategy = match overrides.strategy {
            Some(strategy) => strategy,
            None => parse_opt(lookup.strategy.as_ref())?.unwrap_or(defaults.strategy),
        };
        let order_by = match overrides.order_by {
            Some(order_by) => order_by,
            None => parse_opt(lookup.order_by.as_ref())?.unwrap_or(defaults.query.order_by),
        };
        let order_asc = if overrides.order_desc {
            false
        } else {
            lookup.order_asc.unwrap_or(defaults.query.order_asc)
        };

        let requested_limit = overrides
            .limit
            .or(lookup.limit)
            .unwrap_or(defaults.query.limit);
        let limit = clamp_limit(requested_limit);
        if limit != requested_limit {
            tracing::warn!(
                requested = requested_limit,
                effective = limit,
                "Limit out of range, clamped"
            );
        }

        let timeout_secs = overrides
            .timeout_secs
            .or(lookup.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::InvalidInput("timeout_secs must be positive".to_string()));
        }

        let ttl_secs = token.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
        if ttl_secs == 0 {
            return Err(Error::InvalidInput("ttl_secs must be positive".to_string()));
        }
        if !(600..=3600).contains(&ttl_secs) {
            tracing::warn!(ttl_secs, "Token TTL outside the recommended 600-3600 s range");
        }

        Ok(Self {
            query: QueryOptions {
                match_mode,
                limit,
                offset: 0,
                order_by,
                order_asc,
            },
            strategy,
            timeout: Duration::from_secs(timeout_secs),
            claim_shape: parse_opt(token.claim_shape.as_ref())?.unwrap_or(defaults.claim_shape),
            header_style: parse_opt(token.header_style.as_ref())?.unwrap_or(defaults.header_style),
            ttl_secs,
        })
    }
}
