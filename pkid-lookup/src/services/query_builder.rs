//! Filter request construction for the member list endpoint
//!
//! Two request shapes are supported:
//! - **Batched-OR**: one request, one `OR` group with a `displayName` clause
//!   per name. Default; one round-trip for the whole batch.
//! - **Per-name**: one request per name with a single-clause `AND` group.
//!   Fallback for tenants where OR groups are unreliable.

use crate::models::MatchMode;
use pkid_common::{Error, InputName, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound accepted by the list endpoint
pub const MAX_LIMIT: u32 = 1000;

/// Field the filters are applied to
pub const DISPLAY_NAME_FIELD: &str = "displayName";

// ============================================================================
// Wire Types
// ============================================================================

/// Body of `POST /members/member/list/{programId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub filters: Filters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub limit: u32,
    pub offset: u32,
    pub order_by: OrderBy,
    pub order_asc: bool,
    pub filter_groups: Vec<FilterGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    pub condition: Condition,
    pub field_filters: Vec<FieldFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub filter_field: String,
    pub filter_value: String,
    pub filter_operator: FilterOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Like,
}

impl From<MatchMode> for FilterOperator {
    fn from(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Exact => FilterOperator::Eq,
            MatchMode::Contains => FilterOperator::Like,
        }
    }
}

/// Sort column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Created,
    Updated,
}

impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(OrderBy::Created),
            "updated" => Ok(OrderBy::Updated),
            other => Err(Error::InvalidInput(format!(
                "Unknown order column '{}' (expected 'created' or 'updated')",
                other
            ))),
        }
    }
}

// ============================================================================
// Strategy and Options
// ============================================================================

/// How a batch is split into requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterStrategy {
    #[default]
    BatchedOr,
    PerName,
}

impl FromStr for FilterStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "batched-or" | "batched" | "or" => Ok(FilterStrategy::BatchedOr),
            "per-name" | "single" => Ok(FilterStrategy::PerName),
            other => Err(Error::InvalidInput(format!(
                "Unknown filter strategy '{}' (expected 'batched-or' or 'per-name')",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStrategy::BatchedOr => f.write_str("batched-or"),
            FilterStrategy::PerName => f.write_str("per-name"),
        }
    }
}

/// Paging and ordering applied to every request of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub match_mode: MatchMode,
    pub limit: u32,
    pub offset: u32,
    pub order_by: OrderBy,
    pub order_asc: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::Exact,
            limit: MAX_LIMIT,
            offset: 0,
            order_by: OrderBy::Created,
            order_asc: true,
        }
    }
}

/// One request plus the input names it was built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub names: Vec<InputName>,
    pub request: FilterRequest,
}

// ============================================================================
// Builders
// ============================================================================

/// Clamp `limit` into the range the endpoint accepts
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_LIMIT)
}

/// Batched-OR request with default ordering (`created`, ascending)
///
/// # Examples
///
/// ```
/// use pkid_common::InputName;
/// use pkid_lookup::models::MatchMode;
/// use pkid_lookup::services::query_builder::{build_filter, Condition};
///
/// let names = vec![InputName::new("alice smith").unwrap(), InputName::new("bob lee").unwrap()];
/// let request = build_filter(&names, MatchMode::Exact, 1000, 0);
///
/// let group = &request.filters.filter_groups[0];
/// assert_eq!(group.condition, Condition::Or);
/// assert_eq!(group.field_filters.len(), 2);
/// ```
pub fn build_filter(
    names: &[InputName],
    match_mode: MatchMode,
    limit: u32,
    offset: u32,
) -> FilterRequest {
    let options = QueryOptions {
        match_mode,
        limit,
        offset,
        ..QueryOptions::default()
    };
    build_group(names, Condition::Or, &options)
}

/// Single-name request with a one-clause `AND` group
pub fn build_single(name: &InputName, options: &QueryOptions) -> FilterRequest {
    build_group(std::slice::from_ref(name), Condition::And, options)
}

fn build_group(names: &[InputName], condition: Condition, options: &QueryOptions) -> FilterRequest {
    let operator = FilterOperator::from(options.match_mode);
    let field_filters = names
        .iter()
        .map(|name| FieldFilter {
            filter_field: DISPLAY_NAME_FIELD.to_string(),
            filter_value: name.as_str().to_string(),
            filter_operator: operator,
        })
        .collect();

    FilterRequest {
        filters: Filters {
            limit: clamp_limit(options.limit),
            offset: options.offset,
            order_by: options.order_by,
            order_asc: options.order_asc,
            filter_groups: vec![FilterGroup {
                condition,
                field_filters,
            }],
        },
    }
}

/// Split a batch into requests according to `strategy`
///
/// An empty batch plans no requests at all.
pub fn plan_requests(
    strategy: FilterStrategy,
    names: &[InputName],
    options: &QueryOptions,
) -> Vec<PlannedRequest> {
    if names.is_empty() {
        return Vec::new();
    }

    match strategy {
        FilterStrategy::BatchedOr => vec![PlannedRequest {
            names: names.to_vec(),
            request: build_group(names, Condition::Or, options),
        }],
        FilterStrategy::PerName => names
            .iter()
            .map(|name| PlannedRequest {
                names: vec![name.clone()],
                request: build_single(name, options),
            })
            .collect(),
    }
}
