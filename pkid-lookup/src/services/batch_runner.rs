//! Batch driver
//!
//! Runs one batch of names against a [`MemberDirectory`] and reconciles the
//! result. Requests are strictly sequential.
//!
//! **Batched-OR:** one request. Any error fails the batch.
//!
//! **Per-name:** one request per name. A transport or upstream failure is
//! recorded against that name and the batch continues; a configuration
//! failure aborts immediately. Progress is reported after every name, and
//! cancellation is honoured between names (an in-flight request is
//! abandoned).

use crate::error::GatewayError;
use crate::models::{BatchOutcome, MatchMode, MemberRecord};
use crate::services::passkit_client::MemberDirectory;
use crate::services::query_builder::{plan_requests, FilterStrategy, PlannedRequest, QueryOptions};
use crate::services::reconciler::{reconcile, reconcile_partial};
use pkid_common::names::dedup_preserving_order;
use pkid_common::InputName;
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A request that failed, with the names it was issued for
#[derive(Debug)]
pub struct NameFailure {
    pub names: Vec<InputName>,
    pub error: GatewayError,
}

impl fmt::Display for NameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names.iter().map(InputName::as_str).collect();
        write!(f, "{}: {}", names.join(", "), self.error)
    }
}

/// Progress of a per-name batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} processed", self.processed, self.total)
    }
}

/// Everything one batch produced
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Isolated per-name failures (per-name strategy only)
    pub failures: Vec<NameFailure>,
    /// Names never attempted because the batch was cancelled
    pub skipped: Vec<InputName>,
    /// Non-fatal problems such as unrecognized response shapes
    pub warnings: Vec<String>,
    /// Distinct input names in the batch
    pub input_count: usize,
    pub requests_sent: usize,
}

impl BatchReport {
    pub fn hit_count(&self) -> usize {
        self.outcome.hit_count()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// One-line summary, e.g. `3 names, 2 hits`
    pub fn summary(&self) -> String {
        let mut line = format!("{} names, {} hits", self.input_count, self.hit_count());
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        if !self.skipped.is_empty() {
            line.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        line
    }
}

fn shape_warning(planned: &PlannedRequest) -> String {
    let names: Vec<&str> = planned.names.iter().map(InputName::as_str).collect();
    format!(
        "Unrecognized response shape for {}; treated as zero records",
        names.join(", ")
    )
}

/// Runs batches with fixed query options and strategy
pub struct BatchRunner<D> {
    directory: D,
    options: QueryOptions,
    strategy: FilterStrategy,
}

impl<D: MemberDirectory> BatchRunner<D> {
    pub fn new(directory: D, options: QueryOptions, strategy: FilterStrategy) -> Self {
        Self {
            directory,
            options,
            strategy,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn strategy(&self) -> FilterStrategy {
        self.strategy
    }

    pub fn match_mode(&self) -> MatchMode {
        self.options.match_mode
    }

    pub fn set_match_mode(&mut self, mode: MatchMode) {
        self.options.match_mode = mode;
    }

    /// Run one batch
    ///
    /// Duplicate names are collapsed before any request is planned. An
    /// empty batch sends nothing and returns an empty report.
    ///
    /// # Errors
    ///
    /// Configuration errors always; any error under the batched-OR strategy.
    pub async fn run<F>(
        &self,
        names: &[InputName],
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<BatchReport, GatewayError>
    where
        F: FnMut(BatchProgress),
    {
        let inputs = dedup_preserving_order(names);
        let plan = plan_requests(self.strategy, &inputs, &self.options);
        let start_time = Instant::now();

        info!(
            names = inputs.len(),
            requests = plan.len(),
            strategy = %self.strategy,
            mode = %self.options.match_mode,
            "Starting lookup batch"
        );

        let report = match self.strategy {
            FilterStrategy::BatchedOr => self.run_batched(inputs, plan).await?,
            FilterStrategy::PerName => {
                self.run_per_name(inputs, plan, cancel, &mut on_progress)
                    .await?
            }
        };

        info!(
            names = report.input_count,
            hits = report.hit_count(),
            not_found = report.outcome.not_found.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Lookup batch complete: {}",
            report.summary()
        );

        Ok(report)
    }

    async fn run_batched(
        &self,
        inputs: Vec<InputName>,
        plan: Vec<PlannedRequest>,
    ) -> Result<BatchReport, GatewayError> {
        let mut report = BatchReport {
            input_count: inputs.len(),
            ..BatchReport::default()
        };
        let mut records = Vec::new();

        for planned in &plan {
            let page = self.directory.fetch_page(&planned.request).await?;
            report.requests_sent += 1;
            if page.shape_mismatch() {
                warn!(names = planned.names.len(), "Unrecognized response shape");
                report.warnings.push(shape_warning(planned));
            }
            records.extend(page.records);
        }

        report.outcome = reconcile(&inputs, &records, self.options.match_mode);
        Ok(report)
    }

    async fn run_per_name<F>(
        &self,
        inputs: Vec<InputName>,
        plan: Vec<PlannedRequest>,
        cancel: &CancellationToken,
        on_progress: &mut F,
    ) -> Result<BatchReport, GatewayError>
    where
        F: FnMut(BatchProgress),
    {
        let total = plan.len();
        let mut report = BatchReport {
            input_count: inputs.len(),
            ..BatchReport::default()
        };
        let mut succeeded: Vec<InputName> = Vec::new();
        let mut records: Vec<MemberRecord> = Vec::new();

        for (index, planned) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped = plan[index..]
                    .iter()
                    .flat_map(|p| p.names.iter().cloned())
                    .collect();
                break;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.directory.fetch_page(&planned.request) => Some(result),
            };

            let Some(result) = result else {
                report.skipped = plan[index..]
                    .iter()
                    .flat_map(|p| p.names.iter().cloned())
                    .collect();
                break;
            };
            report.requests_sent += 1;

            match result {
                Ok(page) => {
                    debug!(
                        name = %planned.names[0],
                        records = page.records.len(),
                        "Name lookup succeeded"
                    );
                    if page.shape_mismatch() {
                        warn!(name = %planned.names[0], "Unrecognized response shape");
                        report.warnings.push(shape_warning(planned));
                    }
                    succeeded.extend(planned.names.iter().cloned());
                    records.extend(page.records);
                }
                Err(error) if !error.is_isolated() => return Err(error),
                Err(error) => {
                    warn!(name = %planned.names[0], error = %error, "Name lookup failed");
                    report.failures.push(NameFailure {
                        names: planned.names.clone(),
                        error,
                    });
                }
            }

            let progress = BatchProgress {
                processed: index + 1,
                total,
            };
            info!("{}", progress);
            on_progress(progress);
        }

        if report.was_cancelled() {
            warn!(
                skipped = report.skipped.len(),
                "Lookup batch cancelled before all names were processed"
            );
        }

        report.outcome =
            reconcile_partial(&inputs, &succeeded, &records, self.options.match_mode);
        Ok(report)
    }
}
