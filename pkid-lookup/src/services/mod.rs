//! Lookup services: request building, the API gateway, reconciliation and
//! the batch driver

pub mod batch_runner;
pub mod envelope;
pub mod passkit_client;
pub mod query_builder;
pub mod reconciler;

pub use batch_runner::{BatchReport, BatchRunner, NameFailure};
pub use passkit_client::{MemberDirectory, MemberPage, PassKitClient};
pub use query_builder::{FilterStrategy, QueryOptions};
