//! # pkid Common Library
//!
//! Shared code for the PassKit ID lookup tool:
//! - Error types
//! - Configuration loading (TOML secrets file with environment override)
//! - Name normalization
//! - API token minting

pub mod auth;
pub mod config;
pub mod error;
pub mod names;

pub use error::{Error, Result};
pub use names::InputName;
