//! Configuration loading and credential resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML secrets file
//! 4. Compiled default (only where one exists)
//!
//! A missing TOML file is not an error: the tool warns and carries on with
//! environment variables and defaults. A malformed file is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default REST endpoint (pub1 region)
pub const DEFAULT_API_BASE: &str = "https://api.pub1.passkit.io";

/// Environment variable naming an explicit TOML secrets file
pub const CONFIG_PATH_ENV: &str = "PKID_CONFIG";

/// Configuration keys understood by the tool
///
/// Environment variable names match the keys used by existing deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ApiKey,
    ApiSecret,
    ProgramId,
    ApiBase,
}

impl ConfigKey {
    pub fn env_var(self) -> &'static str {
        match self {
            ConfigKey::ApiKey => "PK_API_KEY",
            ConfigKey::ApiSecret => "PK_API_SECRET",
            ConfigKey::ProgramId => "PROGRAM_ID",
            ConfigKey::ApiBase => "PK_API_BASE",
        }
    }

    fn toml_value(self, config: &TomlConfig) -> Option<&str> {
        match self {
            ConfigKey::ApiKey => config.pk_api_key.as_deref(),
            ConfigKey::ApiSecret => config.pk_api_secret.as_deref(),
            ConfigKey::ProgramId => config.program_id.as_deref(),
            ConfigKey::ApiBase => config.pk_api_base.as_deref(),
        }
    }

    fn is_secret(self) -> bool {
        matches!(self, ConfigKey::ApiSecret)
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    TomlFile,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigSource::CommandLine => "command line",
            ConfigSource::Environment => "environment",
            ConfigSource::TomlFile => "TOML config",
            ConfigSource::Default => "default",
        };
        f.write_str(s)
    }
}

// ========================================
// TOML File
// ========================================

/// Secrets/settings file contents
///
/// Every field is optional; environment variables override whatever is here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub pk_api_key: Option<String>,
    #[serde(default)]
    pub pk_api_secret: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub pk_api_base: Option<String>,

    /// Search behaviour defaults
    #[serde(default)]
    pub lookup: LookupSection,

    /// Token claim shape / header style
    #[serde(default)]
    pub token: TokenSection,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[lookup]` table
///
/// Values are kept as written; the lookup crate parses and validates them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupSection {
    /// `exact` or `contains`
    #[serde(default)]
    pub match_mode: Option<String>,
    /// `batched-or` or `per-name`
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    /// `created` or `updated`
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_asc: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `[token]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSection {
    /// `standard` (iss) or `signed` (uid + body signature)
    #[serde(default)]
    pub claim_shape: Option<String>,
    /// `bearer` or `bare`
    #[serde(default)]
    pub header_style: Option<String>,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the TOML secrets file
///
/// Priority: explicit path → `PKID_CONFIG` → `<config dir>/pkid/config.toml`.
/// Returns `None` only when no config directory can be determined.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("pkid").join("config.toml"))
}

/// Read the TOML secrets file without logging
///
/// Returns `Ok(None)` when the file does not exist. Used before the tracing
/// subscriber is installed, since the file may carry the log level.
pub fn read_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Load the TOML secrets file
///
/// A missing file yields an empty configuration with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    match read_toml_config(path)? {
        Some(config) => {
            info!("Loaded config file {}", path.display());
            Ok(config)
        }
        None => {
            warn!(
                "Config file {} not found, using environment variables and defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
    }
}

// ========================================
// Resolution
// ========================================

/// A resolved value and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: ConfigSource,
}

/// Values supplied on the command line, if any
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub program_id: Option<String>,
    pub api_base: Option<String>,
}

impl CredentialOverrides {
    fn get(&self, key: ConfigKey) -> Option<&str> {
        match key {
            ConfigKey::ApiKey => self.api_key.as_deref(),
            ConfigKey::ApiSecret => self.api_secret.as_deref(),
            ConfigKey::ProgramId => self.program_id.as_deref(),
            ConfigKey::ApiBase => self.api_base.as_deref(),
        }
    }
}

/// Everything needed to reach the membership API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub program_id: String,
    /// Base URL without trailing slash
    pub api_base: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("program_id", &self.program_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Resolves settings across command line, environment and TOML file
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    toml: TomlConfig,
}

impl ConfigResolver {
    pub fn new(toml: TomlConfig) -> Self {
        Self { toml }
    }

    pub fn toml(&self) -> &TomlConfig {
        &self.toml
    }

    /// Resolve one key, honoring priority order
    ///
    /// Blank values are treated as absent. Literal `\n` sequences are turned
    /// into newlines so multi-line secrets survive single-line stores.
    pub fn resolve(&self, key: ConfigKey, cli_value: Option<&str>) -> Option<Resolved> {
        let env_value = std::env::var(key.env_var()).ok();
        let candidates = [
            (cli_value, ConfigSource::CommandLine),
            (env_value.as_deref(), ConfigSource::Environment),
            (key.toml_value(&self.toml), ConfigSource::TomlFile),
        ];

        let present: Vec<(&str, ConfigSource)> = candidates
            .iter()
            .filter_map(|(value, source)| value.filter(|v| is_valid_value(v)).map(|v| (v, *source)))
            .collect();

        if present.len() > 1 {
            let sources: Vec<String> = present.iter().map(|(_, s)| s.to_string()).collect();
            warn!(
                "{} found in multiple sources: {}. Using {} (highest priority).",
                key.env_var(),
                sources.join(", "),
                present[0].1
            );
        }

        let (value, source) = present.first()?;
        if key.is_secret() {
            debug!("{} loaded from {}", key.env_var(), source);
        } else {
            debug!("{} = {} (from {})", key.env_var(), value, source);
        }

        Some(Resolved {
            value: unescape_newlines(value),
            source: *source,
        })
    }

    /// Resolve the API credentials and program identifier
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming every missing key. Missing configuration is
    /// fatal for the whole batch.
    pub fn credentials(&self, overrides: &CredentialOverrides) -> Result<Credentials> {
        let api_key = self.resolve(ConfigKey::ApiKey, overrides.get(ConfigKey::ApiKey));
        let api_secret = self.resolve(ConfigKey::ApiSecret, overrides.get(ConfigKey::ApiSecret));
        let program_id = self.resolve(ConfigKey::ProgramId, overrides.get(ConfigKey::ProgramId));

        let missing: Vec<&str> = [
            (ConfigKey::ApiKey, api_key.is_none()),
            (ConfigKey::ApiSecret, api_secret.is_none()),
            (ConfigKey::ProgramId, program_id.is_none()),
        ]
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(key, _)| key.env_var())
        .collect();

        let (Some(api_key), Some(api_secret), Some(program_id)) = (api_key, api_secret, program_id)
        else {
            return Err(Error::Config(format!(
                "Missing {} in command line, environment or config file",
                missing.join(" / ")
            )));
        };

        let api_base = self
            .resolve(ConfigKey::ApiBase, overrides.get(ConfigKey::ApiBase))
            .map(|r| r.value)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Credentials {
            api_key: api_key.value.trim().to_string(),
            api_secret: api_secret.value,
            program_id: program_id.value.trim().to_string(),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
        })
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}
