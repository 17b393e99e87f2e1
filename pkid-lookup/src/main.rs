//! pkid - PassKit member id batch lookup
//!
//! Looks up member ids for a batch of display names, either once
//! (`pkid lookup`) or in an interactive session (`pkid session`).
//! Results go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pkid_common::auth::TokenProvider;
use pkid_common::config::{
    load_toml_config, read_toml_config, resolve_config_path, ConfigResolver, CredentialOverrides,
    TomlConfig,
};
use pkid_common::names::{split_batch, MAX_BATCH_SIZE};
use pkid_lookup::console::{render_report, Repl};
use pkid_lookup::export::write_csv;
use pkid_lookup::extract::{PlainTextExtractor, TextExtractor};
use pkid_lookup::models::MatchMode;
use pkid_lookup::services::query_builder::{FilterStrategy, OrderBy};
use pkid_lookup::session::CopyStateTracker;
use pkid_lookup::{build_runner, LookupSettings, SettingsOverrides};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for pkid
#[derive(Parser, Debug)]
#[command(name = "pkid")]
#[command(about = "Look up PassKit member ids by display name")]
#[command(version)]
struct Cli {
    /// TOML secrets/settings file (default: PKID_CONFIG or <config dir>/pkid/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// PassKit program id (overrides PROGRAM_ID)
    #[arg(long, global = true)]
    program_id: Option<String>,

    /// API base URL (overrides PK_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// API key (overrides PK_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up one batch of names and print the results
    Lookup(LookupArgs),
    /// Interactive session with copy tracking
    Session(TuningArgs),
    /// Print name-looking lines from recognized text ("-" for stdin)
    Extract { file: PathBuf },
    /// Print a freshly minted API token
    Token,
}

/// Search tuning shared by `lookup` and `session`
#[derive(Args, Debug, Clone)]
struct TuningArgs {
    /// exact or contains
    #[arg(long)]
    mode: Option<MatchMode>,

    /// batched-or or per-name
    #[arg(long)]
    strategy: Option<FilterStrategy>,

    /// Records per request (1-1000)
    #[arg(long)]
    limit: Option<u32>,

    /// created or updated
    #[arg(long)]
    order_by: Option<OrderBy>,

    /// Sort descending
    #[arg(long)]
    order_desc: bool,

    /// Request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl From<&TuningArgs> for SettingsOverrides {
    fn from(args: &TuningArgs) -> Self {
        Self {
            match_mode: args.mode,
            strategy: args.strategy,
            limit: args.limit,
            order_by: args.order_by,
            order_desc: args.order_desc,
            timeout_secs: args.timeout_secs,
        }
    }
}

#[derive(Args, Debug)]
struct LookupArgs {
    /// File with one name per line (default: stdin)
    #[arg(long)]
    names_file: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,

    /// Also write results as CSV to this path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Prefix the CSV with a UTF-8 byte order mark
    #[arg(long)]
    bom: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    // The config file may carry the log level, so peek at it quietly first
    let file_level = config_path
        .as_deref()
        .and_then(|path| read_toml_config(path).ok().flatten())
        .map(|config| config.logging.level);
    let level = cli
        .log_level
        .clone()
        .or(file_level)
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting pkid v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml = match config_path.as_deref() {
        Some(path) => load_toml_config(path).context("Failed to load config file")?,
        None => {
            warn!("No config directory available, using environment variables and defaults");
            TomlConfig::default()
        }
    };
    let resolver = ConfigResolver::new(toml);
    let overrides = CredentialOverrides {
        api_key: cli.api_key.clone(),
        api_secret: None,
        program_id: cli.program_id.clone(),
        api_base: cli.api_base.clone(),
    };

    match &cli.command {
        Commands::Extract { file } => extract(file),
        Commands::Token => token(&resolver, &overrides),
        Commands::Lookup(args) => lookup(&resolver, &overrides, args).await,
        Commands::Session(tuning) => session(&resolver, &overrides, tuning).await,
    }
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn extract(file: &Path) -> Result<()> {
    let input = read_input(Some(file))?;
    let names = PlainTextExtractor.extract(&input)?;
    info!(names = names.len(), "Extracted names");

    let mut out = std::io::stdout();
    for name in &names {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

fn token(resolver: &ConfigResolver, overrides: &CredentialOverrides) -> Result<()> {
    let credentials = resolver.credentials(overrides)?;
    let settings = LookupSettings::resolve(resolver.toml(), &SettingsOverrides::default())?;
    let provider = TokenProvider::new(
        &credentials.api_key,
        &credentials.api_secret,
        settings.claim_shape,
        settings.header_style,
        settings.ttl_secs,
    )?;

    info!(
        shape = %provider.shape(),
        style = %provider.style(),
        ttl_secs = settings.ttl_secs,
        "Minting token for an empty request body"
    );
    println!("{}", provider.token_for(b"")?);
    Ok(())
}

async fn lookup(
    resolver: &ConfigResolver,
    overrides: &CredentialOverrides,
    args: &LookupArgs,
) -> Result<()> {
    let credentials = resolver.credentials(overrides)?;
    let settings = LookupSettings::resolve(resolver.toml(), &SettingsOverrides::from(&args.tuning))?;
    let runner = build_runner(&credentials, &settings)?;

    let input = read_input(args.names_file.as_deref())?;
    let text = String::from_utf8_lossy(&input);
    let all_names = split_batch(&text, usize::MAX);
    if all_names.len() > MAX_BATCH_SIZE {
        warn!(
            given = all_names.len(),
            kept = MAX_BATCH_SIZE,
            "Too many names, only the first batch is searched"
        );
    }
    let names = split_batch(&text, MAX_BATCH_SIZE);
    if names.is_empty() {
        bail!("No names given");
    }

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining names");
            token.cancel();
        }
    });

    let result = runner.run(&names, &cancel, |_| {}).await;
    watcher.abort();
    let report = result.context("Lookup failed")?;

    let mut out = std::io::stdout();
    render_report(&mut out, &report, &CopyStateTracker::new())?;

    if let Some(path) = &args.csv {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&report.outcome.found, BufWriter::new(file), args.bom)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(rows = report.hit_count(), path = %path.display(), "Exported CSV");
    }
    Ok(())
}

async fn session(
    resolver: &ConfigResolver,
    overrides: &CredentialOverrides,
    tuning: &TuningArgs,
) -> Result<()> {
    let credentials = resolver.credentials(overrides)?;
    let settings = LookupSettings::resolve(resolver.toml(), &SettingsOverrides::from(tuning))?;
    let runner = build_runner(&credentials, &settings)?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    Repl::new(runner).run(stdin, &mut stdout).await
}
