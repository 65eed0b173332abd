//! loadorder - Main entry point
//!
//! Thin host around the resolution engine: loads the snapshot files, runs
//! one resolution and prints the report.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use loadorder::cli::{Cli, Commands};
use loadorder::config_file::ResolverConfig;
use loadorder::logic::version::major_minor;
use loadorder::rules::{RuleLayer, RuleSources};
use loadorder::snapshot::{CatalogSnapshot, load_rule_layer};
use loadorder::types::RuleOrigin;
use loadorder::resolve;

/// Initialize logging; `RUST_LOG` overrides the default `info` level.
/// Logs go to stderr so `--json` output stays machine-readable.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logger();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let result = match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Resolve {
            catalog,
            community,
            user,
            config,
            game_version,
            major_minor,
            json,
            lossy,
        } => run_resolve(ResolveArgs {
            catalog,
            community,
            user,
            config,
            game_version,
            major_minor,
            json,
            lossy,
        }),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

struct ResolveArgs {
    catalog: PathBuf,
    community: Option<PathBuf>,
    user: Option<PathBuf>,
    config: Option<PathBuf>,
    game_version: Option<String>,
    major_minor: bool,
    json: bool,
    lossy: bool,
}

fn validate(path: &Path) -> Result<ExitCode> {
    info!("Validating configuration file: {:?}", path);
    let config = ResolverConfig::load_from_file(path)?;
    config
        .validate()
        .context("Configuration validation failed")?;

    println!("✓ Configuration file is valid: {:?}", config);
    Ok(ExitCode::SUCCESS)
}

fn run_resolve(args: ResolveArgs) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::load_from_file(path)?,
        None => ResolverConfig::default(),
    };
    if let Some(version) = args.game_version {
        config.game_version = version;
    }
    config.validate().context("Invalid resolver configuration")?;
    if args.major_minor {
        config.game_version = major_minor(&config.game_version).with_context(|| {
            format!("Game version '{}' has no major.minor part", config.game_version)
        })?;
        debug!("Matching rules against game version {}", config.game_version);
    }

    let snapshot = CatalogSnapshot::load_from_file(&args.catalog)?;
    let catalog = if args.lossy {
        snapshot.into_catalog_lossy()
    } else {
        snapshot
            .into_catalog()
            .with_context(|| format!("Invalid catalog snapshot {:?}", args.catalog))?
    };

    let community = load_layer(args.community.as_deref(), RuleOrigin::Community)?;
    let user = load_layer(args.user.as_deref(), RuleOrigin::User)?;
    let sources = RuleSources::with_layers(&catalog, community, user)?;

    let report = resolve(&catalog, &sources, &config);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print!("{}", report);
    }

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Load an optional rules file; a missing path yields an empty layer
fn load_layer(path: Option<&Path>, origin: RuleOrigin) -> Result<RuleLayer> {
    let Some(path) = path else {
        return Ok(RuleLayer::new(origin));
    };
    let (layer, skipped) = load_rule_layer(path, origin)?;
    for duplicate in &skipped {
        warn!("{}", duplicate);
    }
    Ok(layer)
}
