use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// loadorder - resolve a deterministic mod load order
#[derive(Parser)]
#[command(name = "loadorder")]
#[command(about = "Resolve mod load order from a catalog snapshot and rule files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the load order for a catalog snapshot
    Resolve {
        /// Catalog snapshot (JSON)
        catalog: PathBuf,

        /// Community rules file (JSON list of rules)
        #[arg(long)]
        community: Option<PathBuf>,

        /// User rules file (JSON list of rules)
        #[arg(long)]
        user: Option<PathBuf>,

        /// Resolver configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target game version, overrides the configuration file
        #[arg(short, long)]
        game_version: Option<String>,

        /// Match rules against the `major.minor` part of the game version
        /// (`1.5.4104 rev435` becomes `1.5`)
        #[arg(long)]
        major_minor: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Skip duplicate or empty catalog ids instead of failing
        #[arg(long)]
        lossy: bool,
    },
    /// Validate a resolver configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
