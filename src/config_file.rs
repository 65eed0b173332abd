//! Configuration file handling for resolver settings.
//!
//! Policy switches are type-safe enums (see `types`), so a typo in a config
//! file fails at parse time instead of silently selecting a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logic::version::is_version_tag;
use crate::types::{CyclePolicy, IncompatibilityPolicy, PinOrder};

/// Game version assumed when nothing else is configured
pub const DEFAULT_GAME_VERSION: &str = "1.5";

/// Settings for one resolution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Targeted game version; version scopes must equal it exactly
    pub game_version: String,

    // Policies
    pub pin_order: PinOrder,
    pub cycle_policy: CyclePolicy,
    pub incompatibility_policy: IncompatibilityPolicy,

    /// Treat every satisfied hard dependency as a load-after rule
    pub dependencies_imply_order: bool,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game_version(mut self, game_version: impl Into<String>) -> Self {
        self.game_version = game_version.into();
        self
    }

    /// The version string scopes are matched against, exactly as configured
    /// apart from surrounding whitespace. Hosts that want `1.5` rules to apply
    /// on build `1.5.4104` reduce the version with `major_minor` first.
    pub fn target_tag(&self) -> &str {
        self.game_version.trim()
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize resolver configuration to JSON")?;

        fs::write(&path, json).with_context(|| {
            format!("Failed to write resolver configuration to {:?}", path.as_ref())
        })?;

        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read resolver configuration from {:?}", path.as_ref())
        })?;

        let config: Self = serde_json::from_str(&content)
            .context("Failed to parse resolver configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let version = self.game_version.trim();
        if version.is_empty() {
            anyhow::bail!("Game version must be specified");
        }

        let build = version.split_whitespace().next().unwrap_or_default();
        if !is_version_tag(build) {
            anyhow::bail!(
                "Game version '{}' must start with dot-separated numbers like 1.5",
                version
            );
        }

        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            game_version: DEFAULT_GAME_VERSION.to_string(),
            pin_order: PinOrder::default(),
            cycle_policy: CyclePolicy::default(),
            incompatibility_policy: IncompatibilityPolicy::default(),
            dependencies_imply_order: false,
        }
    }
}
