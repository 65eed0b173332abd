//! Snapshot files consumed by the command-line host.
//!
//! The engine never touches the file system. These helpers turn the JSON the
//! host writes (an already-normalized catalog and one rules file per mutable
//! layer) into engine inputs.
//!
//! # Formats
//!
//! | File           | Shape                                  |
//! |----------------|----------------------------------------|
//! | catalog        | `{"format_version": 1, "mods": [Mod]}` |
//! | community/user | `[Rule]`                               |

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::{Catalog, Mod};
use crate::error::{LoadOrderError, Result};
use crate::rules::{DuplicateRule, Rule, RuleLayer};
use crate::types::RuleOrigin;

/// Newest catalog snapshot format this crate reads
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Catalog as written by the host's mod scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    #[serde(default)]
    pub mods: Vec<Mod>,
}

fn default_format_version() -> u32 {
    SNAPSHOT_FORMAT_VERSION
}

impl CatalogSnapshot {
    pub fn new(mods: Vec<Mod>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            mods,
        }
    }

    /// Parse a snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(LoadOrderError::config(format!(
                "catalog snapshot format {} is newer than supported format {}",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog snapshot from {:?}", path.as_ref()))?;

        let snapshot = Self::from_json(&content)
            .with_context(|| format!("Failed to parse catalog snapshot {:?}", path.as_ref()))?;

        debug!("Loaded {} mods from {:?}", snapshot.mods.len(), path.as_ref());
        Ok(snapshot)
    }

    /// Save the snapshot as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AnyResult<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize catalog snapshot to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write catalog snapshot to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Build the catalog, rejecting duplicate or empty ids
    pub fn into_catalog(self) -> Result<Catalog> {
        Ok(Catalog::new(self.mods)?)
    }

    /// Build the catalog, skipping offending entries with a warning
    pub fn into_catalog_lossy(self) -> Catalog {
        let (catalog, errors) = Catalog::from_mods_lossy(self.mods);
        for error in &errors {
            warn!("Skipping catalog entry: {}", error);
        }
        catalog
    }
}

/// Parse a rules file for one mutable layer.
///
/// Every rule takes the layer's origin, whatever the file says. Duplicates
/// are skipped and returned for the host to display.
pub fn parse_rule_layer(json: &str, origin: RuleOrigin) -> Result<(RuleLayer, Vec<DuplicateRule>)> {
    let mut rules: Vec<Rule> = serde_json::from_str(json)?;
    for rule in &mut rules {
        rule.origin = origin;
    }
    Ok(RuleLayer::from_rules(origin, rules)?)
}

/// Load a rules file for one mutable layer
pub fn load_rule_layer<P: AsRef<Path>>(
    path: P,
    origin: RuleOrigin,
) -> AnyResult<(RuleLayer, Vec<DuplicateRule>)> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} rules from {:?}", origin, path.as_ref()))?;

    let (layer, skipped) = parse_rule_layer(&content, origin)
        .with_context(|| format!("Failed to load {} rules from {:?}", origin, path.as_ref()))?;

    debug!(
        "Loaded {} {} rules from {:?} ({} duplicates skipped)",
        layer.len(),
        origin,
        path.as_ref(),
        skipped.len()
    );
    Ok((layer, skipped))
}
