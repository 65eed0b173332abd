//! Mod catalog snapshot
//!
//! The catalog is the engine's read-only view of every mod the host knows
//! about, in stable discovery order. Positions in that order double as arena
//! indices: the tie-break for every ordering decision further down the
//! pipeline is "earlier in the catalog wins".

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::CatalogError;
use crate::rules::Rule;
use crate::types::{RuleKind, RuleOrigin, SourceKind};

// ============================================================================
// Package Identifiers
// ============================================================================

/// Stable package identifier of a mod.
///
/// Identifiers are trimmed and ASCII-lowercased on construction, so
/// `Author.Mod` and `author.mod ` name the same package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PackageId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for PackageId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

// ============================================================================
// Mods
// ============================================================================

/// Hard-dependency list with optional per-game-version replacements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyList {
    /// Dependencies for every game version
    #[serde(default)]
    pub base: Vec<PackageId>,

    /// Version tag -> dependencies that replace `base` for that version
    #[serde(default)]
    pub by_version: BTreeMap<String, Vec<PackageId>>,
}

impl DependencyList {
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.by_version.values().all(Vec::is_empty)
    }
}

/// A unit of game content as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub id: PackageId,

    #[serde(default)]
    pub display_name: String,

    /// Identifiers this mod may stand in for when others depend on them
    #[serde(default)]
    pub alternative_ids: Vec<PackageId>,

    #[serde(default)]
    pub supported_versions: BTreeSet<String>,

    /// Rules from the mod's own manifest
    #[serde(default)]
    pub declared_rules: Vec<Rule>,

    #[serde(default)]
    pub dependencies: DependencyList,

    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub source_kind: SourceKind,
}

fn default_active() -> bool {
    true
}

impl Mod {
    /// Create an active local mod with no rules
    pub fn new(id: impl Into<PackageId>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            alternative_ids: Vec::new(),
            supported_versions: BTreeSet::new(),
            declared_rules: Vec::new(),
            dependencies: DependencyList::default(),
            is_active: true,
            source_kind: SourceKind::Local,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Mark the mod as present locally but not enabled
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_source(mut self, source_kind: SourceKind) -> Self {
        self.source_kind = source_kind;
        self
    }

    pub fn with_alternative_id(mut self, id: impl Into<PackageId>) -> Self {
        self.alternative_ids.push(id.into());
        self
    }

    pub fn supporting(mut self, version: impl Into<String>) -> Self {
        self.supported_versions.insert(version.into());
        self
    }

    /// Add a base manifest rule
    pub fn with_rule(mut self, kind: RuleKind, target: impl Into<PackageId>) -> Self {
        let rule = Rule::new(self.id.clone(), target, kind, RuleOrigin::Manifest);
        self.declared_rules.push(rule);
        self
    }

    /// Add a manifest rule that only applies to one game version
    pub fn with_scoped_rule(
        mut self,
        kind: RuleKind,
        target: impl Into<PackageId>,
        version: impl Into<String>,
    ) -> Self {
        let rule = Rule::new(self.id.clone(), target, kind, RuleOrigin::Manifest).scoped(version);
        self.declared_rules.push(rule);
        self
    }

    /// Pin the mod through its own manifest
    pub fn pinned(self, kind: RuleKind) -> Self {
        let id = self.id.clone();
        self.with_rule(kind, id)
    }

    pub fn with_dependency(mut self, dependency: impl Into<PackageId>) -> Self {
        self.dependencies.base.push(dependency.into());
        self
    }

    pub fn with_scoped_dependency(
        mut self,
        dependency: impl Into<PackageId>,
        version: impl Into<String>,
    ) -> Self {
        self.dependencies
            .by_version
            .entry(version.into())
            .or_default()
            .push(dependency.into());
        self
    }

    /// Check whether this mod may stand in for `id`
    pub fn provides(&self, id: &PackageId) -> bool {
        self.alternative_ids.iter().any(|alt| alt == id)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Ordered, id-indexed snapshot of every known mod
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    mods: Vec<Mod>,
    index: HashMap<PackageId, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate ids
    pub fn new(mods: Vec<Mod>) -> Result<Self, CatalogError> {
        let (catalog, errors) = Self::from_mods_lossy(mods);
        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(catalog),
        }
    }

    /// Build a catalog, skipping offending entries and keeping the first
    /// occurrence of every id
    pub fn from_mods_lossy(mods: Vec<Mod>) -> (Self, Vec<CatalogError>) {
        let mut kept = Vec::with_capacity(mods.len());
        let mut index = HashMap::with_capacity(mods.len());
        // input positions, so error messages point into what the caller passed
        let mut first_seen: HashMap<PackageId, usize> = HashMap::with_capacity(mods.len());
        let mut errors = Vec::new();

        for (position, m) in mods.into_iter().enumerate() {
            if m.id.is_empty() {
                errors.push(CatalogError::EmptyId { position });
                continue;
            }
            if let Some(&first) = first_seen.get(&m.id) {
                errors.push(CatalogError::DuplicateId {
                    id: m.id.clone(),
                    first,
                    second: position,
                });
                continue;
            }
            first_seen.insert(m.id.clone(), position);
            index.insert(m.id.clone(), kept.len());
            kept.push(m);
        }

        (Self { mods: kept, index }, errors)
    }

    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn get(&self, id: &PackageId) -> Option<&Mod> {
        self.index.get(id).map(|&i| &self.mods[i])
    }

    /// Catalog position of a mod
    pub fn position(&self, id: &PackageId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_active(&self, id: &PackageId) -> bool {
        self.get(id).is_some_and(|m| m.is_active)
    }

    /// Active mods in catalog order
    pub fn active(&self) -> impl Iterator<Item = &Mod> {
        self.mods.iter().filter(|m| m.is_active)
    }

    /// Mods listing `id` among their alternative ids, in catalog order
    pub fn providers_of<'a>(&'a self, id: &'a PackageId) -> impl Iterator<Item = &'a Mod> + 'a {
        self.mods.iter().filter(move |m| m.provides(id))
    }
}
