//! Rule records and the three rule layers
//!
//! Rules come from three places with different trust levels:
//!
//! | Layer     | Source                         | Mutable by caller |
//! |-----------|--------------------------------|-------------------|
//! | Manifest  | each mod's own manifest        | no                |
//! | Community | shared curated rules file      | yes               |
//! | User      | local user-editable rules file | yes               |
//!
//! The Manifest layer is derived from the catalog and only ever handed out
//! by shared reference. Community and User layers accept edits between
//! resolution runs; edits never touch the Manifest layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::catalog::{Catalog, PackageId};
use crate::error::RuleError;
use crate::types::{RuleKind, RuleOrigin};

/// A single ordering/compatibility declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Mod the rule is attached to
    pub subject_id: PackageId,

    /// Mod (or alternative id) the rule refers to; the subject itself for pins
    #[serde(default)]
    pub target_id: PackageId,

    pub kind: RuleKind,

    #[serde(default = "default_origin")]
    pub origin: RuleOrigin,

    /// Game version this rule applies to; `None` means every version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_scope: Option<String>,
}

fn default_origin() -> RuleOrigin {
    RuleOrigin::User
}

impl Rule {
    pub fn new(
        subject: impl Into<PackageId>,
        target: impl Into<PackageId>,
        kind: RuleKind,
        origin: RuleOrigin,
    ) -> Self {
        Self {
            subject_id: subject.into(),
            target_id: target.into(),
            kind,
            origin,
            version_scope: None,
        }
    }

    /// Pin rule; the target is the subject itself
    pub fn pin(subject: impl Into<PackageId>, kind: RuleKind, origin: RuleOrigin) -> Self {
        let subject = subject.into();
        Self::new(subject.clone(), subject, kind, origin)
    }

    /// Restrict the rule to one game version
    pub fn scoped(mut self, version: impl Into<String>) -> Self {
        self.version_scope = Some(version.into());
        self
    }

    /// Identity used for duplicate detection within a layer
    pub fn key(&self) -> (&PackageId, &PackageId, RuleKind) {
        (&self.subject_id, &self.target_id, self.kind)
    }

    fn validate(&self) -> Result<(), RuleError> {
        if self.subject_id.is_empty() {
            return Err(RuleError::EmptySubject);
        }
        if self.target_id.is_empty() && !self.kind.is_pin() {
            return Err(RuleError::EmptyTarget {
                subject: self.subject_id.clone(),
                kind: self.kind,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_pin() {
            write!(f, "{} {}", self.subject_id, self.kind)?;
        } else {
            write!(f, "{} {} {}", self.subject_id, self.kind, self.target_id)?;
        }
        if let Some(scope) = &self.version_scope {
            write!(f, " @{}", scope)?;
        }
        Ok(())
    }
}

// ============================================================================
// Duplicate Notifications
// ============================================================================

/// A rule that was not added because its layer already holds the same
/// (subject, target, kind) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRule {
    pub subject_id: PackageId,
    pub target_id: PackageId,
    pub kind: RuleKind,
    pub origin: RuleOrigin,
}

impl From<&Rule> for DuplicateRule {
    fn from(rule: &Rule) -> Self {
        Self {
            subject_id: rule.subject_id.clone(),
            target_id: rule.target_id.clone(),
            kind: rule.kind,
            origin: rule.origin,
        }
    }
}

impl fmt::Display for DuplicateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Skipped duplicate {} rule: {} {} {}",
            self.origin, self.subject_id, self.kind, self.target_id
        )
    }
}

/// Result of adding a rule to a mutable layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    SkippedDuplicate(DuplicateRule),
}

// ============================================================================
// Rule Layers
// ============================================================================

/// Ordered rules of a single origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLayer {
    origin: RuleOrigin,
    rules: Vec<Rule>,
}

impl RuleLayer {
    pub fn new(origin: RuleOrigin) -> Self {
        Self {
            origin,
            rules: Vec::new(),
        }
    }

    /// Build a mutable layer from loaded rules, collecting skipped duplicates
    pub fn from_rules(
        origin: RuleOrigin,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Result<(Self, Vec<DuplicateRule>), RuleError> {
        let mut layer = Self::new(origin);
        let skipped = layer.extend(rules)?;
        Ok((layer, skipped))
    }

    /// Manifest layer derived from every mod's declared rules.
    ///
    /// Subject and origin are taken from the owning mod, whatever the
    /// snapshot claimed. Manifest rules are not de-duplicated: the same
    /// triple may legitimately appear once per version scope.
    fn manifest(catalog: &Catalog) -> Self {
        let mut rules = Vec::new();
        for m in catalog.mods() {
            for declared in &m.declared_rules {
                let mut rule = declared.clone();
                if rule.subject_id != m.id || rule.origin != RuleOrigin::Manifest {
                    debug!("Normalizing manifest rule '{}' onto mod {}", rule, m.id);
                    rule.subject_id = m.id.clone();
                    rule.origin = RuleOrigin::Manifest;
                }
                if rule.kind.is_pin() && rule.target_id.is_empty() {
                    rule.target_id = m.id.clone();
                }
                if let Err(e) = rule.validate() {
                    warn!("Ignoring manifest rule on {}: {}", m.id, e);
                    continue;
                }
                rules.push(rule);
            }
        }
        Self {
            origin: RuleOrigin::Manifest,
            rules,
        }
    }

    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, subject: &PackageId, target: &PackageId, kind: RuleKind) -> bool {
        self.rules.iter().any(|r| r.key() == (subject, target, kind))
    }

    /// Rules attached to `subject`, in layer order
    pub fn rules_for<'a>(&'a self, subject: &'a PackageId) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| &r.subject_id == subject)
    }

    /// Add a rule; an existing (subject, target, kind) triple makes this a no-op
    pub fn add(&mut self, mut rule: Rule) -> Result<AddOutcome, RuleError> {
        if !self.origin.is_mutable() {
            return Err(RuleError::ReadOnlyLayer);
        }
        if rule.origin != self.origin {
            return Err(RuleError::OriginMismatch {
                layer: self.origin,
                rule_origin: rule.origin,
            });
        }
        if rule.kind.is_pin() && rule.target_id.is_empty() {
            rule.target_id = rule.subject_id.clone();
        }
        rule.validate()?;

        if self.contains(&rule.subject_id, &rule.target_id, rule.kind) {
            debug!("Skipping duplicate {} rule: {}", self.origin, rule);
            return Ok(AddOutcome::SkippedDuplicate(DuplicateRule::from(&rule)));
        }

        self.rules.push(rule);
        Ok(AddOutcome::Added)
    }

    /// Add several rules; returns the duplicates that were skipped.
    ///
    /// Stops at the first invalid rule, keeping the ones added before it.
    pub fn extend(
        &mut self,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Result<Vec<DuplicateRule>, RuleError> {
        let mut skipped = Vec::new();
        for rule in rules {
            if let AddOutcome::SkippedDuplicate(dup) = self.add(rule)? {
                skipped.push(dup);
            }
        }
        Ok(skipped)
    }

    /// Remove every rule matching the triple. Returns whether anything was removed.
    pub fn remove(&mut self, subject: &PackageId, target: &PackageId, kind: RuleKind) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.key() != (subject, target, kind));
        before != self.rules.len()
    }
}

// ============================================================================
// Rule Sources
// ============================================================================

/// The three rule layers, in precedence order
#[derive(Debug, Clone)]
pub struct RuleSources {
    manifest: RuleLayer,
    community: RuleLayer,
    user: RuleLayer,
}

impl RuleSources {
    /// Manifest rules from the catalog, empty Community and User layers
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            manifest: RuleLayer::manifest(catalog),
            community: RuleLayer::new(RuleOrigin::Community),
            user: RuleLayer::new(RuleOrigin::User),
        }
    }

    /// Manifest rules from the catalog plus caller-supplied layers
    pub fn with_layers(
        catalog: &Catalog,
        community: RuleLayer,
        user: RuleLayer,
    ) -> Result<Self, RuleError> {
        for (expected, layer) in [(RuleOrigin::Community, &community), (RuleOrigin::User, &user)] {
            if layer.origin() != expected {
                return Err(RuleError::OriginMismatch {
                    layer: expected,
                    rule_origin: layer.origin(),
                });
            }
        }
        Ok(Self {
            manifest: RuleLayer::manifest(catalog),
            community,
            user,
        })
    }

    /// Re-derive the Manifest layer after the catalog changed, keeping the
    /// Community and User layers as they are
    pub fn refresh_manifest(&mut self, catalog: &Catalog) {
        self.manifest = RuleLayer::manifest(catalog);
    }

    pub fn manifest(&self) -> &RuleLayer {
        &self.manifest
    }

    pub fn community(&self) -> &RuleLayer {
        &self.community
    }

    pub fn user(&self) -> &RuleLayer {
        &self.user
    }

    pub fn community_mut(&mut self) -> &mut RuleLayer {
        &mut self.community
    }

    pub fn user_mut(&mut self) -> &mut RuleLayer {
        &mut self.user
    }

    pub fn layer(&self, origin: RuleOrigin) -> &RuleLayer {
        match origin {
            RuleOrigin::Manifest => &self.manifest,
            RuleOrigin::Community => &self.community,
            RuleOrigin::User => &self.user,
        }
    }

    /// Mutable access to an editable layer
    pub fn layer_mut(&mut self, origin: RuleOrigin) -> Result<&mut RuleLayer, RuleError> {
        match origin {
            RuleOrigin::Manifest => Err(RuleError::ReadOnlyLayer),
            RuleOrigin::Community => Ok(&mut self.community),
            RuleOrigin::User => Ok(&mut self.user),
        }
    }

    /// Layers in precedence order: Manifest, Community, User
    pub fn layers(&self) -> [&RuleLayer; 3] {
        [&self.manifest, &self.community, &self.user]
    }

    /// Route a rule to the layer named by its origin
    pub fn add(&mut self, rule: Rule) -> Result<AddOutcome, RuleError> {
        self.layer_mut(rule.origin)?.add(rule)
    }
}
