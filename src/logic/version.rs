//! Version Tag Resolver
//!
//! Collapses a mod's base rules and its version-scoped rules into the single
//! list per rule kind that applies to the targeted game version.
//!
//! # Resolution Rules
//!
//! | Scoped list for target | Result            |
//! |------------------------|-------------------|
//! | present, non-empty     | scoped list only  |
//! | present, empty         | base list         |
//! | absent                 | base list         |
//!
//! Matching is exact (after trimming); there is no range or prefix matching.
//! A scope that is not a well-formed version tag never matches and is
//! reported as a configuration conflict.

use std::collections::BTreeMap;
use tracing::trace;

use crate::catalog::{DependencyList, PackageId};
use crate::diagnostics::Diagnostic;
use crate::rules::Rule;
use crate::types::{RuleKind, RuleOrigin};

/// Check if `tag` looks like a game version tag: dot-separated numeric
/// components such as `1.4` or `1.5.4104`
pub fn is_version_tag(tag: &str) -> bool {
    let tag = tag.trim();
    !tag.is_empty()
        && tag
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Reduce a full game build string to the `major.minor` tag mods declare.
///
/// `"1.5.4104 rev435"` becomes `"1.5"`. Returns `None` when the string does
/// not start with at least two numeric components.
pub fn major_minor(game_version: &str) -> Option<String> {
    let build = game_version.split_whitespace().next()?;
    let mut parts = build.split('.');
    let major = parts.next().filter(|p| is_version_tag(p))?;
    let minor = parts.next().filter(|p| is_version_tag(p))?;
    Some(format!("{}.{}", major, minor))
}

/// Per-version rule collapsing for one target game version
#[derive(Debug, Clone, Copy)]
pub struct VersionTagResolver<'a> {
    target: &'a str,
}

impl<'a> VersionTagResolver<'a> {
    pub fn new(target_version: &'a str) -> Self {
        Self {
            target: target_version.trim(),
        }
    }

    pub fn target(&self) -> &str {
        self.target
    }

    /// Exact match of a scope string against the target version
    pub fn matches(&self, scope: &str) -> bool {
        is_version_tag(scope) && scope.trim() == self.target
    }

    /// Resolve one layer's rules for one mod into a target list per kind.
    ///
    /// Every kind is resolved independently: a mod may override `LoadAfter`
    /// for a version and keep its base `LoadBefore`.
    pub fn resolve_rules<'r>(
        &self,
        subject: &PackageId,
        origin: RuleOrigin,
        rules: impl IntoIterator<Item = &'r Rule>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> BTreeMap<RuleKind, Vec<PackageId>> {
        let mut base: BTreeMap<RuleKind, Vec<PackageId>> = BTreeMap::new();
        let mut scoped: BTreeMap<RuleKind, Vec<PackageId>> = BTreeMap::new();

        for rule in rules {
            match rule.version_scope.as_deref() {
                None => base.entry(rule.kind).or_default().push(rule.target_id.clone()),
                Some(scope) if self.matches(scope) => {
                    scoped.entry(rule.kind).or_default().push(rule.target_id.clone())
                }
                Some(scope) => {
                    self.note_scope(subject, scope, origin, diagnostics);
                }
            }
        }

        for (kind, targets) in scoped {
            if !targets.is_empty() {
                trace!(
                    "{}: {} {} rules replaced by version {} override",
                    subject, origin, kind, self.target
                );
                base.insert(kind, targets);
            }
        }

        base
    }

    /// Resolve a mod's hard-dependency list for the target version
    pub fn resolve_dependencies(
        &self,
        subject: &PackageId,
        dependencies: &DependencyList,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<PackageId> {
        let mut chosen = &dependencies.base;
        for (scope, list) in &dependencies.by_version {
            if self.matches(scope) {
                if !list.is_empty() {
                    chosen = list;
                }
            } else {
                self.note_scope(subject, scope, RuleOrigin::Manifest, diagnostics);
            }
        }
        chosen.clone()
    }

    fn note_scope(
        &self,
        subject: &PackageId,
        scope: &str,
        origin: RuleOrigin,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if is_version_tag(scope) {
            return;
        }
        let diagnostic = Diagnostic::UnrecognizedVersionScope {
            mod_id: subject.clone(),
            scope: scope.to_string(),
            origin,
        };
        if !diagnostics.contains(&diagnostic) {
            diagnostics.push(diagnostic);
        }
    }
}
