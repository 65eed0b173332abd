//! Rule Aggregator
//!
//! Merges the three rule layers into one effective rule table per mod.
//!
//! # Policy
//!
//! 1. Each layer is version-resolved on its own (a Manifest override for
//!    the target version does not suppress a User base rule)
//! 2. Lists are concatenated Manifest → Community → User
//! 3. Duplicate targets keep their first occurrence, so the most
//!    authoritative layer decides a target's position
//!
//! Targets naming mods outside the catalog are kept. The graph builder is
//! the only place that filters by activity.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::{Catalog, Mod, PackageId};
use crate::diagnostics::Diagnostic;
use crate::logic::version::VersionTagResolver;
use crate::rules::{Rule, RuleSources};
use crate::types::{PinSide, RuleKind, RuleOrigin};

/// A rule target together with the layer that contributed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub id: PackageId,
    pub origin: RuleOrigin,
}

/// Rules that apply to one mod for the targeted game version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRuleSet {
    pub mod_id: PackageId,
    rules: BTreeMap<RuleKind, Vec<RuleTarget>>,
    /// Hard dependencies after version resolution (Manifest only)
    pub dependencies: Vec<PackageId>,
}

impl EffectiveRuleSet {
    pub fn new(mod_id: PackageId) -> Self {
        Self {
            mod_id,
            rules: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// Targets of one kind, in merge order
    pub fn targets(&self, kind: RuleKind) -> &[RuleTarget] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Target ids of one kind, in merge order
    pub fn target_ids(&self, kind: RuleKind) -> Vec<&PackageId> {
        self.targets(kind).iter().map(|t| &t.id).collect()
    }

    /// Origins of every pin on the given side
    pub fn pin_origins(&self, side: PinSide) -> Vec<RuleOrigin> {
        let kind = match side {
            PinSide::Top => RuleKind::ForceLoadTop,
            PinSide::Bottom => RuleKind::ForceLoadBottom,
        };
        self.targets(kind).iter().map(|t| t.origin).collect()
    }

    pub fn is_pinned(&self, side: PinSide) -> bool {
        !self.pin_origins(side).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty) && self.dependencies.is_empty()
    }
}

/// Concatenate per-origin lists in precedence order, keeping the first
/// occurrence of every target
pub fn merge_targets(
    layers: impl IntoIterator<Item = (RuleOrigin, Vec<PackageId>)>,
) -> Vec<RuleTarget> {
    let mut merged: Vec<RuleTarget> = Vec::new();
    for (origin, targets) in layers {
        for id in targets {
            if !merged.iter().any(|t| t.id == id) {
                merged.push(RuleTarget { id, origin });
            }
        }
    }
    merged
}

/// Builds effective rule sets from the rule layers
pub struct RuleAggregator<'a> {
    resolver: VersionTagResolver<'a>,
    /// Per layer (precedence order): subject -> rules in layer order
    by_subject: Vec<(RuleOrigin, HashMap<&'a PackageId, Vec<&'a Rule>>)>,
}

impl<'a> RuleAggregator<'a> {
    pub fn new(sources: &'a RuleSources, resolver: VersionTagResolver<'a>) -> Self {
        let by_subject = sources
            .layers()
            .into_iter()
            .map(|layer| {
                let mut index: HashMap<&PackageId, Vec<&Rule>> = HashMap::new();
                for rule in layer.rules() {
                    index.entry(&rule.subject_id).or_default().push(rule);
                }
                (layer.origin(), index)
            })
            .collect();

        Self {
            resolver,
            by_subject,
        }
    }

    /// Effective rules for a single mod
    pub fn effective_for(&self, m: &Mod, diagnostics: &mut Vec<Diagnostic>) -> EffectiveRuleSet {
        let mut per_kind: BTreeMap<RuleKind, Vec<(RuleOrigin, Vec<PackageId>)>> = BTreeMap::new();

        for (origin, index) in &self.by_subject {
            let Some(rules) = index.get(&m.id) else {
                continue;
            };
            let resolved = self.resolver.resolve_rules(
                &m.id,
                *origin,
                rules.iter().copied(),
                diagnostics,
            );
            for (kind, targets) in resolved {
                per_kind.entry(kind).or_default().push((*origin, targets));
            }
        }

        let mut set = EffectiveRuleSet::new(m.id.clone());
        for (kind, layers) in per_kind {
            let merged = merge_targets(layers);
            if !merged.is_empty() {
                set.rules.insert(kind, merged);
            }
        }
        set.dependencies = self
            .resolver
            .resolve_dependencies(&m.id, &m.dependencies, diagnostics);
        set
    }

    /// Effective rules for every active mod, in catalog order
    pub fn aggregate(
        &self,
        catalog: &Catalog,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<EffectiveRuleSet> {
        catalog
            .active()
            .map(|m| self.effective_for(m, diagnostics))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;

    fn id(raw: &str) -> PackageId {
        PackageId::new(raw)
    }

    fn sources_with(catalog: &Catalog, community: Vec<Rule>, user: Vec<Rule>) -> RuleSources {
        let mut sources = RuleSources::from_catalog(catalog);
        sources.community_mut().extend(community).unwrap();
        sources.user_mut().extend(user).unwrap();
        sources
    }

    #[test]
    fn test_merge_keeps_first_occurrence() {
        let merged = merge_targets(vec![
            (RuleOrigin::Manifest, vec![id("a"), id("b")]),
            (RuleOrigin::Community, vec![id("b"), id("c")]),
            (RuleOrigin::User, vec![id("a"), id("d")]),
        ]);

        let ids: Vec<&str> = merged.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(merged[1].origin, RuleOrigin::Manifest);
        assert_eq!(merged[3].origin, RuleOrigin::User);
    }

    #[test]
    fn test_layers_merge_in_precedence_order() {
        let catalog = Catalog::new(vec![Mod::new("m").with_rule(RuleKind::LoadAfter, "x")]).unwrap();
        let sources = sources_with(
            &catalog,
            vec![Rule::new("m", "y", RuleKind::LoadAfter, RuleOrigin::Community)],
            vec![
                Rule::new("m", "x", RuleKind::LoadAfter, RuleOrigin::User),
                Rule::new("m", "z", RuleKind::LoadAfter, RuleOrigin::User),
            ],
        );
        let aggregator = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"));
        let mut diags = Vec::new();
        let set = aggregator.effective_for(&catalog.mods()[0], &mut diags);

        assert_eq!(set.target_ids(RuleKind::LoadAfter), vec![&id("x"), &id("y"), &id("z")]);
        assert_eq!(set.targets(RuleKind::LoadAfter)[0].origin, RuleOrigin::Manifest);
        assert!(set.targets(RuleKind::LoadBefore).is_empty());
    }

    #[test]
    fn test_version_resolution_is_per_layer() {
        let catalog = Catalog::new(vec![
            Mod::new("m")
                .with_rule(RuleKind::LoadAfter, "x")
                .with_scoped_rule(RuleKind::LoadAfter, "y", "1.5"),
        ])
        .unwrap();
        let sources = sources_with(
            &catalog,
            vec![],
            vec![Rule::new("m", "u", RuleKind::LoadAfter, RuleOrigin::User)],
        );
        let aggregator = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"));
        let mut diags = Vec::new();
        let set = aggregator.effective_for(&catalog.mods()[0], &mut diags);

        assert_eq!(set.target_ids(RuleKind::LoadAfter), vec![&id("y"), &id("u")]);
    }

    #[test]
    fn test_rules_for_unknown_mods_are_retained() {
        let catalog = Catalog::new(vec![Mod::new("m")]).unwrap();
        let sources = sources_with(
            &catalog,
            vec![Rule::new("m", "not.installed", RuleKind::LoadBefore, RuleOrigin::Community)],
            vec![],
        );
        let aggregator = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"));
        let mut diags = Vec::new();
        let set = aggregator.effective_for(&catalog.mods()[0], &mut diags);

        assert_eq!(set.target_ids(RuleKind::LoadBefore), vec![&id("not.installed")]);
    }

    #[test]
    fn test_pin_origins() {
        let catalog = Catalog::new(vec![Mod::new("m").pinned(RuleKind::ForceLoadTop)]).unwrap();
        let sources = sources_with(
            &catalog,
            vec![],
            vec![Rule::pin("m", RuleKind::ForceLoadBottom, RuleOrigin::User)],
        );
        let aggregator = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"));
        let mut diags = Vec::new();
        let set = aggregator.effective_for(&catalog.mods()[0], &mut diags);

        assert_eq!(set.pin_origins(PinSide::Top), vec![RuleOrigin::Manifest]);
        assert_eq!(set.pin_origins(PinSide::Bottom), vec![RuleOrigin::User]);
    }

    #[test]
    fn test_aggregate_covers_active_mods_only() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_dependency("core"),
            Mod::new("b").inactive(),
            Mod::new("c"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let aggregator = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"));
        let mut diags = Vec::new();
        let sets = aggregator.aggregate(&catalog, &mut diags);

        let ids: Vec<&str> = sets.iter().map(|s| s.mod_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(sets[0].dependencies, vec![id("core")]);
        assert!(sets[1].is_empty());
    }
}
