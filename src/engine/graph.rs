//! Constraint Graph Builder
//!
//! Turns effective rule sets into a directed graph over the active mods,
//! plus the constraint sets that are not edges (pins, incompatibilities).
//!
//! # Translation Rules
//!
//! | Rule                   | Result                                  |
//! |------------------------|-----------------------------------------|
//! | `A LoadAfter B`        | edge `B → A`                            |
//! | `A LoadBefore B`       | edge `A → B`                            |
//! | `A IncompatibleWith B` | unordered pair `(A, B)`                 |
//! | `A ForceLoadTop`       | `A` in `pinned_top`                     |
//! | `A ForceLoadBottom`    | `A` in `pinned_bottom`                  |
//!
//! This is the single place that filters by activity: a rule whose other end
//! is not an active mod produces nothing. Nodes are arena indices in catalog
//! order, so the lowest index is always the earliest mod in the catalog.

use std::collections::{BTreeSet, HashMap};
use tracing::trace;

use crate::catalog::{Catalog, PackageId};
use crate::diagnostics::Diagnostic;
use crate::logic::aggregate::EffectiveRuleSet;
use crate::logic::dependencies::DependencyCheck;
use crate::types::{PinSide, RuleKind, RuleOrigin};

/// Directed "must load before" graph over active mods
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    nodes: Vec<PackageId>,
    index: HashMap<PackageId, usize>,
    /// Alternative id -> first active mod providing it
    alternatives: HashMap<PackageId, usize>,
    successors: Vec<BTreeSet<usize>>,
    pins: Vec<Option<PinSide>>,
    incompatibilities: BTreeSet<(usize, usize)>,
}

impl ConstraintGraph {
    /// Graph with one node per active catalog mod and no constraints
    pub fn new(catalog: &Catalog) -> Self {
        let nodes: Vec<PackageId> = catalog.active().map(|m| m.id.clone()).collect();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut alternatives = HashMap::new();
        for (i, m) in catalog.active().enumerate() {
            for alt in &m.alternative_ids {
                alternatives.entry(alt.clone()).or_insert(i);
            }
        }

        Self {
            successors: vec![BTreeSet::new(); nodes.len()],
            pins: vec![None; nodes.len()],
            nodes,
            index,
            alternatives,
            incompatibilities: BTreeSet::new(),
        }
    }

    /// Build the full graph from every active mod's effective rules.
    ///
    /// With `dependency_checks`, each dependency satisfied by an active mod
    /// also becomes an edge from the provider to the dependent.
    pub fn build(
        catalog: &Catalog,
        rule_sets: &[EffectiveRuleSet],
        dependency_checks: Option<&[DependencyCheck]>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut graph = Self::new(catalog);

        for set in rule_sets {
            let Some(subject) = graph.node(&set.mod_id) else {
                continue;
            };
            graph.add_ordering(subject, set, diagnostics);
            graph.add_incompatibilities(subject, set, diagnostics);
            graph.add_pins(subject, set, diagnostics);
        }

        if let Some(checks) = dependency_checks {
            for check in checks {
                let provider = check
                    .satisfaction
                    .active_provider(&check.dependency)
                    .and_then(|id| graph.node(id));
                let dependent = graph.node(&check.dependent);
                if let (Some(provider), Some(dependent)) = (provider, dependent) {
                    if provider != dependent {
                        graph.add_edge(provider, dependent);
                    }
                }
            }
        }

        graph
    }

    fn add_ordering(
        &mut self,
        subject: usize,
        set: &EffectiveRuleSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for kind in [RuleKind::LoadAfter, RuleKind::LoadBefore] {
            for target in set.targets(kind) {
                let Some(other) = self.resolve_target(&target.id) else {
                    trace!("{}: {} {} is not active, rule dropped", set.mod_id, kind, target.id);
                    continue;
                };
                if other == subject {
                    self.note_self_reference(subject, kind, diagnostics);
                    continue;
                }
                match kind {
                    RuleKind::LoadAfter => self.add_edge(other, subject),
                    _ => self.add_edge(subject, other),
                };
            }
        }
    }

    fn add_incompatibilities(
        &mut self,
        subject: usize,
        set: &EffectiveRuleSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for target in set.targets(RuleKind::IncompatibleWith) {
            let Some(other) = self.resolve_target(&target.id) else {
                continue;
            };
            if other == subject {
                self.note_self_reference(subject, RuleKind::IncompatibleWith, diagnostics);
                continue;
            }
            self.incompatibilities
                .insert((subject.min(other), subject.max(other)));
        }
    }

    /// Pin the subject; a mod pinned to both ends goes to the side its
    /// Manifest names, or to the bottom when that does not decide it
    fn add_pins(
        &mut self,
        subject: usize,
        set: &EffectiveRuleSet,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let top = set.pin_origins(PinSide::Top);
        let bottom = set.pin_origins(PinSide::Bottom);

        self.pins[subject] = match (top.is_empty(), bottom.is_empty()) {
            (true, true) => None,
            (false, true) => Some(PinSide::Top),
            (true, false) => Some(PinSide::Bottom),
            (false, false) => {
                let manifest_top = top.contains(&RuleOrigin::Manifest);
                let manifest_bottom = bottom.contains(&RuleOrigin::Manifest);
                let (resolved, by_manifest) = match (manifest_top, manifest_bottom) {
                    (true, false) => (PinSide::Top, true),
                    (false, true) => (PinSide::Bottom, true),
                    _ => (PinSide::Bottom, false),
                };
                diagnostics.push(Diagnostic::PinConflict {
                    mod_id: self.nodes[subject].clone(),
                    resolved,
                    by_manifest,
                });
                Some(resolved)
            }
        };
    }

    fn note_self_reference(&self, node: usize, kind: RuleKind, diagnostics: &mut Vec<Diagnostic>) {
        let diagnostic = Diagnostic::SelfReference {
            mod_id: self.nodes[node].clone(),
            kind,
        };
        if !diagnostics.contains(&diagnostic) {
            diagnostics.push(diagnostic);
        }
    }

    /// Active node for a rule target: exact id first, then alternative id
    fn resolve_target(&self, target: &PackageId) -> Option<usize> {
        self.index
            .get(target)
            .or_else(|| self.alternatives.get(target))
            .copied()
    }

    /// Add edge `from → to`; returns false if it already existed
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        self.successors[from].insert(to)
    }

    pub fn node(&self, id: &PackageId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, node: usize) -> &PackageId {
        &self.nodes[node]
    }

    pub fn nodes(&self) -> &[PackageId] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(BTreeSet::len).sum()
    }

    pub fn successors(&self, node: usize) -> &BTreeSet<usize> {
        &self.successors[node]
    }

    pub fn has_edge(&self, from: &PackageId, to: &PackageId) -> bool {
        match (self.node(from), self.node(to)) {
            (Some(u), Some(v)) => self.successors[u].contains(&v),
            _ => false,
        }
    }

    /// Every edge as (before, after) ids
    pub fn edges(&self) -> impl Iterator<Item = (&PackageId, &PackageId)> + '_ {
        self.successors.iter().enumerate().flat_map(move |(u, succ)| {
            succ.iter().map(move |&v| (&self.nodes[u], &self.nodes[v]))
        })
    }

    pub fn pin(&self, node: usize) -> Option<PinSide> {
        self.pins[node]
    }

    /// Ids pinned to one side, in catalog order
    pub fn pinned(&self, side: PinSide) -> Vec<&PackageId> {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| **pin == Some(side))
            .map(|(i, _)| &self.nodes[i])
            .collect()
    }

    /// Incompatible active pairs, earlier catalog position first
    pub fn incompatibilities(&self) -> Vec<(PackageId, PackageId)> {
        self.incompatibilities
            .iter()
            .map(|&(a, b)| (self.nodes[a].clone(), self.nodes[b].clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Mod;
    use crate::logic::aggregate::RuleAggregator;
    use crate::logic::dependencies::DependencySatisfier;
    use crate::logic::version::VersionTagResolver;
    use crate::rules::{Rule, RuleSources};

    fn id(raw: &str) -> PackageId {
        PackageId::new(raw)
    }

    fn build(catalog: &Catalog, user: Vec<Rule>) -> (ConstraintGraph, Vec<Diagnostic>) {
        let mut sources = RuleSources::from_catalog(catalog);
        sources.user_mut().extend(user).unwrap();
        let mut diags = Vec::new();
        let sets =
            RuleAggregator::new(&sources, VersionTagResolver::new("1.5")).aggregate(catalog, &mut diags);
        let graph = ConstraintGraph::build(catalog, &sets, None, &mut diags);
        (graph, diags)
    }

    #[test]
    fn test_after_and_before_edges() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_rule(RuleKind::LoadAfter, "b"),
            Mod::new("b").with_rule(RuleKind::LoadBefore, "c"),
            Mod::new("c"),
        ])
        .unwrap();
        let (graph, diags) = build(&catalog, vec![]);

        assert!(graph.has_edge(&id("b"), &id("a")));
        assert!(graph.has_edge(&id("b"), &id("c")));
        assert_eq!(graph.edge_count(), 2);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_inactive_targets_produce_no_edge() {
        let catalog = Catalog::new(vec![
            Mod::new("a")
                .with_rule(RuleKind::LoadAfter, "off")
                .with_rule(RuleKind::LoadAfter, "not.installed"),
            Mod::new("off").inactive().with_rule(RuleKind::LoadBefore, "a"),
        ])
        .unwrap();
        let (graph, _) = build(&catalog, vec![]);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_alternative_id_targets_resolve() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_rule(RuleKind::LoadAfter, "old.name"),
            Mod::new("b").with_alternative_id("old.name"),
        ])
        .unwrap();
        let (graph, _) = build(&catalog, vec![]);
        assert!(graph.has_edge(&id("b"), &id("a")));
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_rule(RuleKind::LoadBefore, "b"),
            Mod::new("b").with_rule(RuleKind::LoadAfter, "a"),
        ])
        .unwrap();
        let (graph, _) = build(&catalog, vec![]);
        assert_eq!(graph.edge_count(), 1);
        let edges: Vec<(&PackageId, &PackageId)> = graph.edges().collect();
        assert_eq!(edges, vec![(&id("a"), &id("b"))]);
    }

    #[test]
    fn test_self_reference_dropped_with_diagnostic() {
        let catalog = Catalog::new(vec![Mod::new("a").with_rule(RuleKind::LoadAfter, "a")]).unwrap();
        let (graph, diags) = build(&catalog, vec![]);

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(
            diags,
            vec![Diagnostic::SelfReference {
                mod_id: id("a"),
                kind: RuleKind::LoadAfter,
            }]
        );
    }

    #[test]
    fn test_incompatibility_pairs_are_unordered() {
        let catalog = Catalog::new(vec![
            Mod::new("a"),
            Mod::new("b").with_rule(RuleKind::IncompatibleWith, "a"),
            Mod::new("c").with_rule(RuleKind::IncompatibleWith, "gone"),
        ])
        .unwrap();
        let (graph, _) = build(
            &catalog,
            vec![Rule::new("a", "b", RuleKind::IncompatibleWith, RuleOrigin::User)],
        );

        assert_eq!(graph.incompatibilities(), vec![(id("a"), id("b"))]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_pins_in_catalog_order() {
        let catalog = Catalog::new(vec![
            Mod::new("a").pinned(RuleKind::ForceLoadBottom),
            Mod::new("b"),
            Mod::new("c").pinned(RuleKind::ForceLoadTop),
            Mod::new("d").pinned(RuleKind::ForceLoadBottom),
        ])
        .unwrap();
        let (graph, _) = build(&catalog, vec![]);

        assert_eq!(graph.pinned(PinSide::Top), vec![&id("c")]);
        assert_eq!(graph.pinned(PinSide::Bottom), vec![&id("a"), &id("d")]);
    }

    #[test]
    fn test_pin_conflict_manifest_wins() {
        let catalog = Catalog::new(vec![Mod::new("a").pinned(RuleKind::ForceLoadTop)]).unwrap();
        let (graph, diags) = build(
            &catalog,
            vec![Rule::pin("a", RuleKind::ForceLoadBottom, RuleOrigin::User)],
        );

        assert_eq!(graph.pin(0), Some(PinSide::Top));
        assert_eq!(
            diags,
            vec![Diagnostic::PinConflict {
                mod_id: id("a"),
                resolved: PinSide::Top,
                by_manifest: true,
            }]
        );
    }

    #[test]
    fn test_pin_conflict_defaults_to_bottom() {
        let catalog = Catalog::new(vec![Mod::new("a")]).unwrap();
        let (graph, diags) = build(
            &catalog,
            vec![
                Rule::pin("a", RuleKind::ForceLoadTop, RuleOrigin::User),
                Rule::pin("a", RuleKind::ForceLoadBottom, RuleOrigin::User),
            ],
        );

        assert_eq!(graph.pin(0), Some(PinSide::Bottom));
        assert!(matches!(
            diags[0],
            Diagnostic::PinConflict {
                resolved: PinSide::Bottom,
                by_manifest: false,
                ..
            }
        ));
    }

    #[test]
    fn test_dependencies_imply_order() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_dependency("lib"),
            Mod::new("lib"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let mut diags = Vec::new();
        let sets =
            RuleAggregator::new(&sources, VersionTagResolver::new("1.5")).aggregate(&catalog, &mut diags);
        let checks = DependencySatisfier::new(&catalog).check(&sets);

        let plain = ConstraintGraph::build(&catalog, &sets, None, &mut diags);
        assert_eq!(plain.edge_count(), 0);

        let ordered = ConstraintGraph::build(&catalog, &sets, Some(&checks), &mut diags);
        assert!(ordered.has_edge(&id("lib"), &id("a")));
    }
}
