//! Engine modules: the pipeline that turns a catalog and its rules into a
//! load order.
//!
//! `resolve` is a pure function of its inputs and keeps no state between
//! calls. Callers that resolve concurrently with catalog updates must
//! serialize the two themselves.
//!
//! # Pipeline
//!
//! 1. `logic::aggregate`: version-resolve and merge the rule layers
//! 2. `logic::dependencies`: classify hard dependencies
//! 3. `graph`: build the constraint graph over active mods
//! 4. `sort`: detect cycles, then order with pins spliced in
//! 5. `report`: assemble the `ResolutionReport`

pub mod graph;
pub mod report;
pub mod sort;

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config_file::ResolverConfig;
use crate::diagnostics::Diagnostic;
use crate::logic::aggregate::RuleAggregator;
use crate::logic::dependencies::{
    DependencySatisfier, Satisfaction, alternative_resolutions, group_by_dependency,
};
use crate::logic::version::VersionTagResolver;
use crate::rules::RuleSources;
use crate::types::IncompatibilityPolicy;

use graph::ConstraintGraph;
use report::{ResolutionOutcome, ResolutionReport};
use sort::TopologicalSorter;

/// Resolve the load order of every active mod in `catalog`.
///
/// Never fails: conflicts, missing dependencies, incompatibilities and
/// cycles all end up in the report.
pub fn resolve(
    catalog: &Catalog,
    sources: &RuleSources,
    config: &ResolverConfig,
) -> ResolutionReport {
    let target = config.target_tag();
    debug!(
        "Resolving {} mods ({} active) for game version {}",
        catalog.len(),
        catalog.active().count(),
        target
    );

    let mut diagnostics = Vec::new();
    note_unsupported_versions(catalog, target, &mut diagnostics);

    let resolver = VersionTagResolver::new(target);
    let rule_sets = RuleAggregator::new(sources, resolver).aggregate(catalog, &mut diagnostics);

    let checks = DependencySatisfier::new(catalog).check(&rule_sets);
    let implied = config.dependencies_imply_order.then_some(checks.as_slice());

    let graph = ConstraintGraph::build(catalog, &rule_sets, implied, &mut diagnostics);
    debug!(
        "Constraint graph: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    let sorted = TopologicalSorter::new(config.pin_order, config.cycle_policy).sort(&graph);
    diagnostics.extend(sorted.diagnostics);

    let incompatibilities = graph.incompatibilities();
    let outcome = if !incompatibilities.is_empty()
        && config.incompatibility_policy == IncompatibilityPolicy::Block
    {
        ResolutionOutcome::Blocked
    } else if !sorted.cycles.is_empty() {
        ResolutionOutcome::Partial
    } else {
        ResolutionOutcome::Complete
    };

    let report = ResolutionReport {
        ordered_mods: sorted.order,
        missing_dependencies: group_by_dependency(&checks, Satisfaction::is_missing),
        inactive_dependencies: group_by_dependency(&checks, |s| {
            *s == Satisfaction::SatisfiedInactiveLocal
        }),
        incompatibilities_found: incompatibilities,
        cycles: sorted.cycles,
        unused_alternative_resolutions: alternative_resolutions(&checks),
        dependency_statuses: checks,
        diagnostics,
        outcome,
    };

    info!("{}", report.summary());
    report
}

/// Flag active mods whose supported versions exclude the target
fn note_unsupported_versions(catalog: &Catalog, target: &str, diagnostics: &mut Vec<Diagnostic>) {
    for m in catalog.active() {
        if m.supported_versions.is_empty() {
            continue;
        }
        if !m.supported_versions.iter().any(|v| v.trim() == target) {
            diagnostics.push(Diagnostic::UnsupportedGameVersion {
                mod_id: m.id.clone(),
                game_version: target.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Mod, PackageId};
    use crate::types::RuleKind;

    fn ids(report: &ResolutionReport) -> Vec<&str> {
        report.ordered_mods.iter().map(PackageId::as_str).collect()
    }

    #[test]
    fn test_resolve_empty_catalog() {
        let catalog = Catalog::default();
        let sources = RuleSources::from_catalog(&catalog);
        let report = resolve(&catalog, &sources, &ResolverConfig::default());

        assert!(report.ordered_mods.is_empty());
        assert!(report.is_complete());
    }

    #[test]
    fn test_inactive_mods_left_out() {
        let catalog = Catalog::new(vec![
            Mod::new("a"),
            Mod::new("b").inactive(),
            Mod::new("c").with_dependency("b"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let report = resolve(&catalog, &sources, &ResolverConfig::default());

        assert_eq!(ids(&report), vec!["a", "c"]);
        assert_eq!(
            report.inactive_dependencies[&PackageId::new("b")],
            vec![PackageId::new("c")]
        );
        assert!(report.missing_dependencies.is_empty());
    }

    #[test]
    fn test_block_policy() {
        let catalog = Catalog::new(vec![
            Mod::new("a").with_rule(RuleKind::IncompatibleWith, "b"),
            Mod::new("b"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let config = ResolverConfig {
            incompatibility_policy: IncompatibilityPolicy::Block,
            ..Default::default()
        };
        let report = resolve(&catalog, &sources, &config);

        assert_eq!(report.outcome, ResolutionOutcome::Blocked);
        assert_eq!(ids(&report), vec!["a", "b"]);
    }

    #[test]
    fn test_unsupported_game_version_noted() {
        let catalog = Catalog::new(vec![
            Mod::new("old").supporting("1.3").supporting("1.4"),
            Mod::new("current").supporting("1.5"),
            Mod::new("any"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let config = ResolverConfig::new().with_game_version("1.5");
        let report = resolve(&catalog, &sources, &config);

        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnsupportedGameVersion {
                mod_id: PackageId::new("old"),
                game_version: "1.5".to_string(),
            }]
        );
        assert!(report.is_complete());
    }

    #[test]
    fn test_supported_versions_match_exactly() {
        let catalog = Catalog::new(vec![
            Mod::new("tagged").supporting("1.5"),
            Mod::new("build").supporting("1.5.4104"),
        ])
        .unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let config = ResolverConfig::new().with_game_version("1.5.4104");
        let report = resolve(&catalog, &sources, &config);

        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::UnsupportedGameVersion {
                mod_id: PackageId::new("tagged"),
                game_version: "1.5.4104".to_string(),
            }]
        );
    }

    #[test]
    fn test_dependencies_imply_order_switch() {
        let catalog =
            Catalog::new(vec![Mod::new("a").with_dependency("lib"), Mod::new("lib")]).unwrap();
        let sources = RuleSources::from_catalog(&catalog);

        let plain = resolve(&catalog, &sources, &ResolverConfig::default());
        assert_eq!(ids(&plain), vec!["a", "lib"]);

        let config = ResolverConfig {
            dependencies_imply_order: true,
            ..Default::default()
        };
        let ordered = resolve(&catalog, &sources, &config);
        assert_eq!(ids(&ordered), vec!["lib", "a"]);
    }
}
