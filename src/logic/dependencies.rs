//! Dependency Satisfier
//!
//! Classifies every hard dependency of every active mod. Resolution order
//! for a single dependency id:
//!
//! 1. an active mod with that exact id
//! 2. an inactive but locally present mod with that exact id
//! 3. the first mod, in catalog order, listing the id in `alternative_ids`
//! 4. otherwise missing
//!
//! Pure classification; nothing is enabled or downloaded here.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::catalog::{Catalog, PackageId};
use crate::logic::aggregate::EffectiveRuleSet;

/// How a single dependency is satisfied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Satisfaction {
    SatisfiedActive,
    SatisfiedInactiveLocal,
    SatisfiedByAlternative {
        provider: PackageId,
        provider_active: bool,
    },
    Missing,
}

impl Satisfaction {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The active mod that satisfies the dependency, if any
    pub fn active_provider<'a>(&'a self, dependency: &'a PackageId) -> Option<&'a PackageId> {
        match self {
            Self::SatisfiedActive => Some(dependency),
            Self::SatisfiedByAlternative {
                provider,
                provider_active: true,
            } => Some(provider),
            _ => None,
        }
    }
}

/// Classification of one (dependent, dependency) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub dependent: PackageId,
    pub dependency: PackageId,
    pub satisfaction: Satisfaction,
}

/// An alternative id that stood in for a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlternativeResolution {
    pub dependency: PackageId,
    pub dependent: PackageId,
    pub provider: PackageId,
}

pub struct DependencySatisfier<'a> {
    catalog: &'a Catalog,
}

impl<'a> DependencySatisfier<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Classify a single dependency id
    pub fn classify(&self, dependency: &PackageId) -> Satisfaction {
        if let Some(m) = self.catalog.get(dependency) {
            return if m.is_active {
                Satisfaction::SatisfiedActive
            } else {
                Satisfaction::SatisfiedInactiveLocal
            };
        }

        match self.catalog.providers_of(dependency).next() {
            Some(provider) => Satisfaction::SatisfiedByAlternative {
                provider: provider.id.clone(),
                provider_active: provider.is_active,
            },
            None => Satisfaction::Missing,
        }
    }

    /// Classify every dependency of the given rule sets, in order
    pub fn check(&self, rule_sets: &[EffectiveRuleSet]) -> Vec<DependencyCheck> {
        let mut checks: Vec<DependencyCheck> = Vec::new();
        for set in rule_sets {
            for dependency in &set.dependencies {
                if dependency == &set.mod_id {
                    continue;
                }
                let seen = checks
                    .iter()
                    .any(|c| c.dependent == set.mod_id && c.dependency == *dependency);
                if seen {
                    continue;
                }
                let satisfaction = self.classify(dependency);
                debug!("{} depends on {}: {:?}", set.mod_id, dependency, satisfaction);
                checks.push(DependencyCheck {
                    dependent: set.mod_id.clone(),
                    dependency: dependency.clone(),
                    satisfaction,
                });
            }
        }
        checks
    }
}

/// Group dependents by dependency id for checks matching `filter`
pub fn group_by_dependency(
    checks: &[DependencyCheck],
    filter: impl Fn(&Satisfaction) -> bool,
) -> BTreeMap<PackageId, Vec<PackageId>> {
    let mut grouped: BTreeMap<PackageId, Vec<PackageId>> = BTreeMap::new();
    for check in checks.iter().filter(|c| filter(&c.satisfaction)) {
        let dependents = grouped.entry(check.dependency.clone()).or_default();
        if !dependents.contains(&check.dependent) {
            dependents.push(check.dependent.clone());
        }
    }
    grouped
}

/// Every dependency that was satisfied through an alternative id
pub fn alternative_resolutions(checks: &[DependencyCheck]) -> Vec<AlternativeResolution> {
    checks
        .iter()
        .filter_map(|c| match &c.satisfaction {
            Satisfaction::SatisfiedByAlternative { provider, .. } => Some(AlternativeResolution {
                dependency: c.dependency.clone(),
                dependent: c.dependent.clone(),
                provider: provider.clone(),
            }),
            _ => None,
        })
        .collect()
}
