//! Resolution Report
//!
//! The one caller-facing result of a resolution run. Built once from the
//! outputs of the satisfier, the graph builder and the sorter, then never
//! mutated.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strum::Display;

use crate::catalog::PackageId;
use crate::diagnostics::Diagnostic;
use crate::logic::dependencies::{AlternativeResolution, DependencyCheck};

/// Overall verdict of a resolution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[derive(Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum ResolutionOutcome {
    /// Every active mod is ordered and nothing blocks the order
    Complete,
    /// Cycles were found; the order covers the acyclic remainder
    Partial,
    /// Incompatible mods are active and the policy forbids that
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub ordered_mods: Vec<PackageId>,
    /// Dependency id -> dependents, for dependencies nothing provides
    pub missing_dependencies: BTreeMap<PackageId, Vec<PackageId>>,
    /// Dependency id -> dependents, for dependencies present but disabled
    pub inactive_dependencies: BTreeMap<PackageId, Vec<PackageId>>,
    pub incompatibilities_found: Vec<(PackageId, PackageId)>,
    pub cycles: Vec<Vec<PackageId>>,
    pub unused_alternative_resolutions: Vec<AlternativeResolution>,
    pub dependency_statuses: Vec<DependencyCheck>,
    pub diagnostics: Vec<Diagnostic>,
    pub outcome: ResolutionOutcome,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ResolutionOutcome::Complete
    }

    /// Anything the user should look at before launching
    pub fn has_problems(&self) -> bool {
        !self.is_complete()
            || !self.missing_dependencies.is_empty()
            || !self.incompatibilities_found.is_empty()
    }

    /// Position of a mod in the final order
    pub fn position_of(&self, id: &PackageId) -> Option<usize> {
        self.ordered_mods.iter().position(|m| m == id)
    }

    /// One-line summary for status bars and logs
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} mods ordered", self.ordered_mods.len())];
        if !self.missing_dependencies.is_empty() {
            parts.push(format!(
                "{} missing dependencies",
                self.missing_dependencies.len()
            ));
        }
        if !self.inactive_dependencies.is_empty() {
            parts.push(format!(
                "{} disabled dependencies",
                self.inactive_dependencies.len()
            ));
        }
        if !self.incompatibilities_found.is_empty() {
            parts.push(format!(
                "{} incompatibilities",
                self.incompatibilities_found.len()
            ));
        }
        if !self.cycles.is_empty() {
            parts.push(format!("{} cycles", self.cycles.len()));
        }
        if !self.diagnostics.is_empty() {
            parts.push(format!("{} warnings", self.diagnostics.len()));
        }
        format!("[{}] {}", self.outcome, parts.join(", "))
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;

        writeln!(f, "\nLoad order:")?;
        for (i, id) in self.ordered_mods.iter().enumerate() {
            writeln!(f, "  {:>3}. {}", i + 1, id)?;
        }

        for (dependency, dependents) in &self.missing_dependencies {
            writeln!(f, "\nMissing {} (needed by {})", dependency, join(dependents))?;
        }
        for (dependency, dependents) in &self.inactive_dependencies {
            writeln!(f, "\nDisabled {} (needed by {})", dependency, join(dependents))?;
        }
        for (a, b) in &self.incompatibilities_found {
            writeln!(f, "\nIncompatible: {} <-> {}", a, b)?;
        }
        for cycle in &self.cycles {
            if let Some(first) = cycle.first() {
                writeln!(f, "\nCycle: {} -> {}", join_with(cycle, " -> "), first)?;
            }
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "\nWarning: {}", diagnostic)?;
        }
        Ok(())
    }
}

fn join(ids: &[PackageId]) -> String {
    join_with(ids, ", ")
}

fn join_with(ids: &[PackageId], separator: &str) -> String {
    ids.iter()
        .map(PackageId::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
