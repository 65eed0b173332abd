//! loadorder Library
//!
//! Deterministic load-order resolution for moddable games: merges layered
//! ordering rules, classifies dependencies, detects cycles and produces a
//! stable total order with a report of everything that needs attention.

pub mod catalog;
pub mod cli;
pub mod config_file;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod logic;
pub mod rules;
pub mod snapshot;
pub mod types;

// Re-export main types for convenience
pub use catalog::{Catalog, DependencyList, Mod, PackageId};
pub use config_file::ResolverConfig;
pub use diagnostics::Diagnostic;
pub use error::{CatalogError, LoadOrderError, RuleError};
pub use rules::{AddOutcome, DuplicateRule, Rule, RuleLayer, RuleSources};
pub use types::{
    CyclePolicy, IncompatibilityPolicy, PinOrder, PinSide, RuleKind, RuleOrigin, SourceKind,
};

// Resolution engine
pub use engine::graph::ConstraintGraph;
pub use engine::report::{ResolutionOutcome, ResolutionReport};
pub use engine::resolve;
pub use logic::aggregate::EffectiveRuleSet;
pub use logic::dependencies::{DependencyCheck, Satisfaction};
