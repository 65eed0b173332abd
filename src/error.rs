//! Error handling module for the load-order engine
//!
//! A resolution run itself never fails: every anomaly becomes an entry in the
//! `ResolutionReport`. The types here cover the caller-facing edges of the
//! crate instead (building a catalog, editing rule layers, loading snapshot
//! and configuration files).

use thiserror::Error;

use crate::catalog::PackageId;
use crate::types::{RuleKind, RuleOrigin};

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum LoadOrderError {
    /// IO errors (reading snapshots and configuration files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog construction errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Rule layer errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

/// Result type alias for fallible crate operations
pub type Result<T> = std::result::Result<T, LoadOrderError>;

impl LoadOrderError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors raised while assembling a catalog snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Mod '{id}' appears more than once in the catalog (first at position {first}, again at {second})")]
    DuplicateId {
        id: PackageId,
        first: usize,
        second: usize,
    },

    #[error("Mod at catalog position {position} has an empty package id")]
    EmptyId { position: usize },
}

/// Errors raised while editing a rule layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("{rule_origin} rule cannot be added to the {layer} layer")]
    OriginMismatch {
        layer: RuleOrigin,
        rule_origin: RuleOrigin,
    },

    #[error("Manifest rules are read-only")]
    ReadOnlyLayer,

    #[error("Rule has an empty subject id")]
    EmptySubject,

    #[error("{kind} rule on '{subject}' has an empty target id")]
    EmptyTarget {
        subject: PackageId,
        kind: RuleKind,
    },
}
