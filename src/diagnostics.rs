//! Non-fatal findings attached to a resolution report
//!
//! Nothing inside a resolution run aborts. Configuration conflicts are
//! recovered with a deterministic tie-break and recorded here so the UI can
//! explain what the engine decided.

use serde::Serialize;
use std::fmt;

use crate::catalog::PackageId;
use crate::types::{PinSide, RuleKind, RuleOrigin};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A version scope that is not a well-formed version tag; it never matches
    UnrecognizedVersionScope {
        mod_id: PackageId,
        scope: String,
        origin: RuleOrigin,
    },

    /// A mod pinned both top and bottom
    PinConflict {
        mod_id: PackageId,
        resolved: PinSide,
        /// True when a Manifest pin decided the side, false when the
        /// bottom-wins convention did
        by_manifest: bool,
    },

    /// An ordering edge that pin placement makes impossible to honor
    PinnedEdgeDropped {
        before: PackageId,
        after: PackageId,
    },

    /// A rule whose target resolves to its own subject
    SelfReference {
        mod_id: PackageId,
        kind: RuleKind,
    },

    /// An active mod that does not list the targeted game version
    UnsupportedGameVersion {
        mod_id: PackageId,
        game_version: String,
    },
}

impl Diagnostic {
    /// The mod the finding is about
    pub fn mod_id(&self) -> &PackageId {
        match self {
            Self::UnrecognizedVersionScope { mod_id, .. }
            | Self::PinConflict { mod_id, .. }
            | Self::SelfReference { mod_id, .. }
            | Self::UnsupportedGameVersion { mod_id, .. } => mod_id,
            Self::PinnedEdgeDropped { after, .. } => after,
        }
    }

    /// Findings that came from contradictory or malformed configuration
    pub fn is_configuration_conflict(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedVersionScope { .. } | Self::PinConflict { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedVersionScope {
                mod_id,
                scope,
                origin,
            } => write!(
                f,
                "{}: {} rule scoped to unrecognized version '{}' was ignored",
                mod_id, origin, scope
            ),
            Self::PinConflict {
                mod_id,
                resolved,
                by_manifest,
            } => {
                let reason = if *by_manifest {
                    "manifest pin wins"
                } else {
                    "pinned bottom by convention"
                };
                write!(
                    f,
                    "{}: pinned both top and bottom, placed at {} ({})",
                    mod_id, resolved, reason
                )
            }
            Self::PinnedEdgeDropped { before, after } => write!(
                f,
                "{} should load before {}, but pinning prevents it",
                before, after
            ),
            Self::SelfReference { mod_id, kind } => {
                write!(f, "{}: {} rule refers to the mod itself", mod_id, kind)
            }
            Self::UnsupportedGameVersion {
                mod_id,
                game_version,
            } => write!(f, "{}: does not list game version {}", mod_id, game_version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::PinConflict {
            mod_id: PackageId::new("a"),
            resolved: PinSide::Bottom,
            by_manifest: false,
        };
        assert_eq!(
            diag.to_string(),
            "a: pinned both top and bottom, placed at bottom (pinned bottom by convention)"
        );
        assert!(diag.is_configuration_conflict());

        let diag = Diagnostic::PinnedEdgeDropped {
            before: PackageId::new("x"),
            after: PackageId::new("y"),
        };
        assert_eq!(diag.mod_id(), &PackageId::new("y"));
        assert!(!diag.is_configuration_conflict());
    }

    #[test]
    fn test_diagnostic_serializes_tagged() {
        let diag = Diagnostic::SelfReference {
            mod_id: PackageId::new("a"),
            kind: RuleKind::LoadAfter,
        };
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["type"], "self_reference");
        assert_eq!(json["kind"], "load_after");
    }
}
