//! Type-safe vocabulary for the load-order engine
//!
//! Rule kinds, rule origins and the policy switches callers can flip are all
//! plain enums so that every match over them stays exhaustive.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of ordering/compatibility rule attached to a mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleKind {
    /// Subject loads after the target
    LoadAfter,
    /// Subject loads before the target
    LoadBefore,
    /// Subject and target must not be active together
    IncompatibleWith,
    /// Subject is pinned to the end of the load order
    ForceLoadBottom,
    /// Subject is pinned to the start of the load order
    ForceLoadTop,
}

impl RuleKind {
    /// Check if this kind produces a graph edge
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::LoadAfter | Self::LoadBefore)
    }

    /// Check if this kind pins its subject
    pub fn is_pin(&self) -> bool {
        matches!(self, Self::ForceLoadBottom | Self::ForceLoadTop)
    }

    /// The pin side for pin kinds
    pub fn pin_side(&self) -> Option<PinSide> {
        match self {
            Self::ForceLoadTop => Some(PinSide::Top),
            Self::ForceLoadBottom => Some(PinSide::Bottom),
            _ => None,
        }
    }
}

/// Where a rule was declared. Variants are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum RuleOrigin {
    /// Declared in the mod's own manifest; read-only
    Manifest,
    /// Shared curated rules file
    Community,
    /// Local user-editable rules file
    User,
}

impl RuleOrigin {
    /// Check if rules of this origin may be edited by the caller
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Self::Manifest)
    }
}

/// How a mod arrived in the local catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    /// Shipped with the game
    BuiltIn,
    #[default]
    Local,
    SteamSubscribed,
    SteamCmd,
    Git,
}

/// Which end of the load order a pinned mod is forced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum PinSide {
    Top,
    Bottom,
}

/// Ordering among mods sharing the same pin side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PinOrder {
    /// Pinned mods keep their catalog order, in-group rules are ignored
    #[default]
    CatalogOrder,
    /// In-group rules are honored, catalog order breaks ties
    RespectRules,
}

/// What happens to mods caught in a dependency loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CyclePolicy {
    /// Cycle members are left out of the ordered list
    #[default]
    Exclude,
    /// Cycle edges are broken and members are ordered with everything else
    BreakEdges,
}

/// Whether simultaneously active incompatible mods block the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncompatibilityPolicy {
    /// Report the pairs, the order is still usable
    #[default]
    Warn,
    /// Report the pairs and mark the resolution as blocked
    Block,
}
