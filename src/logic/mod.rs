//! Logic modules: turn raw catalog data and rule layers into per-mod facts.
//!
//! Everything here is pure and never mutates its inputs. Activity filtering
//! happens only where a step documents it.
//!
//! # Modules
//!
//! - `version`: collapses base and version-scoped rules for the target game version
//! - `aggregate`: merges Manifest, Community and User layers into effective rule sets
//! - `dependencies`: classifies hard dependencies (active, local, alternative, missing)

pub mod aggregate;
pub mod dependencies;
pub mod version;
