//! This crate is a part of **facpack**.
//!
//! ## What's in here?
//!
//! Figuring out how to get from the installed game version to a newer one,
//! given the incremental update packages the game publishes. Each package is
//! an [`UpdateStep`]; an [`UpdateGraph`] chains them into [`UpdateTarget`]s.

use std::fmt;

use facpack_mod::AccurateVersion;
use serde::{Deserialize, Serialize};

mod graph;
pub use graph::*;

/// A single published update package.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UpdateStep {
    pub from: AccurateVersion,
    pub to: AccurateVersion,
    #[serde(default)]
    pub is_stable: bool,
}

impl UpdateStep {
    pub const fn new(from: AccurateVersion, to: AccurateVersion, is_stable: bool) -> Self {
        Self {
            from,
            to,
            is_stable,
        }
    }
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A version that can be updated to, and the packages that get there.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[must_use]
pub struct UpdateTarget {
    /// Packages to apply, in order.
    pub steps: Vec<UpdateStep>,
    pub target_version: AccurateVersion,
    pub is_stable: bool,
    /// `false` if another installation already covers the target's game
    /// version.
    pub is_valid: bool,
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} steps)",
            self.target_version,
            if self.is_stable { "stable" } else { "experimental" },
            self.steps.len()
        )?;
        if !self.is_valid {
            write!(f, " [already installed]")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("There is no chain of updates from {from} to {to}")]
    NoUpdatePath {
        from: AccurateVersion,
        to: AccurateVersion,
    },
}
