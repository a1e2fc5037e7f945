//! Workspace resolution.
//!
//! A job is identified solely by the directory it works in. Identical logical
//! requests must always land in the identical directory, because directory
//! existence doubles as the mutual-exclusion check for job submission.

use std::fmt;
use std::path::{Component, Path};

use crate::error::{Error, Result};

/// Directory under the storage root that holds retired workspaces awaiting removal.
pub const RECLAIM_DIR: &str = ".reclaim";

/// Relative path of a job workspace beneath the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspacePath(String);

impl WorkspacePath {
    /// Resolve the workspace for a request.
    ///
    /// Precedence: a non-empty `token` wins outright; otherwise a positive
    /// numeric `unit` selects `{pid}/{unit}`; otherwise the bare `pid`.
    pub fn resolve(pid: &str, unit: Option<&str>, token: Option<&str>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            return Self(token.to_string());
        }

        match unit.and_then(parse_unit) {
            Some(unit_id) => Self(format!("{pid}/{unit_id}")),
            None => Self(pid.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject paths that could escape the storage root.
    ///
    /// Only plain relative components are allowed, and the reclaim area is off limits.
    pub fn ensure_contained(&self) -> Result<()> {
        let path = Path::new(&self.0);
        let contained = !self.0.is_empty()
            && !self.0.contains('\\')
            && path.components().all(|c| matches!(c, Component::Normal(_)))
            && !path.starts_with(RECLAIM_DIR);

        if contained {
            Ok(())
        } else {
            Err(Error::InvalidIdentifier(self.0.clone()))
        }
    }
}

/// Parse a unit scoping id; only positive integers count.
pub fn parse_unit(unit: &str) -> Option<u64> {
    unit.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkspacePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
