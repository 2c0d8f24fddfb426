// crates/outbox-config/src/reference.rs
// ============================================================================
// Module: Generated Reference Data
// Description: Optional harvested documents: path catalogs and team rosters.
// Purpose: Model optional inputs as loaded-or-absent instead of hard failures.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! The metadata harvester produces reference documents that may not exist yet
//! on a fresh checkout. Loaders here never fail: they return
//! [`Reference::Absent`] with a descriptive reason, and each consumer decides
//! what severity the absence carries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

// ============================================================================
// SECTION: Reference Result
// ============================================================================

/// Optional reference document: either loaded or absent with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<T> {
    /// Document loaded successfully.
    Loaded(T),
    /// Document missing or unusable.
    Absent(String),
}

impl<T> Reference<T> {
    /// Returns the loaded value, if any.
    #[must_use]
    pub const fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::Absent(_) => None,
        }
    }

    /// Returns the absence reason, if any.
    #[must_use]
    pub fn absence(&self) -> Option<&str> {
        match self {
            Self::Loaded(_) => None,
            Self::Absent(reason) => Some(reason),
        }
    }
}

/// Reads a YAML document, describing why it is unusable on failure.
fn read_yaml(path: &Path) -> Result<Value, String> {
    let text = fs::read_to_string(path)
        .map_err(|_| format!("Missing generated metadata file: {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&text)
        .map_err(|err| format!("Invalid YAML in generated metadata file {}: {err}", path.display()))?;
    if value.is_mapping() {
        Ok(value)
    } else {
        Err(format!("Invalid YAML object in generated metadata file: {}", path.display()))
    }
}

// ============================================================================
// SECTION: Path Catalogs
// ============================================================================

/// Set of known classification paths (area or iteration), normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCatalog {
    /// Normalized paths.
    paths: BTreeSet<String>,
}

impl PathCatalog {
    /// Builds a catalog from raw path strings, skipping blanks.
    #[must_use]
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .filter(|path| !path.as_ref().trim().is_empty())
                .map(|path| normalize_classification_path(path.as_ref()))
                .collect(),
        }
    }

    /// Loads a catalog list stored under `key` in a generated document.
    #[must_use]
    pub fn load(path: &Path, key: &str) -> Reference<Self> {
        let document = match read_yaml(path) {
            Ok(document) => document,
            Err(reason) => return Reference::Absent(reason),
        };
        let Some(Value::Sequence(items)) = document.get(key) else {
            return Reference::Absent(format!(
                "Expected key '{key}' to be a list in generated metadata file: {}",
                path.display()
            ));
        };
        Reference::Loaded(Self::from_paths(items.iter().filter_map(Value::as_str)))
    }

    /// Returns true when the raw path matches a catalog entry after normalization.
    #[must_use]
    pub fn contains(&self, raw: &str) -> bool {
        self.paths.contains(&normalize_classification_path(raw))
    }

    /// Returns the number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true when the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Normalizes a classification path: trims, uses `\` separators, and drops
/// leading and repeated separators.
#[must_use]
pub fn normalize_classification_path(raw: &str) -> String {
    let replaced = raw.trim().replace('/', "\\");
    let mut normalized = String::with_capacity(replaced.len());
    for ch in replaced.trim_start_matches('\\').chars() {
        if ch == '\\' && normalized.ends_with('\\') {
            continue;
        }
        normalized.push(ch);
    }
    normalized
}

// ============================================================================
// SECTION: Planning Context
// ============================================================================

/// Assignable identity harvested from the remote system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Identity {
    /// Human-readable display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Unique account name.
    #[serde(default)]
    pub unique_name: Option<String>,
}

/// Team and its assignable identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Team {
    /// Team name.
    pub name: String,
    /// Identities assignable within the team.
    #[serde(default)]
    pub assignable_identities: Vec<Identity>,
}

/// Team rosters used for owner resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlanningContext {
    /// Identities assignable anywhere in the project.
    #[serde(default)]
    pub project_assignable_identities: Vec<Identity>,
    /// Per-team rosters.
    #[serde(default)]
    pub teams: Vec<Team>,
}

impl PlanningContext {
    /// Loads `planning_context.yaml`.
    #[must_use]
    pub fn load(path: &Path) -> Reference<Self> {
        let document = match read_yaml(path) {
            Ok(document) => document,
            Err(reason) => return Reference::Absent(reason),
        };
        match serde_yaml::from_value(document) {
            Ok(context) => Reference::Loaded(context),
            Err(err) => Reference::Absent(format!(
                "Invalid planning context in {}: {err}",
                path.display()
            )),
        }
    }

    /// Returns the roster for a team, or the project roster when the team is
    /// unset or unknown.
    #[must_use]
    pub fn roster_for(&self, team: Option<&str>) -> &[Identity] {
        let team = team.map(str::trim).filter(|team| !team.is_empty());
        team.and_then(|team| self.teams.iter().find(|entry| entry.name.trim() == team))
            .map_or(self.project_assignable_identities.as_slice(), |entry| {
                entry.assignable_identities.as_slice()
            })
    }
}
