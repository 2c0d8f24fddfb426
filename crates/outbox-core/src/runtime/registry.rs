// crates/outbox-core/src/runtime/registry.rs
// ============================================================================
// Module: Written-Item Registry
// Description: Persisted local id to remote id ledger.
// Purpose: Let later runs link children to items written by earlier runs.
// Dependencies: crate::runtime, outbox-config, serde, serde_yaml
// ============================================================================

//! ## Overview
//! The registry is the only state shared across write runs. It is read at
//! the start of a run, re-read and merged at the end, and rewritten through
//! an atomic rename.
//!
//! ## Invariants
//! - Merging never overwrites an existing entry for the same local id.
//! - A missing registry file reads as an empty registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use outbox_config::clock;
use outbox_config::write_yaml_atomic;
use serde::Deserialize;
use serde::Serialize;

use crate::runtime::OutboxError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Registry document version.
pub const REGISTRY_SCHEMA_VERSION: &str = "1.0";

/// Header written above the registry.
const REGISTRY_HEADER: &[&str] = &[
    "MACHINE-GENERATED FILE. DO NOT EDIT BY HAND.",
    "Maintained by `outbox write`; maps bundle local ids to remote work item ids.",
];

// ============================================================================
// SECTION: Registry
// ============================================================================

/// One written work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Remote identifier.
    pub remote_id: u64,
    /// Canonical type the item was written as.
    pub canonical_type: String,
    /// Title at write time.
    pub title: String,
    /// Bundle id the item came from.
    pub source_bundle_id: String,
    /// RFC 3339 write time.
    pub written_at: String,
}

/// Persisted registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenItemRegistry {
    /// Document version.
    pub schema_version: String,
    /// RFC 3339 time of the last rewrite.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Entries keyed by local id.
    #[serde(default)]
    pub local_id_index: BTreeMap<String, RegistryEntry>,
}

impl Default for WrittenItemRegistry {
    fn default() -> Self {
        Self {
            schema_version: REGISTRY_SCHEMA_VERSION.to_string(),
            updated_at: None,
            local_id_index: BTreeMap::new(),
        }
    }
}

impl WrittenItemRegistry {
    /// Reads the registry, treating a missing file as empty.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Io`] when the file exists but cannot be read or
    /// decoded.
    pub fn load(path: &Path) -> Result<Self, OutboxError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(OutboxError::io(path, &err)),
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|err| OutboxError::Io {
            path: path.display().to_string(),
            message: format!("invalid registry document: {err}"),
        })
    }

    /// Returns the remote id recorded for a local id.
    #[must_use]
    pub fn remote_id_for(&self, local_id: &str) -> Option<u64> {
        self.local_id_index.get(local_id).map(|entry| entry.remote_id)
    }

    /// Adds entries whose local id is not yet recorded; returns how many were added.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, RegistryEntry)>) -> usize {
        let mut added = 0;
        for (local_id, entry) in entries {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.local_id_index.entry(local_id)
            {
                slot.insert(entry);
                added += 1;
            }
        }
        added
    }

    /// Stamps `updated_at` and writes the registry atomically.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Persist`] when the write fails.
    pub fn save(&mut self, path: &Path) -> Result<(), OutboxError> {
        self.updated_at = Some(clock::now_rfc3339());
        write_yaml_atomic(path, self, REGISTRY_HEADER)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
