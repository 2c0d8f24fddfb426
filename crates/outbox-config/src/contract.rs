// crates/outbox-config/src/contract.rs
// ============================================================================
// Module: Effective Contract
// Description: Composition of the policy documents and generated metadata.
// Purpose: Provide lookups, derived required-field views, and coverage checks.
// Dependencies: crate::{documents, persist, reference}, serde, tracing
// ============================================================================

//! ## Overview
//! [`EffectiveContract`] is loaded from explicit policy and generated
//! directories and is immutable afterwards. Derived views are recomputed from
//! the underlying documents on every call, never cached or mutated.
//!
//! ## Invariants
//! - `effective_required_fields_by_type` is the per-type union of
//!   generated-required and policy-required keys.
//! - `validate_mapping_coverage` reports problems as strings; it never fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::documents::ConfigError;
use crate::documents::FieldMap;
use crate::documents::FieldPolicy;
use crate::documents::GeneratedWitContract;
use crate::documents::LinkPolicy;
use crate::documents::StandardsPolicy;
use crate::documents::WitCapabilities;
use crate::documents::WitMap;
use crate::persist::PersistError;
use crate::persist::write_yaml_atomic;
use crate::reference::PathCatalog;
use crate::reference::PlanningContext;
use crate::reference::Reference;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wit map document name inside the policy directory.
pub const WIT_MAP_FILE: &str = "wit_map.yaml";
/// Field map document name inside the policy directory.
pub const FIELD_MAP_FILE: &str = "field_map.yaml";
/// Field policy document name inside the policy directory.
pub const FIELD_POLICY_FILE: &str = "field_policy.yaml";
/// Link policy document name inside the policy directory.
pub const LINK_POLICY_FILE: &str = "link_policy.yaml";
/// Standards document name inside the policy directory.
pub const STANDARDS_FILE: &str = "standards.yaml";
/// Generated wit contract document name inside the generated directory.
pub const WIT_CONTRACT_FILE: &str = "wit_contract.yaml";
/// Generated area path catalog name inside the generated directory.
pub const AREA_PATHS_FILE: &str = "paths_area.yaml";
/// Generated iteration path catalog name inside the generated directory.
pub const ITERATION_PATHS_FILE: &str = "paths_iteration.yaml";
/// Generated planning context name inside the generated directory.
pub const PLANNING_CONTEXT_FILE: &str = "planning_context.yaml";
/// Schema version written into rewritten policy documents.
pub const POLICY_SCHEMA_VERSION: &str = "1.0";

/// Header written above a rewritten field policy.
const FIELD_POLICY_HEADER: &[&str] = &[
    "USER-MANAGED POLICY FILE. SAFE TO EDIT.",
    "Defines canonical field requirements and export scope for agent contract generation.",
    "Some required_fields may be auto-promoted by `outbox contract export` from remote-required \
     fields.",
];

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Explicit directory roots for contract documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractPaths {
    /// Directory holding operator-managed policy documents.
    pub policy_dir: PathBuf,
    /// Directory holding harvested reference documents.
    pub generated_dir: PathBuf,
}

impl ContractPaths {
    /// Creates contract paths from the two directory roots.
    #[must_use]
    pub fn new(policy_dir: impl Into<PathBuf>, generated_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy_dir: policy_dir.into(),
            generated_dir: generated_dir.into(),
        }
    }

    /// Returns a path inside the policy directory.
    #[must_use]
    pub fn policy_file(&self, name: &str) -> PathBuf {
        self.policy_dir.join(name)
    }

    /// Returns a path inside the generated directory.
    #[must_use]
    pub fn generated_file(&self, name: &str) -> PathBuf {
        self.generated_dir.join(name)
    }

    /// Loads the generated area path catalog.
    #[must_use]
    pub fn area_paths(&self) -> Reference<PathCatalog> {
        PathCatalog::load(&self.generated_file(AREA_PATHS_FILE), "area_paths")
    }

    /// Loads the generated iteration path catalog.
    #[must_use]
    pub fn iteration_paths(&self) -> Reference<PathCatalog> {
        PathCatalog::load(&self.generated_file(ITERATION_PATHS_FILE), "iteration_paths")
    }

    /// Loads the generated planning context.
    #[must_use]
    pub fn planning_context(&self) -> Reference<PlanningContext> {
        PlanningContext::load(&self.generated_file(PLANNING_CONTEXT_FILE))
    }
}

// ============================================================================
// SECTION: Effective Contract
// ============================================================================

/// Merged view of all contract documents.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveContract {
    /// Canonical to remote type mapping.
    pub wit_map: WitMap,
    /// Canonical field key to remote reference mapping.
    pub field_map: FieldMap,
    /// Allowed/required fields and export scope.
    pub field_policy: FieldPolicy,
    /// Hierarchy rules.
    pub link_policy: LinkPolicy,
    /// Content standards.
    pub standards: StandardsPolicy,
    /// Harvested remote field metadata.
    pub generated: GeneratedWitContract,
}

impl EffectiveContract {
    /// Loads all six documents from the given directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for the first unreadable or malformed document.
    pub fn load(paths: &ContractPaths) -> Result<Self, ConfigError> {
        let contract = Self {
            wit_map: WitMap::load(&paths.policy_file(WIT_MAP_FILE))?,
            field_map: FieldMap::load(&paths.policy_file(FIELD_MAP_FILE))?,
            field_policy: FieldPolicy::load(&paths.policy_file(FIELD_POLICY_FILE))?,
            link_policy: LinkPolicy::load(&paths.policy_file(LINK_POLICY_FILE))?,
            standards: StandardsPolicy::load(&paths.policy_file(STANDARDS_FILE))?,
            generated: GeneratedWitContract::load(&paths.generated_file(WIT_CONTRACT_FILE))?,
        };
        debug!(
            policy_dir = %paths.policy_dir.display(),
            types = contract.wit_map.canonical_to_ado.len(),
            fields = contract.field_map.canonical_to_ado.len(),
            "loaded effective contract"
        );
        Ok(contract)
    }

    /// Resolves a canonical type to its remote type name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownType`] when the type is not in the wit map.
    pub fn resolve_ado_wit(&self, canonical_type: &str) -> Result<&str, ConfigError> {
        self.wit_map
            .get(canonical_type)
            .ok_or_else(|| ConfigError::UnknownType(canonical_type.to_string()))
    }

    /// Resolves a canonical field key to its remote reference name, optionally
    /// scoped to a canonical type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] when the key is unmapped, or
    /// [`ConfigError::FieldNotApplicable`] when the mapping excludes the type.
    pub fn resolve_ado_field(
        &self,
        canonical_key: &str,
        canonical_type: Option<&str>,
    ) -> Result<&str, ConfigError> {
        let mapping = self
            .field_map
            .get(canonical_key)
            .ok_or_else(|| ConfigError::UnknownField(canonical_key.to_string()))?;
        if let Some(canonical_type) = canonical_type
            && !mapping.applies_to_type(canonical_type)
        {
            return Err(ConfigError::FieldNotApplicable {
                field: canonical_key.to_string(),
                canonical_type: canonical_type.to_string(),
            });
        }
        Ok(&mapping.reference_name)
    }

    /// Returns the generated capabilities for a canonical type, if both the
    /// wit map entry and the generated metadata exist.
    #[must_use]
    pub fn capabilities_for(&self, canonical_type: &str) -> Option<&WitCapabilities> {
        self.wit_map.get(canonical_type).and_then(|remote| self.generated.get(remote))
    }

    /// Returns the export scope: the configured list, or every wit-map type
    /// in sorted order when the list is empty.
    #[must_use]
    pub fn agent_contract_export_types(&self) -> Vec<String> {
        if self.field_policy.export_work_item_types.is_empty() {
            return self.wit_map.canonical_to_ado.keys().cloned().collect();
        }
        self.field_policy.export_work_item_types.clone()
    }

    /// Cross-checks the documents and returns human-readable coverage issues.
    /// An empty result means the contract is export-ready.
    #[must_use]
    pub fn validate_mapping_coverage(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let export_types: BTreeSet<String> =
            self.agent_contract_export_types().into_iter().collect();

        for export_type in &export_types {
            if !self.wit_map.contains(export_type) {
                issues.push(format!(
                    "field_policy agent_contract_export includes unknown canonical type \
                     '{export_type}'."
                ));
            }
        }

        for (canonical_type, remote) in &self.wit_map.canonical_to_ado {
            if self.generated.get(remote).is_none() {
                issues.push(format!(
                    "wit_map missing in generated metadata: canonical '{canonical_type}' -> \
                     remote '{remote}'."
                ));
            }
        }

        for (field_key, mapping) in &self.field_map.canonical_to_ado {
            for canonical_type in &mapping.applies_to {
                let Some(remote) = self.wit_map.get(canonical_type) else {
                    issues.push(format!(
                        "field_map references canonical type '{canonical_type}' for field \
                         '{field_key}', but that type is absent in wit_map."
                    ));
                    continue;
                };
                let Some(capabilities) = self.generated.get(remote) else {
                    issues.push(format!(
                        "field_map references remote type '{remote}' for field '{field_key}', but \
                         it is absent in generated metadata."
                    ));
                    continue;
                };
                if !capabilities.has_field(&mapping.reference_name) {
                    issues.push(format!(
                        "field_map reference '{}' for canonical field '{field_key}' is absent in \
                         generated metadata for remote type '{remote}'.",
                        mapping.reference_name
                    ));
                }
            }
        }

        let policy_sections = [
            ("required_fields", &self.field_policy.required_fields),
            ("allowed_fields", &self.field_policy.allowed_fields),
        ];
        for (section, type_to_fields) in policy_sections {
            for (canonical_type, field_keys) in type_to_fields {
                if !export_types.contains(canonical_type) {
                    continue;
                }
                if !self.wit_map.contains(canonical_type) {
                    issues.push(format!(
                        "field_policy {section} references unknown canonical type \
                         '{canonical_type}'."
                    ));
                }
                for field_key in field_keys {
                    match self.field_map.get(field_key) {
                        None => issues.push(format!(
                            "field_policy {section} references unknown canonical field key \
                             '{field_key}'."
                        )),
                        Some(mapping) if !mapping.applies_to_type(canonical_type) => {
                            issues.push(format!(
                                "field_policy {section} includes '{field_key}' for \
                                 '{canonical_type}', but field_map does not allow that type."
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        issues
    }

    /// Returns, per wit-map type, the canonical keys whose mapped reference
    /// name is required by the generated metadata for the type's remote type.
    #[must_use]
    pub fn generated_required_fields_by_type(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut required: BTreeMap<String, BTreeSet<String>> = self
            .wit_map
            .canonical_to_ado
            .keys()
            .map(|canonical_type| (canonical_type.clone(), BTreeSet::new()))
            .collect();
        for (canonical_type, keys) in &mut required {
            let Some(capabilities) = self.capabilities_for(canonical_type) else {
                continue;
            };
            for mapping in self.field_map.canonical_to_ado.values() {
                if mapping.applies_to_type(canonical_type)
                    && capabilities.required_field_reference_names.contains(&mapping.reference_name)
                {
                    keys.insert(mapping.canonical_key.clone());
                }
            }
        }
        required
    }

    /// Returns generated-required keys united with policy-required keys, per type.
    #[must_use]
    pub fn effective_required_fields_by_type(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut effective = self.generated_required_fields_by_type();
        for (canonical_type, field_keys) in &self.field_policy.required_fields {
            effective.entry(canonical_type.clone()).or_default().extend(field_keys.iter().cloned());
        }
        effective
    }
}

// ============================================================================
// SECTION: Field Policy Persistence
// ============================================================================

/// Serialized layout of `field_policy.yaml`.
#[derive(Serialize)]
struct FieldPolicyDocument<'a> {
    /// Document schema version.
    schema_version: &'static str,
    /// Export scope block.
    agent_contract_export: ExportBlock<'a>,
    /// Sorted allowed fields.
    allowed_fields: BTreeMap<&'a str, Vec<&'a str>>,
    /// Sorted required fields.
    required_fields: BTreeMap<&'a str, Vec<&'a str>>,
    /// Sorted required description sections.
    description_required_sections: BTreeMap<&'a str, Vec<&'a str>>,
    /// Sorted optional description sections.
    description_optional_sections: BTreeMap<&'a str, Vec<&'a str>>,
    /// Owner identity block.
    owner_identity: OwnerIdentityBlock,
}

/// Serialized `agent_contract_export` block.
#[derive(Serialize)]
struct ExportBlock<'a> {
    /// Export scope in authoring order.
    include_work_item_types: &'a [String],
}

/// Serialized `owner_identity` block.
#[derive(Serialize)]
struct OwnerIdentityBlock {
    /// Owner identity format name.
    format: &'static str,
}

/// Sorts each value list while keeping the map keyed deterministically.
fn sorted_sets(map: &BTreeMap<String, Vec<String>>) -> BTreeMap<&str, Vec<&str>> {
    map.iter()
        .map(|(key, values)| {
            let set: BTreeSet<&str> = values.iter().map(String::as_str).collect();
            (key.as_str(), set.into_iter().collect())
        })
        .collect()
}

/// Rewrites `field_policy.yaml` with every section present and sorted.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the document cannot be written.
pub fn save_field_policy(policy: &FieldPolicy, path: &Path) -> Result<(), ConfigError> {
    let document = FieldPolicyDocument {
        schema_version: POLICY_SCHEMA_VERSION,
        agent_contract_export: ExportBlock {
            include_work_item_types: &policy.export_work_item_types,
        },
        allowed_fields: sorted_sets(&policy.allowed_fields),
        required_fields: sorted_sets(&policy.required_fields),
        description_required_sections: sorted_sets(&policy.description_required_sections),
        description_optional_sections: sorted_sets(&policy.description_optional_sections),
        owner_identity: OwnerIdentityBlock {
            format: policy.owner_identity_format.as_str(),
        },
    };
    write_yaml_atomic(path, &document, FIELD_POLICY_HEADER).map_err(|err| match err {
        PersistError::Io {
            path,
            message,
        } => ConfigError::Io {
            path,
            message,
        },
        PersistError::Encode(message) => ConfigError::Io {
            path: path.display().to_string(),
            message,
        },
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
