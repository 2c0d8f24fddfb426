// crates/outbox-contract/src/snapshot.rs
// ============================================================================
// Module: Agent Contract Snapshot
// Description: Export of the effective contract for bundle authors.
// Purpose: Promote remote-required fields into policy and publish a snapshot.
// Dependencies: outbox-config, serde, serde_yaml, tracing
// ============================================================================

//! ## Overview
//! [`export_contract`] loads the contract, merges generated-required fields
//! into `field_policy.required_fields` for export-scope types, rewrites the
//! policy when that added anything, and writes `agent_contract.yaml`.
//!
//! ## Invariants
//! - Policy is rewritten only when a generated-required key was missing.
//! - Types outside the export scope keep their required fields unchanged.
//! - Every map and list in the snapshot is emitted in sorted order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use outbox_config::ContractPaths;
use outbox_config::EffectiveContract;
use outbox_config::FieldPolicy;
use outbox_config::clock;
use outbox_config::contract::FIELD_POLICY_FILE;
use outbox_config::save_field_policy;
use outbox_config::write_yaml_atomic;
use serde::Serialize;
use serde_yaml::Mapping;
use serde_yaml::Value;
use tracing::info;

use crate::ContractError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Snapshot schema version.
const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";

/// Header written above the snapshot.
const SNAPSHOT_HEADER: &[&str] = &[
    "MACHINE-GENERATED FILE. DO NOT EDIT BY HAND.",
    "Generated by `outbox contract export`.",
    "Edit the policy documents (and refresh generated wit_contract.yaml) to change this contract.",
];

// ============================================================================
// SECTION: Snapshot Model
// ============================================================================

/// Result of an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    /// Path the snapshot was written to.
    pub output_path: PathBuf,
    /// True when the contract has no coverage issues.
    pub strict_ready: bool,
    /// True when `field_policy.yaml` was rewritten.
    pub field_policy_updated: bool,
}

/// Serialized snapshot document.
#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    /// Snapshot schema version.
    schema_version: &'static str,
    /// RFC 3339 generation time.
    generated_at_utc: String,
    /// Types and field mappings in scope.
    canonical: CanonicalSection<'a>,
    /// Link and content rules.
    rules: RulesSection<'a>,
    /// Flat canonical to remote mappings.
    mapping: MappingSection<'a>,
    /// Remote field availability per exported type.
    ado_capabilities: BTreeMap<&'a str, Capabilities<'a>>,
    /// Field policy restricted to the export scope.
    field_policy: PolicySection,
    /// Coverage outcome.
    validation: ValidationSection,
}

/// `canonical` snapshot section.
#[derive(Debug, Serialize)]
struct CanonicalSection<'a> {
    /// Exported wit-map types, sorted.
    supported_types: Vec<&'a str>,
    /// Every field mapping, sorted by key.
    field_mappings: Vec<FieldMappingEntry<'a>>,
}

/// One field mapping in the snapshot.
#[derive(Debug, Serialize)]
struct FieldMappingEntry<'a> {
    /// Canonical key.
    canonical_key: &'a str,
    /// Remote reference name.
    reference_name: &'a str,
    /// Applicable types; empty means all.
    applies_to: &'a [String],
    /// Optional description.
    description: Option<&'a str>,
}

/// `rules` snapshot section.
#[derive(Debug, Serialize)]
struct RulesSection<'a> {
    /// Link policy as loaded.
    link_policy: LinkRules<'a>,
    /// Standards restricted to the export scope.
    standards: StandardsRules<'a>,
}

/// Link policy in the snapshot.
#[derive(Debug, Serialize)]
struct LinkRules<'a> {
    /// Allowed link types.
    allowed_link_types: &'a [String],
    /// Maximum hierarchy depth.
    max_depth: u32,
    /// Types that may not nest under themselves.
    forbid_double_nesting: &'a [String],
}

/// Standards in the snapshot.
#[derive(Debug, Serialize)]
struct StandardsRules<'a> {
    /// Required tags.
    required_tags: &'a [String],
    /// Per-type rules with nested keys sorted.
    work_item_standards: BTreeMap<&'a str, BTreeMap<&'a str, Value>>,
}

/// `mapping` snapshot section.
#[derive(Debug, Serialize)]
struct MappingSection<'a> {
    /// Canonical to remote type names.
    wit_map: &'a BTreeMap<String, String>,
    /// Canonical key to remote reference name.
    field_map: BTreeMap<&'a str, &'a str>,
}

/// Remote capabilities for one exported type.
#[derive(Debug, Serialize)]
struct Capabilities<'a> {
    /// Remote type name.
    ado_work_item_type: &'a str,
    /// Available reference names, sorted.
    available_fields: Vec<&'a str>,
    /// Remote-required reference names, sorted.
    required_fields: Vec<&'a str>,
}

/// `field_policy` snapshot section.
#[derive(Debug, Serialize)]
struct PolicySection {
    /// Allowed fields per exported type.
    allowed_fields: BTreeMap<String, BTreeSet<String>>,
    /// Policy-required fields per exported type.
    required_fields: BTreeMap<String, BTreeSet<String>>,
    /// Required description sections per exported type.
    description_required_sections: BTreeMap<String, BTreeSet<String>>,
    /// Optional description sections per exported type.
    description_optional_sections: BTreeMap<String, BTreeSet<String>>,
    /// Remote-required fields per exported type.
    generated_required_fields: BTreeMap<String, BTreeSet<String>>,
    /// Union of remote- and policy-required fields per exported type.
    effective_required_fields: BTreeMap<String, BTreeSet<String>>,
    /// Export scope, sorted.
    export_work_item_types: BTreeSet<String>,
}

/// `validation` snapshot section.
#[derive(Debug, Serialize)]
struct ValidationSection {
    /// Coverage issues from the loader.
    mapping_coverage_issues: Vec<String>,
    /// True when there are no coverage issues.
    strict_ready: bool,
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Exports the agent contract snapshot to `out_path`.
///
/// # Errors
///
/// Returns [`ContractError`] when the contract cannot be loaded, the field
/// policy cannot be rewritten, or the snapshot cannot be written.
pub fn export_contract(
    paths: &ContractPaths,
    out_path: &Path,
) -> Result<ExportOutcome, ContractError> {
    let mut contract = EffectiveContract::load(paths)?;
    let field_policy_updated = if let Some(promoted) = promote_generated_required(&contract) {
        save_field_policy(&promoted, &paths.policy_file(FIELD_POLICY_FILE))?;
        contract = EffectiveContract::load(paths)?;
        true
    } else {
        false
    };

    let snapshot = build_snapshot(&contract);
    let strict_ready = snapshot.validation.strict_ready;
    write_yaml_atomic(out_path, &snapshot, SNAPSHOT_HEADER)?;
    info!(
        output = %out_path.display(),
        strict_ready,
        field_policy_updated,
        "exported agent contract"
    );
    Ok(ExportOutcome {
        output_path: out_path.to_path_buf(),
        strict_ready,
        field_policy_updated,
    })
}

/// Returns a field policy with generated-required keys merged into
/// export-scope types, or `None` when nothing would be added.
fn promote_generated_required(contract: &EffectiveContract) -> Option<FieldPolicy> {
    let export_types: BTreeSet<String> = contract.agent_contract_export_types().into_iter().collect();
    let mut policy = contract.field_policy.clone();
    let mut changed = false;
    for (canonical_type, generated) in contract.generated_required_fields_by_type() {
        if !export_types.contains(&canonical_type) {
            continue;
        }
        let required = policy.required_fields.entry(canonical_type).or_default();
        for field_key in generated {
            if !required.contains(&field_key) {
                required.push(field_key);
                changed = true;
            }
        }
    }
    changed.then_some(policy)
}

/// Keeps only entries whose type is in the export scope, as sorted sets.
fn export_only(
    typed: &BTreeMap<String, Vec<String>>,
    export_types: &BTreeSet<String>,
) -> BTreeMap<String, BTreeSet<String>> {
    typed
        .iter()
        .filter(|(canonical_type, _)| export_types.contains(*canonical_type))
        .map(|(canonical_type, keys)| (canonical_type.clone(), keys.iter().cloned().collect()))
        .collect()
}

/// Keeps only derived entries whose type is in the export scope.
fn export_only_sets(
    typed: BTreeMap<String, BTreeSet<String>>,
    export_types: &BTreeSet<String>,
) -> BTreeMap<String, BTreeSet<String>> {
    typed.into_iter().filter(|(canonical_type, _)| export_types.contains(canonical_type)).collect()
}

/// Recursively sorts mapping keys inside a rule body.
fn sorted_nested(value: &Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(&Value, &Value)> = mapping.iter().collect();
            entries.sort_by_key(|(key, _)| sort_key(key));
            let mut sorted = Mapping::new();
            for (key, nested) in entries {
                sorted.insert(key.clone(), sorted_nested(nested));
            }
            Value::Mapping(sorted)
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(sorted_nested).collect()),
        other => other.clone(),
    }
}

/// Sort key for a YAML mapping key.
fn sort_key(key: &Value) -> String {
    key.as_str().map_or_else(|| serde_yaml::to_string(key).unwrap_or_default(), str::to_string)
}

/// Builds the snapshot document from a loaded contract.
fn build_snapshot(contract: &EffectiveContract) -> Snapshot<'_> {
    let coverage_issues = contract.validate_mapping_coverage();
    let export_types: BTreeSet<String> = contract.agent_contract_export_types().into_iter().collect();

    let supported_types: Vec<&str> = contract
        .wit_map
        .canonical_to_ado
        .keys()
        .filter(|canonical_type| export_types.contains(*canonical_type))
        .map(String::as_str)
        .collect();

    let field_mappings: Vec<FieldMappingEntry<'_>> = contract
        .field_map
        .canonical_to_ado
        .iter()
        .map(|(key, mapping)| FieldMappingEntry {
            canonical_key: key,
            reference_name: &mapping.reference_name,
            applies_to: &mapping.applies_to,
            description: mapping.description.as_deref(),
        })
        .collect();

    let mut ado_capabilities = BTreeMap::new();
    for canonical_type in &supported_types {
        let Some(remote) = contract.wit_map.get(canonical_type) else {
            continue;
        };
        let capabilities = contract.generated.get(remote);
        let entry = Capabilities {
            ado_work_item_type: remote,
            available_fields: capabilities
                .map(|caps| caps.field_reference_names.iter().map(String::as_str).collect())
                .unwrap_or_default(),
            required_fields: capabilities
                .map(|caps| caps.required_field_reference_names.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        };
        ado_capabilities.insert(*canonical_type, entry);
    }

    let work_item_standards: BTreeMap<&str, BTreeMap<&str, Value>> = contract
        .standards
        .work_item_standards
        .iter()
        .filter(|(canonical_type, _)| export_types.contains(*canonical_type))
        .map(|(canonical_type, rules)| {
            let rules: BTreeMap<&str, Value> = rules
                .iter()
                .map(|(field, rule)| (field.as_str(), sorted_nested(rule.body())))
                .collect();
            (canonical_type.as_str(), rules)
        })
        .collect();

    let policy = &contract.field_policy;
    let strict_ready = coverage_issues.is_empty();
    Snapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        generated_at_utc: clock::now_rfc3339(),
        canonical: CanonicalSection {
            supported_types,
            field_mappings,
        },
        rules: RulesSection {
            link_policy: LinkRules {
                allowed_link_types: &contract.link_policy.allowed_link_types,
                max_depth: contract.link_policy.max_depth,
                forbid_double_nesting: &contract.link_policy.forbid_double_nesting,
            },
            standards: StandardsRules {
                required_tags: &contract.standards.required_tags,
                work_item_standards,
            },
        },
        mapping: MappingSection {
            wit_map: &contract.wit_map.canonical_to_ado,
            field_map: contract
                .field_map
                .canonical_to_ado
                .iter()
                .map(|(key, mapping)| (key.as_str(), mapping.reference_name.as_str()))
                .collect(),
        },
        ado_capabilities,
        field_policy: PolicySection {
            allowed_fields: export_only(&policy.allowed_fields, &export_types),
            required_fields: export_only(&policy.required_fields, &export_types),
            description_required_sections: export_only(
                &policy.description_required_sections,
                &export_types,
            ),
            description_optional_sections: export_only(
                &policy.description_optional_sections,
                &export_types,
            ),
            generated_required_fields: export_only_sets(
                contract.generated_required_fields_by_type(),
                &export_types,
            ),
            effective_required_fields: export_only_sets(
                contract.effective_required_fields_by_type(),
                &export_types,
            ),
            export_work_item_types: export_types,
        },
        validation: ValidationSection {
            mapping_coverage_issues: coverage_issues,
            strict_ready,
        },
    }
}
