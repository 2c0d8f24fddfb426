// crates/outbox-contract/src/lint.rs
// ============================================================================
// Module: Contract Linter
// Description: Cross-document authoring checks over the effective contract.
// Purpose: Report contract mistakes as sorted findings without failing.
// Dependencies: outbox-config, serde, tracing
// ============================================================================

//! ## Overview
//! The linter loads the contract and checks every cross-reference between the
//! wit map, field map, field policy, standards, and generated metadata. A load
//! failure becomes a single `CONFIG_LOAD_ERROR` finding.
//!
//! ## Invariants
//! - [`lint_contract`] never returns an error.
//! - Findings are sorted by severity, path, code, then message.
//! - `strict_ready` is true iff no finding has error severity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use outbox_config::ContractPaths;
use outbox_config::EffectiveContract;
use outbox_config::Severity;
use outbox_config::clock;
use outbox_config::write_yaml_atomic;
use serde::Serialize;
use tracing::debug;

use crate::ContractError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version of the lint report.
const REPORT_SCHEMA_VERSION: &str = "1.0";
/// Path used for findings that are not tied to one document entry.
const CONFIG_PATH: &str = "config";
/// Path of the export scope list.
const EXPORT_SCOPE_PATH: &str = "field_policy.agent_contract_export.include_work_item_types";

// ============================================================================
// SECTION: Findings
// ============================================================================

/// Stable machine-readable finding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    /// Contract documents failed to load.
    ConfigLoadError,
    /// Export scope names a type missing from the wit map.
    UnknownExportType,
    /// Field map `applies_to` names a type missing from the wit map.
    FieldMapUnknownType,
    /// Wit map entry has no generated metadata.
    WitMissingInGenerated,
    /// Field map reference is not available on the remote type.
    FieldRefMissingInWit,
    /// Policy section names a type missing from the wit map.
    PolicyUnknownType,
    /// Policy section names an unmapped field key.
    PolicyUnknownFieldKey,
    /// Policy uses a field for a type its mapping excludes.
    PolicyFieldNotApplicable,
    /// Required field is missing from a non-empty allow-list.
    RequiredNotInAllowed,
    /// Standards name a type missing from the wit map.
    StandardsUnknownType,
    /// Standards field is used by policy but unmapped.
    StandardsFieldUnmapped,
    /// Standards field mapping excludes the standards type.
    StandardsFieldNotApplicable,
    /// Standards require a field that policy does not.
    StandardsRequiredNotInPolicy,
    /// Type carries policy content but is outside the export scope.
    TypeExcludedFromExport,
}

impl FindingCode {
    /// Returns the serialized code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigLoadError => "CONFIG_LOAD_ERROR",
            Self::UnknownExportType => "UNKNOWN_EXPORT_TYPE",
            Self::FieldMapUnknownType => "FIELD_MAP_UNKNOWN_TYPE",
            Self::WitMissingInGenerated => "WIT_MISSING_IN_GENERATED",
            Self::FieldRefMissingInWit => "FIELD_REF_MISSING_IN_WIT",
            Self::PolicyUnknownType => "POLICY_UNKNOWN_TYPE",
            Self::PolicyUnknownFieldKey => "POLICY_UNKNOWN_FIELD_KEY",
            Self::PolicyFieldNotApplicable => "POLICY_FIELD_NOT_APPLICABLE",
            Self::RequiredNotInAllowed => "REQUIRED_NOT_IN_ALLOWED",
            Self::StandardsUnknownType => "STANDARDS_UNKNOWN_TYPE",
            Self::StandardsFieldUnmapped => "STANDARDS_FIELD_UNMAPPED",
            Self::StandardsFieldNotApplicable => "STANDARDS_FIELD_NOT_APPLICABLE",
            Self::StandardsRequiredNotInPolicy => "STANDARDS_REQUIRED_NOT_IN_POLICY",
            Self::TypeExcludedFromExport => "TYPE_EXCLUDED_FROM_EXPORT",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Finding severity.
    pub severity: Severity,
    /// Machine-readable code.
    pub code: FindingCode,
    /// Dotted document path the finding points at.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Suggested remediation.
    pub suggestion: String,
}

/// Counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LintSummary {
    /// Error findings.
    pub errors: usize,
    /// Warning findings.
    pub warnings: usize,
    /// Informational findings.
    pub info: usize,
}

/// Directories the report was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintInputs {
    /// Policy directory.
    pub policy_dir: String,
    /// Generated directory.
    pub generated_dir: String,
}

/// Complete lint report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    /// Report schema version.
    pub schema_version: String,
    /// RFC 3339 generation time.
    pub generated_at_utc: String,
    /// Input directories.
    pub inputs: LintInputs,
    /// Severity counts.
    pub summary: LintSummary,
    /// Sorted findings.
    pub findings: Vec<Finding>,
    /// True when no error findings exist.
    pub strict_ready: bool,
}

impl LintReport {
    /// Builds a report, sorting findings and computing the summary.
    #[must_use]
    pub fn from_findings(paths: &ContractPaths, mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|lhs, rhs| {
            (lhs.severity, &lhs.path, lhs.code.as_str(), &lhs.message).cmp(&(
                rhs.severity,
                &rhs.path,
                rhs.code.as_str(),
                &rhs.message,
            ))
        });
        let mut summary = LintSummary::default();
        for finding in &findings {
            match finding.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.info += 1,
            }
        }
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at_utc: clock::now_rfc3339(),
            inputs: LintInputs {
                policy_dir: paths.policy_dir.display().to_string(),
                generated_dir: paths.generated_dir.display().to_string(),
            },
            strict_ready: summary.errors == 0,
            summary,
            findings,
        }
    }
}

// ============================================================================
// SECTION: Entry Points
// ============================================================================

/// Lints the contract under `paths`. Never fails; load errors become findings.
#[must_use]
pub fn lint_contract(paths: &ContractPaths) -> LintReport {
    let findings = match EffectiveContract::load(paths) {
        Ok(contract) => lint_loaded_contract(&contract),
        Err(err) => vec![Finding {
            severity: Severity::Error,
            code: FindingCode::ConfigLoadError,
            path: CONFIG_PATH.to_string(),
            message: err.to_string(),
            suggestion: "Fix config structure/content and rerun contract lint.".to_string(),
        }],
    };
    let report = LintReport::from_findings(paths, findings);
    debug!(
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        info = report.summary.info,
        "contract lint finished"
    );
    report
}

/// Writes a lint report as YAML.
///
/// # Errors
///
/// Returns [`ContractError::Persist`] when the report cannot be written.
pub fn write_lint_report(report: &LintReport, out_path: &Path) -> Result<(), ContractError> {
    write_yaml_atomic(out_path, report, &[])?;
    Ok(())
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Accumulates findings for one lint pass.
struct Findings(Vec<Finding>);

impl Findings {
    /// Records a finding.
    fn push(
        &mut self,
        severity: Severity,
        code: FindingCode,
        path: String,
        message: String,
        suggestion: &str,
    ) {
        self.0.push(Finding {
            severity,
            code,
            path,
            message,
            suggestion: suggestion.to_string(),
        });
    }

    /// Records an error finding.
    fn error(&mut self, code: FindingCode, path: String, message: String, suggestion: &str) {
        self.push(Severity::Error, code, path, message, suggestion);
    }
}

/// Runs every rule against a loaded contract.
fn lint_loaded_contract(contract: &EffectiveContract) -> Vec<Finding> {
    let mut findings = Findings(Vec::new());
    lint_export_scope(contract, &mut findings);
    lint_field_map(contract, &mut findings);
    lint_policy_fields(contract, &mut findings);
    lint_required_in_allowed(contract, &mut findings);
    lint_description_sections(contract, &mut findings);
    lint_standards(contract, &mut findings);
    lint_excluded_types(contract, &mut findings);
    findings.0
}

/// Export scope must only name wit-map types.
fn lint_export_scope(contract: &EffectiveContract, findings: &mut Findings) {
    for canonical_type in &contract.field_policy.export_work_item_types {
        if !contract.wit_map.contains(canonical_type) {
            findings.error(
                FindingCode::UnknownExportType,
                EXPORT_SCOPE_PATH.to_string(),
                format!("Export includes unknown canonical type '{canonical_type}'."),
                "Add the type to wit_map.canonical_to_ado or remove it from export scope.",
            );
        }
    }
}

/// Field map entries must resolve through the wit map to generated metadata.
fn lint_field_map(contract: &EffectiveContract, findings: &mut Findings) {
    for (field_key, mapping) in &contract.field_map.canonical_to_ado {
        for canonical_type in &mapping.applies_to {
            let Some(remote) = contract.wit_map.get(canonical_type) else {
                findings.error(
                    FindingCode::FieldMapUnknownType,
                    format!("field_map.canonical_to_ado.{field_key}.applies_to"),
                    format!(
                        "Field '{field_key}' applies to unknown canonical type '{canonical_type}'."
                    ),
                    "Fix applies_to or add canonical type to wit_map.canonical_to_ado.",
                );
                continue;
            };
            let Some(capabilities) = contract.generated.get(remote) else {
                findings.error(
                    FindingCode::WitMissingInGenerated,
                    format!("wit_map.canonical_to_ado.{canonical_type}"),
                    format!("Remote work item type '{remote}' is missing in generated wit_contract."),
                    "Re-run the metadata sync to refresh generated wit_contract.yaml.",
                );
                continue;
            };
            if !capabilities.has_field(&mapping.reference_name) {
                findings.error(
                    FindingCode::FieldRefMissingInWit,
                    format!("field_map.canonical_to_ado.{field_key}.reference_name"),
                    format!(
                        "Reference '{}' for canonical field '{field_key}' is absent in remote type \
                         '{remote}'.",
                        mapping.reference_name
                    ),
                    "Correct the mapping or regenerate wit metadata from the remote system.",
                );
            }
        }
    }
}

/// Allowed and required field sections must name mapped, applicable keys.
fn lint_policy_fields(contract: &EffectiveContract, findings: &mut Findings) {
    let sections = [
        ("allowed_fields", &contract.field_policy.allowed_fields),
        ("required_fields", &contract.field_policy.required_fields),
    ];
    for (section, typed_fields) in sections {
        for (canonical_type, field_keys) in typed_fields {
            let path = format!("field_policy.{section}.{canonical_type}");
            if !contract.wit_map.contains(canonical_type) {
                findings.error(
                    FindingCode::PolicyUnknownType,
                    path,
                    format!(
                        "field_policy {section} references unknown canonical type \
                         '{canonical_type}'."
                    ),
                    "Rename to a canonical type from wit_map or add the type to wit_map.",
                );
                continue;
            }
            for field_key in field_keys {
                match contract.field_map.get(field_key) {
                    None => findings.error(
                        FindingCode::PolicyUnknownFieldKey,
                        path.clone(),
                        format!("field_policy {section} references unknown field key '{field_key}'."),
                        "Add field key to field_map.canonical_to_ado or remove it from field_policy.",
                    ),
                    Some(mapping) if !mapping.applies_to_type(canonical_type) => findings.error(
                        FindingCode::PolicyFieldNotApplicable,
                        path.clone(),
                        format!(
                            "field_policy {section} includes '{field_key}' for '{canonical_type}', \
                             but field_map.applies_to does not include that type."
                        ),
                        "Align field_policy type usage with field_map.applies_to.",
                    ),
                    Some(_) => {}
                }
            }
        }
    }
}

/// Required keys should appear in a non-empty allow-list for the same type.
fn lint_required_in_allowed(contract: &EffectiveContract, findings: &mut Findings) {
    for (canonical_type, required) in &contract.field_policy.required_fields {
        let allowed = contract.field_policy.allowed_for(canonical_type);
        if allowed.is_empty() {
            continue;
        }
        for field_key in required {
            if !allowed.contains(field_key) {
                findings.push(
                    Severity::Warning,
                    FindingCode::RequiredNotInAllowed,
                    format!("field_policy.required_fields.{canonical_type}"),
                    format!(
                        "Required field '{field_key}' is missing from allowed_fields for \
                         '{canonical_type}'."
                    ),
                    "Add the field to allowed_fields or remove it from required_fields.",
                );
            }
        }
    }
}

/// Description section maps must name wit-map types.
fn lint_description_sections(contract: &EffectiveContract, findings: &mut Findings) {
    let sections = [
        ("description_required_sections", &contract.field_policy.description_required_sections),
        ("description_optional_sections", &contract.field_policy.description_optional_sections),
    ];
    for (section, typed_sections) in sections {
        for canonical_type in typed_sections.keys() {
            if !contract.wit_map.contains(canonical_type) {
                findings.error(
                    FindingCode::PolicyUnknownType,
                    format!("field_policy.{section}.{canonical_type}"),
                    format!(
                        "field_policy {section} references unknown canonical type \
                         '{canonical_type}'."
                    ),
                    "Rename to a canonical type from wit_map or add the type to wit_map.",
                );
            }
        }
    }
}

/// Standards must align with the wit map, field map, and required policy.
fn lint_standards(contract: &EffectiveContract, findings: &mut Findings) {
    for (canonical_type, rules) in &contract.standards.work_item_standards {
        if !contract.wit_map.contains(canonical_type) {
            findings.error(
                FindingCode::StandardsUnknownType,
                format!("standards.work_item_standards.{canonical_type}"),
                format!("standards references unknown canonical type '{canonical_type}'."),
                "Rename to a canonical type from wit_map or add the type to wit_map.",
            );
            continue;
        }
        let required = contract.field_policy.required_for(canonical_type);
        let allowed = contract.field_policy.allowed_for(canonical_type);
        for (field_key, rule) in rules {
            let path = format!("standards.work_item_standards.{canonical_type}.{field_key}");
            let used_by_policy = required.contains(field_key) || allowed.contains(field_key);
            let Some(mapping) = contract.field_map.get(field_key) else {
                if used_by_policy {
                    findings.error(
                        FindingCode::StandardsFieldUnmapped,
                        path,
                        format!(
                            "Standards field '{field_key}' is used in policy but missing from \
                             field_map."
                        ),
                        "Add a canonical field mapping or remove the field from standards/policy.",
                    );
                }
                continue;
            };
            if !mapping.applies_to_type(canonical_type) {
                findings.error(
                    FindingCode::StandardsFieldNotApplicable,
                    path.clone(),
                    format!(
                        "Standards field '{field_key}' is mapped but not applicable to canonical \
                         type '{canonical_type}' per field_map."
                    ),
                    "Align standards type usage with field_map.applies_to.",
                );
            }
            if rule.is_required() && !required.contains(field_key) {
                findings.error(
                    FindingCode::StandardsRequiredNotInPolicy,
                    format!("{path}.required"),
                    format!(
                        "Standards marks '{field_key}' as required for '{canonical_type}', but \
                         field_policy.required_fields does not."
                    ),
                    "Add the field to field_policy.required_fields or mark required=false in \
                     standards.",
                );
            }
        }
    }
}

/// Returns, per canonical type, the document sections that mention it.
fn policy_types_by_source(
    contract: &EffectiveContract,
) -> BTreeMap<&str, BTreeSet<&'static str>> {
    let policy = &contract.field_policy;
    let sources = [
        ("field_policy.allowed_fields", &policy.allowed_fields),
        ("field_policy.required_fields", &policy.required_fields),
        ("field_policy.description_required_sections", &policy.description_required_sections),
        ("field_policy.description_optional_sections", &policy.description_optional_sections),
    ];
    let mut by_type: BTreeMap<&str, BTreeSet<&'static str>> = BTreeMap::new();
    for (source, type_map) in sources {
        for canonical_type in type_map.keys() {
            by_type.entry(canonical_type.as_str()).or_default().insert(source);
        }
    }
    for canonical_type in contract.standards.work_item_standards.keys() {
        by_type.entry(canonical_type.as_str()).or_default().insert("standards.work_item_standards");
    }
    by_type
}

/// Known types with policy content outside the export scope are reported once.
fn lint_excluded_types(contract: &EffectiveContract, findings: &mut Findings) {
    let export_types: BTreeSet<String> = contract.agent_contract_export_types().into_iter().collect();
    for (canonical_type, sources) in policy_types_by_source(contract) {
        if !contract.wit_map.contains(canonical_type) || export_types.contains(canonical_type) {
            continue;
        }
        let source_list = sources.into_iter().collect::<Vec<_>>().join(", ");
        findings.push(
            Severity::Info,
            FindingCode::TypeExcludedFromExport,
            EXPORT_SCOPE_PATH.to_string(),
            format!(
                "Canonical type '{canonical_type}' has policy/standards entries in [{source_list}] \
                 but is excluded from agent contract export."
            ),
            "Add this type to include_work_item_types if agents should receive this contract \
             surface.",
        );
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
