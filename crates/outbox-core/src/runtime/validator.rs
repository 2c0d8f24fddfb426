// crates/outbox-core/src/runtime/validator.rs
// ============================================================================
// Module: Bundle Validator
// Description: Three-stage bundle validation with short-circuiting.
// Purpose: Produce a structured report for every bundle, never an error.
// Dependencies: crate::core, outbox-config, jsonschema, serde_json, tracing
// ============================================================================

//! ## Overview
//! Stages run strictly in order: schema, policy, metadata. A later stage runs
//! only when every earlier stage produced no error issue; stages that did not
//! run are reported as skipped.
//!
//! ## Invariants
//! - Content problems become issues; [`BundleValidator::validate_file`] is
//!   infallible.
//! - The local parent walk stops at the first repeated id or at the first
//!   step beyond `max_depth`, so it always terminates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use jsonschema::Draft;
use jsonschema::Validator;
use outbox_config::ContractPaths;
use outbox_config::EffectiveContract;
use outbox_config::PathCatalog;
use outbox_config::Reference;
use outbox_config::contract::AREA_PATHS_FILE;
use outbox_config::contract::ITERATION_PATHS_FILE;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::Bundle;
use crate::core::BundleContext;
use crate::core::IssueCode;
use crate::core::ReportedBundle;
use crate::core::Stage;
use crate::core::StageIssues;
use crate::core::ValidationIssue;
use crate::core::ValidationReport;
use crate::core::WorkItem;
use crate::core::bundle::AREA_PATH_KEY;
use crate::core::bundle::ITERATION_PATH_KEY;
use crate::core::report::has_errors;
use crate::runtime::OutboxError;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Loaded contract, compiled schema, and path catalogs for a validation run.
pub struct BundleValidator {
    /// Effective contract.
    contract: EffectiveContract,
    /// Compiled bundle schema.
    schema: Validator,
    /// Generated area path catalog.
    area_paths: Reference<PathCatalog>,
    /// Generated iteration path catalog.
    iteration_paths: Reference<PathCatalog>,
    /// Area catalog location, used as the path of its metadata issue.
    area_paths_file: String,
    /// Iteration catalog location, used as the path of its metadata issue.
    iteration_paths_file: String,
}

impl BundleValidator {
    /// Loads the contract, path catalogs, and bundle schema.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Config`] when the contract is unloadable, or
    /// [`OutboxError::Schema`] when the schema is unreadable or invalid.
    pub fn load(paths: &ContractPaths, schema_path: &Path) -> Result<Self, OutboxError> {
        let schema = load_schema(schema_path)?;
        let contract = EffectiveContract::load(paths)?;
        Ok(Self {
            contract,
            schema,
            area_paths: paths.area_paths(),
            iteration_paths: paths.iteration_paths(),
            area_paths_file: paths.generated_file(AREA_PATHS_FILE).display().to_string(),
            iteration_paths_file: paths.generated_file(ITERATION_PATHS_FILE).display().to_string(),
        })
    }

    /// Returns the loaded contract.
    #[must_use]
    pub const fn contract(&self) -> &EffectiveContract {
        &self.contract
    }

    /// Reads and validates one bundle file.
    #[must_use]
    pub fn validate_file(&self, path: &Path) -> ValidationReport {
        let source_path = path.display().to_string();
        let document = fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|err| err.to_string()))
            .and_then(|value| {
                if value.is_object() {
                    Ok(value)
                } else {
                    Err("Bundle JSON must decode to an object.".to_string())
                }
            });
        match document {
            Ok(document) => self.validate_value(&source_path, &document),
            Err(reason) => ValidationReport::assemble(
                ReportedBundle {
                    source_path,
                    bundle_id: None,
                },
                StageIssues {
                    schema: vec![ValidationIssue::error(
                        Stage::Schema,
                        IssueCode::BundleJsonDecodeError,
                        "$",
                        format!("Failed to parse bundle JSON: {reason}"),
                        "Provide a valid JSON object file.",
                    )],
                    policy: None,
                    metadata: None,
                },
            ),
        }
    }

    /// Validates a decoded bundle document.
    #[must_use]
    pub fn validate_value(&self, source_path: &str, document: &Value) -> ValidationReport {
        let bundle_id = document.get("bundle_id").and_then(Value::as_str).map(str::to_string);
        let mut stage_issues = StageIssues {
            schema: self.schema_stage(document),
            policy: None,
            metadata: None,
        };
        if !has_errors(&stage_issues.schema) {
            match Bundle::deserialize(document) {
                Err(err) => stage_issues.schema.push(ValidationIssue::error(
                    Stage::Schema,
                    IssueCode::BundleShapeError,
                    "$",
                    format!("Bundle does not match the bundle model: {err}"),
                    "Align the bundle schema with the bundle model.",
                )),
                Ok(bundle) => {
                    let policy = policy_stage(&self.contract, &bundle);
                    let policy_passed = !has_errors(&policy);
                    stage_issues.policy = Some(policy);
                    if policy_passed {
                        stage_issues.metadata = Some(self.metadata_stage(&bundle));
                    }
                }
            }
        }
        let report = ValidationReport::assemble(
            ReportedBundle {
                source_path: source_path.to_string(),
                bundle_id,
            },
            stage_issues,
        );
        debug!(
            bundle = source_path,
            errors = report.summary.error_count,
            issues = report.issues.len(),
            "validated bundle"
        );
        report
    }

    // ========================================================================
    // SECTION: Schema Stage
    // ========================================================================

    /// Validates the raw document against the bundle schema.
    fn schema_stage(&self, document: &Value) -> Vec<ValidationIssue> {
        let mut violations: Vec<(String, String)> = self
            .schema
            .iter_errors(document)
            .map(|err| (pointer_to_path(&err.instance_path.to_string()), err.to_string()))
            .collect();
        violations.sort();
        violations
            .into_iter()
            .map(|(path, message)| {
                ValidationIssue::error(
                    Stage::Schema,
                    IssueCode::SchemaViolation,
                    path,
                    message,
                    "Fix bundle JSON to satisfy schema/bundle.schema.json.",
                )
            })
            .collect()
    }

    // ========================================================================
    // SECTION: Metadata Stage
    // ========================================================================

    /// Cross-checks items against the wit map, field map, generated fields,
    /// and path catalogs.
    fn metadata_stage(&self, bundle: &Bundle) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if let Some(reason) = self.area_paths.absence() {
            issues.push(ValidationIssue::info(
                Stage::Metadata,
                IssueCode::AreaPathsMetadataMissing,
                self.area_paths_file.as_str(),
                reason,
                "Re-run the metadata sync to regenerate paths_area.yaml.",
            ));
        }
        if let Some(reason) = self.iteration_paths.absence() {
            issues.push(ValidationIssue::info(
                Stage::Metadata,
                IssueCode::IterationPathsMetadataMissing,
                self.iteration_paths_file.as_str(),
                reason,
                "Re-run the metadata sync to regenerate paths_iteration.yaml.",
            ));
        }

        for (index, item) in bundle.work_items.iter().enumerate() {
            let item_path = format!("$.work_items.{index}");
            let Some(canonical_type) = item.canonical_type() else {
                continue;
            };
            let Some(remote_type) = self.contract.wit_map.get(canonical_type) else {
                issues.push(ValidationIssue::error(
                    Stage::Metadata,
                    IssueCode::UnknownCanonicalType,
                    format!("{item_path}.type"),
                    format!("Canonical type '{canonical_type}' has no wit_map entry."),
                    "Add the canonical type mapping to wit_map.yaml.",
                ));
                continue;
            };
            let Some(capabilities) = self.contract.generated.get(remote_type) else {
                issues.push(ValidationIssue::error(
                    Stage::Metadata,
                    IssueCode::WitNotInGeneratedMetadata,
                    format!("{item_path}.type"),
                    format!("Remote work item type '{remote_type}' is missing in wit_contract.yaml."),
                    "Regenerate work item type metadata with the metadata sync.",
                ));
                continue;
            };

            for field_key in item.fields.keys() {
                let field_path = format!("{item_path}.fields.{field_key}");
                match self.contract.field_map.get(field_key) {
                    None => issues.push(ValidationIssue::error(
                        Stage::Metadata,
                        IssueCode::UnknownCanonicalFieldKey,
                        field_path,
                        format!("Canonical field key '{field_key}' has no field_map entry."),
                        "Add the field to field_map.yaml or remove it from bundle fields.",
                    )),
                    Some(mapping) if !mapping.applies_to_type(canonical_type) => {
                        issues.push(ValidationIssue::error(
                            Stage::Metadata,
                            IssueCode::FieldNotApplicableToType,
                            field_path,
                            format!(
                                "Canonical field '{field_key}' is not applicable to type \
                                 '{canonical_type}' per field_map."
                            ),
                            "Adjust field_map applies_to or remove the field from bundle fields.",
                        ));
                    }
                    Some(mapping) if !capabilities.has_field(&mapping.reference_name) => {
                        issues.push(ValidationIssue::error(
                            Stage::Metadata,
                            IssueCode::AdoFieldUnavailableForWit,
                            field_path,
                            format!(
                                "Remote field '{}' (for '{field_key}') is not available on work \
                                 item type '{remote_type}'.",
                                mapping.reference_name
                            ),
                            "Update the mapping or remove the field for this type.",
                        ));
                    }
                    Some(_) => {}
                }
            }

            let label = item.label(index);
            check_classification(
                &mut issues,
                &ClassificationCheck {
                    key: AREA_PATH_KEY,
                    resolved: item.field_text(AREA_PATH_KEY).or_else(|| bundle.context.area_path()),
                    catalog: &self.area_paths,
                    unresolved: IssueCode::UnresolvedAreaPath,
                    unknown: IssueCode::UnknownAreaPath,
                    context_key: "default_area_path",
                    catalog_file: AREA_PATHS_FILE,
                },
                &item_path,
                &label,
            );
            check_classification(
                &mut issues,
                &ClassificationCheck {
                    key: ITERATION_PATH_KEY,
                    resolved: item
                        .field_text(ITERATION_PATH_KEY)
                        .or_else(|| bundle.context.iteration_path()),
                    catalog: &self.iteration_paths,
                    unresolved: IssueCode::UnresolvedIterationPath,
                    unknown: IssueCode::UnknownIterationPath,
                    context_key: "default_iteration_path",
                    catalog_file: ITERATION_PATHS_FILE,
                },
                &item_path,
                &label,
            );
        }
        issues
    }
}

/// Inputs for one area or iteration path check.
struct ClassificationCheck<'a> {
    /// Canonical field key.
    key: &'static str,
    /// Item value or bundle default.
    resolved: Option<&'a str>,
    /// Known paths, when harvested.
    catalog: &'a Reference<PathCatalog>,
    /// Code for a missing value.
    unresolved: IssueCode,
    /// Code for a value outside the catalog.
    unknown: IssueCode,
    /// Bundle context fallback key.
    context_key: &'static str,
    /// Catalog file name for the remediation hint.
    catalog_file: &'static str,
}

/// Checks that a resolved classification path exists and is known.
fn check_classification(
    issues: &mut Vec<ValidationIssue>,
    check: &ClassificationCheck<'_>,
    item_path: &str,
    label: &str,
) {
    let path = format!("{item_path}.fields.{}", check.key);
    let kind = check.key.trim_end_matches("_path");
    match check.resolved {
        None => issues.push(ValidationIssue::error(
            Stage::Metadata,
            check.unresolved,
            path,
            format!(
                "Work item '{label}' has no {key} and no context.{context_key} fallback.",
                key = check.key,
                context_key = check.context_key
            ),
            format!(
                "Set work_item.fields.{key} or context.{context_key}.",
                key = check.key,
                context_key = check.context_key
            ),
        )),
        Some(resolved) => {
            if check.catalog.loaded().is_some_and(|catalog| !catalog.contains(resolved)) {
                issues.push(ValidationIssue::error(
                    Stage::Metadata,
                    check.unknown,
                    path,
                    format!(
                        "Resolved {kind} path '{resolved}' is not present in generated {kind} \
                         paths."
                    ),
                    format!("Use a known path from {}.", check.catalog_file),
                ));
            }
        }
    }
}

// ============================================================================
// SECTION: Policy Stage
// ============================================================================

/// Applies duplicate-id, tag, required-field, allowed-field, and hierarchy rules.
fn policy_stage(contract: &EffectiveContract, bundle: &Bundle) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut by_local_id: BTreeMap<&str, &WorkItem> = BTreeMap::new();
    let mut duplicates: BTreeSet<&str> = BTreeSet::new();
    for item in &bundle.work_items {
        let Some(local_id) = item.local_id() else {
            continue;
        };
        if by_local_id.contains_key(local_id) {
            duplicates.insert(local_id);
        } else {
            by_local_id.insert(local_id, item);
        }
    }
    for duplicate in &duplicates {
        issues.push(ValidationIssue::error(
            Stage::Policy,
            IssueCode::DuplicateLocalId,
            "$.work_items.local_id",
            format!("Duplicate local_id '{duplicate}' found in bundle."),
            "Ensure each work item local_id is unique within the bundle.",
        ));
    }

    let effective_required = contract.effective_required_fields_by_type();
    let required_tags: BTreeSet<&str> = contract
        .standards
        .required_tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect();
    let context_tags: BTreeSet<&str> = bundle
        .context
        .tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect();

    for (index, item) in bundle.work_items.iter().enumerate() {
        let item_path = format!("$.work_items.{index}");
        let label = item.label(index);
        let canonical_type = item.canonical_type();

        if !required_tags.is_empty() {
            let present: BTreeSet<&str> = item.tag_set().chain(context_tags.iter().copied()).collect();
            let missing: Vec<&str> = required_tags.difference(&present).copied().collect();
            if !missing.is_empty() {
                issues.push(ValidationIssue::error(
                    Stage::Policy,
                    IssueCode::MissingRequiredTags,
                    format!("{item_path}.tags"),
                    format!(
                        "Work item '{label}' is missing required tags: [{}].",
                        missing.join(", ")
                    ),
                    "Add required tags in bundle context.tags or item tags.",
                ));
            }
        }

        if let Some(canonical_type) = canonical_type {
            for field_key in effective_required.get(canonical_type).into_iter().flatten() {
                if !required_key_satisfied(field_key, item, &bundle.context) {
                    issues.push(ValidationIssue::error(
                        Stage::Policy,
                        IssueCode::MissingRequiredField,
                        format!("{item_path}.fields.{field_key}"),
                        format!(
                            "Work item '{label}' ({canonical_type}) is missing required canonical \
                             field '{field_key}'."
                        ),
                        "Populate the required field in work_item.fields or the matching \
                         top-level key.",
                    ));
                }
            }

            let allowed = contract.field_policy.allowed_for(canonical_type);
            if !allowed.is_empty() {
                for field_key in item.fields.keys() {
                    if !allowed.iter().any(|entry| entry == field_key) {
                        issues.push(ValidationIssue::error(
                            Stage::Policy,
                            IssueCode::FieldNotAllowedByPolicy,
                            format!("{item_path}.fields.{field_key}"),
                            format!(
                                "Work item '{label}' ({canonical_type}) uses canonical field \
                                 '{field_key}' which is not allowed by field_policy."
                            ),
                            "Remove the field or add it to field_policy.allowed_fields for this \
                             type.",
                        ));
                    }
                }
            }
        }

        let Some(parent_local_id) = item.parent_local_id() else {
            continue;
        };
        let relation_path = format!("{item_path}.relations.parent_local_id");

        if let Some(parent) = by_local_id.get(parent_local_id)
            && let Some(canonical_type) = canonical_type
            && parent.canonical_type() == Some(canonical_type)
            && contract.link_policy.forbids_double_nesting(canonical_type)
        {
            issues.push(ValidationIssue::error(
                Stage::Policy,
                IssueCode::DoubleNestingForbidden,
                relation_path.as_str(),
                format!(
                    "Work item '{label}' has parent '{parent_local_id}' with the same type \
                     '{canonical_type}', which is forbidden by link policy."
                ),
                "Re-parent the item under an allowed parent type.",
            ));
        }

        let max_depth = contract.link_policy.max_depth;
        let mut depth: u32 = 1;
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(label.as_str());
        let mut cursor = Some(parent_local_id);
        while let Some((current, ancestor)) =
            cursor.and_then(|current| by_local_id.get(current).map(|ancestor| (current, *ancestor)))
        {
            if !seen.insert(current) {
                issues.push(ValidationIssue::error(
                    Stage::Policy,
                    IssueCode::HierarchyCycle,
                    relation_path.as_str(),
                    format!("Cycle detected in local parent chain at '{current}'."),
                    "Break the local parent cycle; the hierarchy must be acyclic.",
                ));
                break;
            }
            depth += 1;
            if depth > max_depth {
                issues.push(ValidationIssue::error(
                    Stage::Policy,
                    IssueCode::MaxDepthExceeded,
                    relation_path.as_str(),
                    format!("Local hierarchy depth for '{label}' exceeds max_depth={max_depth}."),
                    "Flatten the decomposition to satisfy max_depth.",
                ));
                break;
            }
            cursor = ancestor.parent_local_id();
        }
    }

    issues
}

/// Returns true when a required canonical key is supplied for an item.
///
/// Top-level keys must be non-empty on the item; other keys must be
/// non-empty under `fields`, except that area and iteration paths are also
/// satisfied by the bundle context default.
fn required_key_satisfied(field_key: &str, item: &WorkItem, context: &BundleContext) -> bool {
    if let Some(present) = item.top_level_present(field_key) {
        return present;
    }
    if item.field_present(field_key) {
        return true;
    }
    match field_key {
        AREA_PATH_KEY => context.area_path().is_some(),
        ITERATION_PATH_KEY => context.iteration_path().is_some(),
        _ => false,
    }
}

// ============================================================================
// SECTION: Schema Loading
// ============================================================================

/// Reads and compiles a draft 2020-12 bundle schema.
///
/// # Errors
///
/// Returns [`OutboxError::Schema`] when the file is missing, not a JSON
/// object, or not a valid schema.
pub fn load_schema(path: &Path) -> Result<Validator, OutboxError> {
    let schema_error = |message: String| OutboxError::Schema {
        path: path.display().to_string(),
        message,
    };
    let text = fs::read_to_string(path)
        .map_err(|err| schema_error(format!("bundle schema file not readable: {err}")))?;
    let schema: Value =
        serde_json::from_str(&text).map_err(|err| schema_error(format!("invalid JSON: {err}")))?;
    if !schema.is_object() {
        return Err(schema_error("bundle schema must decode to an object".to_string()));
    }
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| schema_error(format!("invalid schema: {err}")))
}

/// Converts a JSON Pointer into the `$.a.0.b` report path form.
fn pointer_to_path(pointer: &str) -> String {
    if pointer.is_empty() {
        return "$".to_string();
    }
    let segments: Vec<String> = pointer
        .trim_start_matches('/')
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect();
    format!("$.{}", segments.join("."))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
