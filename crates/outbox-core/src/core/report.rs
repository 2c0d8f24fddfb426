// crates/outbox-core/src/core/report.rs
// ============================================================================
// Module: Validation Report Model
// Description: Issues, stage statuses, and per-bundle validation reports.
// Purpose: Provide the stable, serializable shape of validation results.
// Dependencies: outbox-config, serde
// ============================================================================

//! ## Overview
//! Every validation stage emits [`ValidationIssue`] values. A
//! [`ValidationReport`] assembles them with per-stage statuses; stages that
//! did not run because an earlier stage failed are reported as skipped.
//!
//! ## Invariants
//! - A stage fails only on error-severity issues; informational issues are
//!   reported but never fail a bundle.
//! - `summary.error_count` counts error-severity issues only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use outbox_config::Severity;
use outbox_config::clock;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version written into validation reports.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Validation stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// JSON Schema conformance.
    Schema,
    /// Business rules from policy documents.
    Policy,
    /// Cross-reference against generated metadata.
    Metadata,
}

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage ran with no error issues.
    Passed,
    /// Stage ran and produced at least one error issue.
    Failed,
    /// Stage did not run because an earlier stage failed.
    Skipped,
}

/// Pass/fail outcome of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleOutcome {
    /// Bundle passed.
    Passed,
    /// Bundle failed.
    Failed,
}

impl BundleOutcome {
    /// Returns true for [`BundleOutcome::Passed`].
    #[must_use]
    pub const fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }
}

// ============================================================================
// SECTION: Issue Codes
// ============================================================================

/// Machine-readable validation issue codes.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Bundle file is not a JSON object.
    BundleJsonDecodeError,
    /// Bundle passed the schema but does not decode into the bundle model.
    BundleShapeError,
    /// JSON Schema violation.
    SchemaViolation,
    /// A local id appears more than once.
    DuplicateLocalId,
    /// Required tags are missing from the item and bundle context.
    MissingRequiredTags,
    /// A required canonical field is not supplied.
    MissingRequiredField,
    /// A field is outside the type's allowed fields.
    FieldNotAllowedByPolicy,
    /// An item is parented by an item of the same forbidden type.
    DoubleNestingForbidden,
    /// The local parent chain loops.
    HierarchyCycle,
    /// The local parent chain is deeper than the link policy allows.
    MaxDepthExceeded,
    /// The generated area path catalog is missing or unusable.
    AreaPathsMetadataMissing,
    /// The generated iteration path catalog is missing or unusable.
    IterationPathsMetadataMissing,
    /// The canonical type has no wit map entry.
    UnknownCanonicalType,
    /// The remote type is missing from generated metadata.
    WitNotInGeneratedMetadata,
    /// A field key has no field map entry.
    UnknownCanonicalFieldKey,
    /// A field mapping excludes the item's type.
    FieldNotApplicableToType,
    /// The mapped remote field is not available on the remote type.
    AdoFieldUnavailableForWit,
    /// No area path on the item or in the bundle context.
    UnresolvedAreaPath,
    /// No iteration path on the item or in the bundle context.
    UnresolvedIterationPath,
    /// The resolved area path is not in the generated catalog.
    UnknownAreaPath,
    /// The resolved iteration path is not in the generated catalog.
    UnknownIterationPath,
}

impl IssueCode {
    /// Returns the serialized code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BundleJsonDecodeError => "BUNDLE_JSON_DECODE_ERROR",
            Self::BundleShapeError => "BUNDLE_SHAPE_ERROR",
            Self::SchemaViolation => "SCHEMA_VIOLATION",
            Self::DuplicateLocalId => "DUPLICATE_LOCAL_ID",
            Self::MissingRequiredTags => "MISSING_REQUIRED_TAGS",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::FieldNotAllowedByPolicy => "FIELD_NOT_ALLOWED_BY_POLICY",
            Self::DoubleNestingForbidden => "DOUBLE_NESTING_FORBIDDEN",
            Self::HierarchyCycle => "HIERARCHY_CYCLE",
            Self::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            Self::AreaPathsMetadataMissing => "AREA_PATHS_METADATA_MISSING",
            Self::IterationPathsMetadataMissing => "ITERATION_PATHS_METADATA_MISSING",
            Self::UnknownCanonicalType => "UNKNOWN_CANONICAL_TYPE",
            Self::WitNotInGeneratedMetadata => "WIT_NOT_IN_GENERATED_METADATA",
            Self::UnknownCanonicalFieldKey => "UNKNOWN_CANONICAL_FIELD_KEY",
            Self::FieldNotApplicableToType => "FIELD_NOT_APPLICABLE_TO_TYPE",
            Self::AdoFieldUnavailableForWit => "ADO_FIELD_UNAVAILABLE_FOR_WIT",
            Self::UnresolvedAreaPath => "UNRESOLVED_AREA_PATH",
            Self::UnresolvedIterationPath => "UNRESOLVED_ITERATION_PATH",
            Self::UnknownAreaPath => "UNKNOWN_AREA_PATH",
            Self::UnknownIterationPath => "UNKNOWN_ITERATION_PATH",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Issues
// ============================================================================

/// One validation problem with a remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Stage that produced the issue.
    pub stage: Stage,
    /// Blocking or informational.
    pub severity: Severity,
    /// Machine-readable code.
    pub code: IssueCode,
    /// `$`-rooted location inside the bundle, or a metadata file path.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Suggested remediation.
    pub suggestion: String,
}

impl ValidationIssue {
    /// Builds an error-severity issue.
    #[must_use]
    pub fn error(
        stage: Stage,
        code: IssueCode,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            code,
            path: path.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Builds an informational issue.
    #[must_use]
    pub fn info(
        stage: Stage,
        code: IssueCode,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::error(stage, code, path, message, suggestion)
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Status and issue count of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    /// Stage outcome.
    pub status: StageStatus,
    /// Issues attributed to the stage, of any severity.
    pub issue_count: usize,
}

/// Per-stage summaries in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSummaries {
    /// Schema stage.
    pub schema: StageSummary,
    /// Policy stage.
    pub policy: StageSummary,
    /// Metadata stage.
    pub metadata: StageSummary,
}

/// Bundle identification inside a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedBundle {
    /// Path the bundle was read from.
    pub source_path: String,
    /// Bundle id, when the document carried one.
    pub bundle_id: Option<String>,
}

/// Overall validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Error-severity issues across all stages.
    pub error_count: usize,
    /// Pass/fail result.
    pub result: BundleOutcome,
}

/// Validation report for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Report format version.
    pub schema_version: String,
    /// RFC 3339 validation time.
    pub validated_at_utc: String,
    /// Bundle identification.
    pub bundle: ReportedBundle,
    /// Per-stage statuses.
    pub stages: StageSummaries,
    /// Overall outcome.
    pub summary: ReportSummary,
    /// Issues in stage order.
    pub issues: Vec<ValidationIssue>,
}

/// Issues collected per stage; `None` marks a stage that did not run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageIssues {
    /// Schema stage issues.
    pub schema: Vec<ValidationIssue>,
    /// Policy stage issues, when the stage ran.
    pub policy: Option<Vec<ValidationIssue>>,
    /// Metadata stage issues, when the stage ran.
    pub metadata: Option<Vec<ValidationIssue>>,
}

impl ValidationReport {
    /// Assembles a report from per-stage issues.
    #[must_use]
    pub fn assemble(bundle: ReportedBundle, stage_issues: StageIssues) -> Self {
        let schema = summarize(Some(&stage_issues.schema));
        let policy = summarize(stage_issues.policy.as_deref());
        let metadata = summarize(stage_issues.metadata.as_deref());
        let issues: Vec<ValidationIssue> = stage_issues
            .schema
            .into_iter()
            .chain(stage_issues.policy.into_iter().flatten())
            .chain(stage_issues.metadata.into_iter().flatten())
            .collect();
        let error_count = issues.iter().filter(|issue| issue.severity.is_error()).count();
        let result =
            if error_count == 0 { BundleOutcome::Passed } else { BundleOutcome::Failed };
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            validated_at_utc: clock::now_rfc3339(),
            bundle,
            stages: StageSummaries {
                schema,
                policy,
                metadata,
            },
            summary: ReportSummary {
                error_count,
                result,
            },
            issues,
        }
    }

    /// Returns true when the bundle passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.summary.result.is_passed()
    }

    /// Returns the issues produced by one stage.
    pub fn issues_for(&self, stage: Stage) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.stage == stage)
    }
}

/// Summarizes one stage; `None` means the stage was skipped.
fn summarize(issues: Option<&[ValidationIssue]>) -> StageSummary {
    match issues {
        None => StageSummary {
            status: StageStatus::Skipped,
            issue_count: 0,
        },
        Some(issues) => StageSummary {
            status: if issues.iter().any(|issue| issue.severity.is_error()) {
                StageStatus::Failed
            } else {
                StageStatus::Passed
            },
            issue_count: issues.len(),
        },
    }
}

/// Returns true when any issue blocks the next stage.
#[must_use]
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity.is_error())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
