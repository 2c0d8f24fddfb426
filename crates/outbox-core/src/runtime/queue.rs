// crates/outbox-core/src/runtime/queue.rs
// ============================================================================
// Module: Validation Queue Routing
// Description: Validates bundles and moves them between queue directories.
// Purpose: Implement the ready -> validated | failed transitions.
// Dependencies: crate::{core, runtime}, outbox-config, serde, tracing
// ============================================================================

//! ## Overview
//! [`validate_outbox`] validates one bundle or every `*.json` in `ready/`.
//! Bundles under `ready/` are moved to `validated/` or `failed/` with
//! collision-avoiding names; bundles from elsewhere are never moved. Every
//! failed bundle gets a `<stem>.report.yaml` in `failed/`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use outbox_config::ContractPaths;
use outbox_config::move_unique;
use outbox_config::unique_destination;
use outbox_config::write_yaml_atomic;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::core::BundleOutcome;
use crate::core::ValidationReport;
use crate::runtime::OutboxError;
use crate::runtime::layout::BundleSelection;
use crate::runtime::layout::OutboxLayout;
use crate::runtime::layout::is_within;
use crate::runtime::validator::BundleValidator;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header written above failure reports.
const FAILURE_REPORT_HEADER: &[&str] = &[
    "MACHINE-GENERATED FILE. DO NOT EDIT BY HAND.",
    "Generated by `outbox validate`.",
    "Fix reported issues and re-run validation.",
];

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of validating and routing one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedBundle {
    /// Path the bundle was read from.
    pub bundle_path: String,
    /// Pass/fail result.
    pub result: BundleOutcome,
    /// True when the bundle came from the ready queue.
    pub managed_by_outbox: bool,
    /// New location after routing, for managed bundles.
    pub moved_bundle_path: Option<String>,
    /// Failure report location, for failed bundles.
    pub report_path: Option<String>,
    /// Full validation report.
    pub report: ValidationReport,
}

/// Aggregate outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateRunReport {
    /// Bundles processed.
    pub validated_count: usize,
    /// Bundles that passed.
    pub passed_count: usize,
    /// Bundles that failed.
    pub failed_count: usize,
    /// Per-bundle results in processing order.
    pub results: Vec<ValidatedBundle>,
    /// True when no bundle failed.
    pub strict_ready: bool,
}

// ============================================================================
// SECTION: Validation Run
// ============================================================================

/// Validates the selected bundles and routes managed ones through the queue.
///
/// # Errors
///
/// Returns [`OutboxError`] for configuration problems (unloadable contract
/// or schema, missing single bundle) and for failed queue moves or report
/// writes. Bundle content problems are reported, not returned.
pub fn validate_outbox(
    selection: &BundleSelection,
    contract_paths: &ContractPaths,
    schema_path: &Path,
    layout: &OutboxLayout,
) -> Result<ValidateRunReport, OutboxError> {
    let ready_dir = layout.ready_dir();
    let validated_dir = layout.validated_dir();
    let failed_dir = layout.failed_dir();
    layout.ensure_dirs(&[ready_dir.clone(), validated_dir.clone(), failed_dir.clone()])?;

    let bundle_paths = selection.resolve(&ready_dir)?;
    let validator = BundleValidator::load(contract_paths, schema_path)?;

    let mut results = Vec::with_capacity(bundle_paths.len());
    for bundle_path in &bundle_paths {
        let report = validator.validate_file(bundle_path);
        let managed_by_outbox = is_within(bundle_path, &ready_dir);
        let routed = route(bundle_path, &report, managed_by_outbox, &validated_dir, &failed_dir)?;
        if report.passed() {
            info!(bundle = %bundle_path.display(), managed = managed_by_outbox, "bundle passed validation");
        } else {
            warn!(
                bundle = %bundle_path.display(),
                errors = report.summary.error_count,
                managed = managed_by_outbox,
                "bundle failed validation"
            );
        }
        results.push(ValidatedBundle {
            bundle_path: bundle_path.display().to_string(),
            result: report.summary.result,
            managed_by_outbox,
            moved_bundle_path: routed.moved.map(|path| path.display().to_string()),
            report_path: routed.report.map(|path| path.display().to_string()),
            report,
        });
    }

    let passed_count = results.iter().filter(|result| result.result.is_passed()).count();
    let failed_count = results.len() - passed_count;
    Ok(ValidateRunReport {
        validated_count: results.len(),
        passed_count,
        failed_count,
        results,
        strict_ready: failed_count == 0,
    })
}

/// Locations produced by routing one bundle.
struct Routed {
    /// Where a managed bundle was moved.
    moved: Option<PathBuf>,
    /// Where the failure report was written.
    report: Option<PathBuf>,
}

/// Moves a managed bundle and writes the failure report when needed.
fn route(
    bundle_path: &Path,
    report: &ValidationReport,
    managed: bool,
    validated_dir: &Path,
    failed_dir: &Path,
) -> Result<Routed, OutboxError> {
    if report.passed() {
        let moved = if managed { Some(move_unique(bundle_path, validated_dir)?) } else { None };
        return Ok(Routed {
            moved,
            report: None,
        });
    }
    let moved = if managed { Some(move_unique(bundle_path, failed_dir)?) } else { None };
    let stem = bundle_path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("bundle");
    let report_path = unique_destination(failed_dir, &format!("{stem}.report.yaml"))?;
    write_yaml_atomic(&report_path, report, FAILURE_REPORT_HEADER)?;
    Ok(Routed {
        moved,
        report: Some(report_path),
    })
}
