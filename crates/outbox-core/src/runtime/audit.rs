// crates/outbox-core/src/runtime/audit.rs
// ============================================================================
// Module: Write Audit Records
// Description: Per-run audit document for write runs.
// Purpose: Persist what each write run planned or performed.
// Dependencies: crate::runtime, outbox-config, serde
// ============================================================================

//! ## Overview
//! Every write run, dry or live, leaves one `write-<stamp>.yaml` in the audit
//! directory. Names never collide; a second run in the same second gets a
//! numbered suffix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use outbox_config::clock;
use outbox_config::unique_destination;
use outbox_config::write_yaml_atomic;
use serde::Serialize;

use crate::runtime::OutboxError;
use crate::runtime::writer::BundleWriteResult;
use crate::runtime::writer::WriteSummary;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audit document version.
pub const AUDIT_SCHEMA_VERSION: &str = "1.0";

/// Header written above audit records.
const AUDIT_HEADER: &[&str] = &["MACHINE-GENERATED FILE. DO NOT EDIT BY HAND.", "Generated by `outbox write`."];

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Serialized audit document.
#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    /// Document version.
    schema_version: &'static str,
    /// RFC 3339 time the record was written.
    written_at_utc: String,
    /// True for dry runs.
    dry_run: bool,
    /// Run counters.
    summary: &'a WriteSummary,
    /// Per-bundle outcomes.
    results: &'a [BundleWriteResult],
}

/// Writes the audit record for a run and returns its path.
///
/// # Errors
///
/// Returns [`OutboxError`] when the audit directory cannot be created or the
/// record cannot be written.
pub fn write_audit(
    audit_dir: &Path,
    dry_run: bool,
    summary: &WriteSummary,
    results: &[BundleWriteResult],
) -> Result<PathBuf, OutboxError> {
    std::fs::create_dir_all(audit_dir).map_err(|err| OutboxError::io(audit_dir, &err))?;
    let now = clock::now_utc();
    let path = unique_destination(audit_dir, &format!("write-{}.yaml", clock::compact_stamp(now)))?;
    let record = AuditRecord {
        schema_version: AUDIT_SCHEMA_VERSION,
        written_at_utc: clock::rfc3339(now),
        dry_run,
        summary,
        results,
    };
    write_yaml_atomic(&path, &record, AUDIT_HEADER)?;
    Ok(path)
}
