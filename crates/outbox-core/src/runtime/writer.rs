// crates/outbox-core/src/runtime/writer.rs
// ============================================================================
// Module: Write Orchestrator
// Description: Creates and links validated bundles in the remote system.
// Purpose: Implement the validated -> archived transition and the registry.
// Dependencies: crate::{core, interfaces, runtime}, fs2, outbox-config, serde, tracing
// ============================================================================

//! ## Overview
//! [`write_outbox`] processes one bundle or every `*.json` in `validated/`
//! in filename order. Per work item it builds a create operation and, when a
//! parent is declared, a link operation. Dry runs build the identical plan
//! without invoking the [`RemoteWriter`].
//!
//! ## Invariants
//! - The first failed bundle stops the batch; later bundles stay queued.
//! - Parents resolve sibling first, then earlier bundles of the run, then
//!   registry, then numeric literal.
//! - The registry is merged and saved once per live run, never overwriting.
//! - An audit record is written for every run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;

use fs2::FileExt;
use outbox_config::ContractPaths;
use outbox_config::EffectiveContract;
use outbox_config::PlanningContext;
use outbox_config::clock;
use outbox_config::move_unique;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::Bundle;
use crate::core::BundleOutcome;
use crate::core::ParentSource;
use crate::core::WorkItem;
use crate::core::WorkItemRef;
use crate::interfaces::PatchEntry;
use crate::interfaces::RemoteWriter;
use crate::runtime::OutboxError;
use crate::runtime::audit::write_audit;
use crate::runtime::layout::BundleSelection;
use crate::runtime::layout::OutboxLayout;
use crate::runtime::layout::is_within;
use crate::runtime::patch::PatchContext;
use crate::runtime::patch::WriteOverrides;
use crate::runtime::registry::RegistryEntry;
use crate::runtime::registry::WrittenItemRegistry;
use crate::runtime::urls::RemoteEndpoint;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Whether a run calls the remote system.
#[derive(Clone, Copy)]
pub enum WriteMode<'a> {
    /// Build and record the plan only.
    DryRun,
    /// Execute operations through the given writer.
    Live(&'a dyn RemoteWriter),
}

impl WriteMode<'_> {
    /// Returns true for [`WriteMode::DryRun`].
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Inputs of one write run.
#[derive(Debug, Clone)]
pub struct WriteRequest<'a> {
    /// Bundles to write; [`BundleSelection::Queue`] reads `validated/`.
    pub selection: &'a BundleSelection,
    /// Contract document locations.
    pub contract_paths: &'a ContractPaths,
    /// Outbox directory layout.
    pub layout: &'a OutboxLayout,
    /// Directory receiving the audit record.
    pub audit_dir: &'a Path,
    /// Remote endpoint used to build operation URLs.
    pub endpoint: &'a RemoteEndpoint,
    /// Overrides applied to every item.
    pub overrides: &'a WriteOverrides,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Kind of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Work item creation.
    Create,
    /// Parent relation patch.
    Link,
}

impl OperationKind {
    /// HTTP method used by the operation.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Link => "PATCH",
        }
    }
}

/// Execution status of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Recorded by a dry run.
    Planned,
    /// Executed successfully.
    Succeeded,
    /// Executed and rejected.
    Failed,
}

/// One planned or executed remote operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    /// Operation kind.
    pub kind: OperationKind,
    /// Local id of the item the operation targets.
    pub local_id: String,
    /// HTTP method.
    pub method: &'static str,
    /// Target URL.
    pub url: String,
    /// JSON Patch document.
    pub request_body: Vec<PatchEntry>,
    /// Execution status.
    pub status: OperationStatus,
    /// Item the operation created or patched.
    pub remote_id: Option<WorkItemRef>,
    /// Where the parent was resolved from, for link operations.
    pub parent_source: Option<ParentSource>,
    /// Non-fatal resolution warnings.
    pub warnings: Vec<String>,
    /// Transport failure, when the operation failed.
    pub error: Option<String>,
}

/// Outcome of writing one bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleWriteResult {
    /// Path the bundle was read from.
    pub bundle_path: String,
    /// Bundle id, when the bundle decoded.
    pub bundle_id: Option<String>,
    /// Pass/fail result.
    pub result: BundleOutcome,
    /// Operations in execution order, including the failed one.
    pub operations: Vec<OperationRecord>,
    /// Local ids mapped to created or planned items.
    pub local_id_to_remote_id: BTreeMap<String, WorkItemRef>,
    /// Archive location after a successful live write.
    pub archived_path: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

/// Run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Bundles attempted.
    pub processed_count: usize,
    /// Bundles written (or planned) without error.
    pub succeeded_count: usize,
    /// Bundles that failed.
    pub failed_count: usize,
    /// True when a failure stopped the batch.
    pub stopped_on_error: bool,
}

/// Aggregate outcome of a write run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRunReport {
    /// True for dry runs.
    pub dry_run: bool,
    /// Run counters.
    pub summary: WriteSummary,
    /// True when no bundle failed and the registry was handled cleanly.
    pub strict_ready: bool,
    /// Audit record location.
    pub audit_path: String,
    /// Registry location.
    pub registry_path: String,
    /// Registry read or write problem, when one occurred.
    pub registry_note: Option<String>,
    /// Per-bundle outcomes in processing order.
    pub results: Vec<BundleWriteResult>,
}

// ============================================================================
// SECTION: Write Run
// ============================================================================

/// Writes the selected bundles and records the run.
///
/// # Errors
///
/// Returns [`OutboxError`] when the outbox is locked by another run, the
/// selection is invalid, the contract cannot be loaded, or the audit record
/// cannot be written. Per-bundle failures are reported, not returned.
pub fn write_outbox(
    request: &WriteRequest<'_>,
    mode: WriteMode<'_>,
) -> Result<WriteRunReport, OutboxError> {
    let validated_dir = request.layout.validated_dir();
    let archived_dir = request.layout.archived_dir();
    request.layout.ensure_dirs(&[validated_dir.clone(), archived_dir.clone()])?;
    let _lock = acquire_lock(&request.layout.lock_path())?;

    let bundle_paths = request.selection.resolve(&validated_dir)?;
    let contract = EffectiveContract::load(request.contract_paths)?;
    let planning = request.contract_paths.planning_context();
    let registry_path = request.layout.registry_path();
    let (registry, mut registry_note) = match WrittenItemRegistry::load(&registry_path) {
        Ok(registry) => (registry, None),
        Err(err) => {
            warn!(registry = %registry_path.display(), error = %err, "registry unreadable; merge skipped");
            (WrittenItemRegistry::default(), Some(err.to_string()))
        }
    };

    let run = BundleRun {
        endpoint: request.endpoint,
        overrides: request.overrides,
        mode,
        contract: &contract,
        planning: planning.loaded(),
        registry: &registry,
    };
    let mut progress = RunProgress::default();
    let mut results = Vec::with_capacity(bundle_paths.len());
    let mut stopped_on_error = false;
    for bundle_path in &bundle_paths {
        let mut result = run.write_bundle(bundle_path, &mut progress);
        if !result.result.is_passed() {
            warn!(
                bundle = %bundle_path.display(),
                error = result.error.as_deref().unwrap_or_default(),
                "bundle write failed; stopping batch"
            );
            results.push(result);
            stopped_on_error = true;
            break;
        }
        if !mode.is_dry_run() && is_within(bundle_path, &validated_dir) {
            match move_unique(bundle_path, &archived_dir) {
                Ok(archived) => result.archived_path = Some(archived.display().to_string()),
                Err(err) => warn!(bundle = %bundle_path.display(), error = %err, "bundle written but not archived"),
            }
        }
        info!(bundle = %bundle_path.display(), dry_run = mode.is_dry_run(), "bundle written");
        results.push(result);
    }

    if !mode.is_dry_run() && registry_note.is_none() && !progress.staged.is_empty() {
        registry_note = merge_registry(&registry_path, progress.staged).err();
    }

    let succeeded_count = results.iter().filter(|result| result.result.is_passed()).count();
    let summary = WriteSummary {
        processed_count: results.len(),
        succeeded_count,
        failed_count: results.len() - succeeded_count,
        stopped_on_error,
    };
    let audit_path = write_audit(request.audit_dir, mode.is_dry_run(), &summary, &results)?;
    info!(audit = %audit_path.display(), processed = summary.processed_count, "write run recorded");
    Ok(WriteRunReport {
        dry_run: mode.is_dry_run(),
        summary,
        strict_ready: summary.failed_count == 0 && registry_note.is_none(),
        audit_path: audit_path.display().to_string(),
        registry_path: registry_path.display().to_string(),
        registry_note,
        results,
    })
}

/// Takes the exclusive outbox lock for the duration of a run.
fn acquire_lock(lock_path: &Path) -> Result<File, OutboxError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|err| OutboxError::io(lock_path, &err))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
            Err(OutboxError::Locked(lock_path.display().to_string()))
        }
        Err(err) => Err(OutboxError::io(lock_path, &err)),
    }
}

/// Re-reads the registry, merges staged entries, and saves it.
///
/// Returns a note describing the failure when any step fails.
fn merge_registry(path: &Path, staged: Vec<(String, RegistryEntry)>) -> Result<(), String> {
    let mut registry = WrittenItemRegistry::load(path).map_err(|err| err.to_string())?;
    let added = registry.merge(staged);
    registry.save(path).map_err(|err| {
        warn!(registry = %path.display(), error = %err, "registry save failed");
        err.to_string()
    })?;
    info!(registry = %path.display(), added, "registry updated");
    Ok(())
}

// ============================================================================
// SECTION: Bundle Processing
// ============================================================================

/// Shared state for processing the bundles of one run.
struct BundleRun<'a> {
    /// Remote endpoint.
    endpoint: &'a RemoteEndpoint,
    /// Run overrides.
    overrides: &'a WriteOverrides,
    /// Execution mode.
    mode: WriteMode<'a>,
    /// Effective contract.
    contract: &'a EffectiveContract,
    /// Team rosters, when harvested.
    planning: Option<&'a PlanningContext>,
    /// Registry snapshot read at run start.
    registry: &'a WrittenItemRegistry,
}

/// Items created so far in one run, across bundles.
#[derive(Default)]
struct RunProgress {
    /// Registry entries awaiting the end-of-run merge.
    staged: Vec<(String, RegistryEntry)>,
    /// Every created item keyed by local id, planned refs included.
    created: BTreeMap<String, WorkItemRef>,
}

impl BundleRun<'_> {
    /// Writes one bundle, staging registry entries for created items.
    fn write_bundle(&self, bundle_path: &Path, progress: &mut RunProgress) -> BundleWriteResult {
        let mut result = BundleWriteResult {
            bundle_path: bundle_path.display().to_string(),
            bundle_id: None,
            result: BundleOutcome::Failed,
            operations: Vec::new(),
            local_id_to_remote_id: BTreeMap::new(),
            archived_path: None,
            error: None,
        };
        let outcome = read_bundle(bundle_path).and_then(|bundle| {
            result.bundle_id = Some(bundle.bundle_id.clone());
            self.write_items(&bundle, &mut result, progress)
        });
        match outcome {
            Ok(()) => result.result = BundleOutcome::Passed,
            Err(message) => result.error = Some(message),
        }
        result
    }

    /// Creates and links every item of a bundle in declared order.
    fn write_items(
        &self,
        bundle: &Bundle,
        result: &mut BundleWriteResult,
        progress: &mut RunProgress,
    ) -> Result<(), String> {
        let patches = PatchContext {
            contract: self.contract,
            planning: self.planning,
            overrides: self.overrides,
            bundle_context: &bundle.context,
        };
        for item in &bundle.work_items {
            let create = patches.create_patch(item)?;
            for warning in &create.warnings {
                warn!(local_id = %item.local_id, warning = %warning, "work item warning");
            }
            let mut operation = OperationRecord::new(
                OperationKind::Create,
                &item.local_id,
                self.endpoint.create_url(&create.remote_type),
                create.entries,
            );
            operation.warnings = create.warnings;
            let created = self.execute(operation, result, &item.local_id)?;
            result.local_id_to_remote_id.insert(item.local_id.clone(), created.clone());
            if let Some(remote_id) = created.remote_id() {
                let entry = registry_entry(bundle, item, remote_id);
                progress.staged.push((item.local_id.clone(), entry));
            }

            let Some(parent) = item.parent_local_id() else {
                continue;
            };
            let (parent_ref, source) = self
                .resolve_parent(parent, &result.local_id_to_remote_id, &progress.created)
                .ok_or_else(|| {
                    format!(
                        "Parent '{parent}' of work item '{}' is not a sibling, an item written \
                         earlier in this run, a registry entry, or a numeric work item id.",
                        item.local_id
                    )
                })?;
            debug!(local_id = %item.local_id, parent = %parent_ref, ?source, "parent resolved");
            let mut operation = OperationRecord::new(
                OperationKind::Link,
                &item.local_id,
                self.endpoint.update_url(&created),
                vec![PatchEntry::parent_relation(&self.endpoint.item_url(&parent_ref))],
            );
            operation.parent_source = Some(source);
            self.execute(operation, result, &item.local_id)?;
        }
        for (local_id, created) in &result.local_id_to_remote_id {
            progress.created.insert(local_id.clone(), created.clone());
        }
        Ok(())
    }

    /// Runs or plans one operation and appends its record.
    fn execute(
        &self,
        mut operation: OperationRecord,
        result: &mut BundleWriteResult,
        local_id: &str,
    ) -> Result<WorkItemRef, String> {
        let writer = match self.mode {
            WriteMode::DryRun => {
                let planned = match operation.kind {
                    OperationKind::Create => WorkItemRef::Pending(local_id.to_string()),
                    OperationKind::Link => result
                        .local_id_to_remote_id
                        .get(local_id)
                        .cloned()
                        .unwrap_or_else(|| WorkItemRef::Pending(local_id.to_string())),
                };
                operation.status = OperationStatus::Planned;
                operation.remote_id = Some(planned.clone());
                result.operations.push(operation);
                return Ok(planned);
            }
            WriteMode::Live(writer) => writer,
        };
        let response = match operation.kind {
            OperationKind::Create => writer.create(&operation.url, &operation.request_body),
            OperationKind::Link => writer.link(&operation.url, &operation.request_body),
        };
        match response {
            Ok(item) => {
                operation.status = OperationStatus::Succeeded;
                operation.remote_id = Some(WorkItemRef::Remote(item.id));
                result.operations.push(operation);
                Ok(WorkItemRef::Remote(item.id))
            }
            Err(err) => {
                let message = format!(
                    "{} for work item '{local_id}' failed: {err}",
                    operation.kind.method()
                );
                operation.status = OperationStatus::Failed;
                operation.error = Some(err.to_string());
                result.operations.push(operation);
                Err(message)
            }
        }
    }

    /// Resolves a parent reference: sibling, then earlier bundle, then
    /// registry, then literal id.
    fn resolve_parent(
        &self,
        parent: &str,
        siblings: &BTreeMap<String, WorkItemRef>,
        batch: &BTreeMap<String, WorkItemRef>,
    ) -> Option<(WorkItemRef, ParentSource)> {
        if let Some(sibling) = siblings.get(parent) {
            return Some((sibling.clone(), ParentSource::Sibling));
        }
        if let Some(earlier) = batch.get(parent) {
            return Some((earlier.clone(), ParentSource::Batch));
        }
        if let Some(remote_id) = self.registry.remote_id_for(parent) {
            return Some((WorkItemRef::Remote(remote_id), ParentSource::Registry));
        }
        parent.parse::<u64>().ok().map(|id| (WorkItemRef::Remote(id), ParentSource::Literal))
    }
}

impl OperationRecord {
    /// Builds a not-yet-executed operation.
    fn new(kind: OperationKind, local_id: &str, url: String, request_body: Vec<PatchEntry>) -> Self {
        Self {
            kind,
            local_id: local_id.to_string(),
            method: kind.method(),
            url,
            request_body,
            status: OperationStatus::Planned,
            remote_id: None,
            parent_source: None,
            warnings: Vec::new(),
            error: None,
        }
    }
}

/// Reads and decodes a bundle document.
fn read_bundle(path: &Path) -> Result<Bundle, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("Unable to read bundle {}: {err}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| format!("Invalid bundle {}: {err}", path.display()))
}

/// Builds the registry entry for a created item.
fn registry_entry(bundle: &Bundle, item: &WorkItem, remote_id: u64) -> RegistryEntry {
    RegistryEntry {
        remote_id,
        canonical_type: item.canonical_type.clone(),
        title: item.title.clone(),
        source_bundle_id: bundle.bundle_id.clone(),
        written_at: clock::now_rfc3339(),
    }
}

