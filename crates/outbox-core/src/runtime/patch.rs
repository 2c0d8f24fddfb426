// crates/outbox-core/src/runtime/patch.rs
// ============================================================================
// Module: Patch Construction
// Description: Builds create patch documents for bundle work items.
// Purpose: Translate canonical items into remote field patches.
// Dependencies: crate::{core, interfaces, runtime}, outbox-config, serde_json
// ============================================================================

//! ## Overview
//! A create patch lists, in order: title, rendered description, acceptance
//! criteria, area path, iteration path, owner, remaining mapped fields in
//! key order, and tags. Construction is identical for dry and live runs.
//!
//! ## Invariants
//! - Empty values never produce patch entries.
//! - Owner resolution failures omit the owner entry and add a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outbox_config::EffectiveContract;
use outbox_config::Identity;
use outbox_config::OwnerIdentityFormat;
use outbox_config::PlanningContext;
use serde_json::Value;

use crate::core::BundleContext;
use crate::core::WorkItem;
use crate::core::bundle::AREA_PATH_KEY;
use crate::core::bundle::ITERATION_PATH_KEY;
use crate::core::bundle::OWNER_KEY;
use crate::core::bundle::TOP_LEVEL_CANONICAL_KEYS;
use crate::core::bundle::is_non_empty;
use crate::interfaces::PatchEntry;
use crate::runtime::markdown::render_criteria;
use crate::runtime::markdown::render_markdown;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Remote title field used when the field map has no `title` entry.
const SYSTEM_TITLE: &str = "System.Title";
/// Remote description field used when the field map has no `description` entry.
const SYSTEM_DESCRIPTION: &str = "System.Description";
/// Remote area path field used when the field map has no `area_path` entry.
const SYSTEM_AREA_PATH: &str = "System.AreaPath";
/// Remote iteration path field used when the field map has no `iteration_path` entry.
const SYSTEM_ITERATION_PATH: &str = "System.IterationPath";
/// Remote tags field used when the field map has no `tags` entry.
const SYSTEM_TAGS: &str = "System.Tags";

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Operator overrides applied to every item in a write run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOverrides {
    /// Area path replacing item and bundle values.
    pub area_path: Option<String>,
    /// Iteration path replacing item and bundle values.
    pub iteration_path: Option<String>,
    /// Owner display name used verbatim for items whose type maps `owner`.
    pub owner_display_name: Option<String>,
}

/// Shared inputs for building the patches of one bundle.
pub struct PatchContext<'a> {
    /// Effective contract.
    pub contract: &'a EffectiveContract,
    /// Team rosters, when harvested.
    pub planning: Option<&'a PlanningContext>,
    /// Run overrides.
    pub overrides: &'a WriteOverrides,
    /// Bundle defaults.
    pub bundle_context: &'a BundleContext,
}

/// Create patch for one work item.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePatch {
    /// Remote type the item is created as.
    pub remote_type: String,
    /// Ordered patch entries.
    pub entries: Vec<PatchEntry>,
    /// Non-fatal resolution warnings.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Create Patch
// ============================================================================

impl PatchContext<'_> {
    /// Builds the create patch for an item.
    ///
    /// # Errors
    ///
    /// Returns a message when the item's type has no wit map entry.
    pub fn create_patch(&self, item: &WorkItem) -> Result<CreatePatch, String> {
        let canonical_type = item.canonical_type().unwrap_or_default();
        let remote_type = self
            .contract
            .resolve_ado_wit(canonical_type)
            .map_err(|err| format!("Work item '{}': {err}", item.local_id))?
            .to_string();
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        if !item.title.trim().is_empty() {
            let reference = self.reference_or(canonical_type, "title", SYSTEM_TITLE);
            entries.push(PatchEntry::field(reference, Value::from(item.title.trim())));
        }

        let mut description = if item.description.trim().is_empty() {
            String::new()
        } else {
            render_markdown(&item.description)
        };
        let criteria = render_criteria(&item.acceptance_criteria);
        let criteria_field = self.criteria_field(canonical_type, &remote_type);
        let mut criteria_entry = None;
        if let Some(criteria) = criteria {
            match criteria_field {
                Some(reference) => {
                    criteria_entry = Some(PatchEntry::field(reference, Value::from(criteria)));
                }
                None => {
                    description.push_str("<h3>Acceptance Criteria:</h3>");
                    description.push_str(&criteria);
                }
            }
        }
        if !description.is_empty() {
            let reference = self.reference_or(canonical_type, "description", SYSTEM_DESCRIPTION);
            entries.push(PatchEntry::field(reference, Value::from(description)));
        }
        entries.extend(criteria_entry);

        let area = override_or(self.overrides.area_path.as_deref())
            .or_else(|| item.field_text(AREA_PATH_KEY))
            .or_else(|| self.bundle_context.area_path());
        if let Some(area) = area {
            let reference = self.reference_or(canonical_type, AREA_PATH_KEY, SYSTEM_AREA_PATH);
            entries.push(PatchEntry::field(reference, Value::from(area)));
        }
        let iteration = override_or(self.overrides.iteration_path.as_deref())
            .or_else(|| item.field_text(ITERATION_PATH_KEY))
            .or_else(|| self.bundle_context.iteration_path());
        if let Some(iteration) = iteration {
            let reference =
                self.reference_or(canonical_type, ITERATION_PATH_KEY, SYSTEM_ITERATION_PATH);
            entries.push(PatchEntry::field(reference, Value::from(iteration)));
        }

        if let Ok(reference) = self.contract.resolve_ado_field(OWNER_KEY, Some(canonical_type)) {
            match self.resolve_owner(item) {
                Ok(Some(owner)) => entries.push(PatchEntry::field(reference, Value::from(owner))),
                Ok(None) => {}
                Err(warning) => warnings.push(warning),
            }
        }

        for (field_key, value) in &item.fields {
            if is_handled_separately(field_key) || !is_non_empty(value) {
                continue;
            }
            match self.contract.resolve_ado_field(field_key, Some(canonical_type)) {
                Ok(reference) => entries.push(PatchEntry::field(reference, value.clone())),
                Err(err) => warnings.push(format!("Field '{field_key}' was not written: {err}.")),
            }
        }

        let tags = merged_tags(self.bundle_context, item);
        if !tags.is_empty() {
            let reference = self.reference_or(canonical_type, "tags", SYSTEM_TAGS);
            entries.push(PatchEntry::field(reference, Value::from(tags.join("; "))));
        }

        Ok(CreatePatch {
            remote_type,
            entries,
            warnings,
        })
    }

    /// Resolves a mapped reference name, falling back to a system field.
    fn reference_or<'b>(&'b self, canonical_type: &str, key: &str, fallback: &'b str) -> &'b str {
        self.contract.resolve_ado_field(key, Some(canonical_type)).unwrap_or(fallback)
    }

    /// Returns the acceptance criteria reference name when the remote type
    /// exposes the mapped field.
    fn criteria_field(&self, canonical_type: &str, remote_type: &str) -> Option<&str> {
        let reference =
            self.contract.resolve_ado_field("acceptance_criteria", Some(canonical_type)).ok()?;
        let capabilities = self.contract.generated.get(remote_type)?;
        capabilities.has_field(reference).then_some(reference)
    }

    // ========================================================================
    // SECTION: Owner Resolution
    // ========================================================================

    /// Resolves the owner value for an item.
    ///
    /// Returns `Ok(None)` when no owner is supplied, or `Err(warning)` when
    /// the supplied owner matches no assignable identity.
    fn resolve_owner(&self, item: &WorkItem) -> Result<Option<String>, String> {
        if let Some(owner) = override_or(self.overrides.owner_display_name.as_deref()) {
            return Ok(Some(owner.to_string()));
        }
        let Some(raw) = item.field_text(OWNER_KEY) else {
            return Ok(None);
        };
        let format = self.contract.field_policy.owner_identity_format;
        let roster = self
            .planning
            .map_or(&[] as &[Identity], |planning| planning.roster_for(self.bundle_context.team()));
        match_identity(roster, raw, format).map(Some).ok_or_else(|| {
            format!(
                "Owner '{raw}' could not be resolved to an assignable identity using format \
                 '{format}'; Assigned To will be null."
            )
        })
    }
}

/// Finds the roster identity matching `raw` and returns its emitted name.
fn match_identity(roster: &[Identity], raw: &str, format: OwnerIdentityFormat) -> Option<String> {
    let pick = |candidate: Option<&String>| {
        candidate.filter(|name| name.trim().eq_ignore_ascii_case(raw)).cloned()
    };
    roster.iter().find_map(|identity| {
        let display = identity.display_name.as_ref();
        let unique = identity.unique_name.as_ref();
        match format {
            OwnerIdentityFormat::DisplayName => pick(display),
            OwnerIdentityFormat::UniqueName => pick(unique),
            OwnerIdentityFormat::Either => pick(unique).or_else(|| pick(display)),
        }
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a trimmed, non-blank override value.
fn override_or(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Returns true for field keys placed by dedicated patch steps.
fn is_handled_separately(field_key: &str) -> bool {
    TOP_LEVEL_CANONICAL_KEYS.contains(&field_key)
        || [AREA_PATH_KEY, ITERATION_PATH_KEY, OWNER_KEY, "tags"].contains(&field_key)
}

/// Returns bundle tags followed by item tags, trimmed and deduplicated.
fn merged_tags<'a>(context: &'a BundleContext, item: &'a WorkItem) -> Vec<&'a str> {
    let mut tags: Vec<&str> = Vec::new();
    let candidates = context.tags.iter().map(|tag| tag.trim()).chain(item.tag_set());
    for tag in candidates {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

// ============================================================================
// SECTION: Tests
// ============================================================================
