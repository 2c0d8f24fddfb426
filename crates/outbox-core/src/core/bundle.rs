// crates/outbox-core/src/core/bundle.rs
// ============================================================================
// Module: Bundle Model
// Description: Typed view of an agent-authored work-item bundle.
// Purpose: Give validation and write stages one decoded shape to work on.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A bundle is decoded into [`Bundle`] only after it passes the JSON Schema
//! stage, so the types here mirror `schema/bundle.schema.json`. Field values
//! stay as JSON values because their shape is owned by the remote field.
//!
//! ## Invariants
//! - String accessors trim and treat blank text as absent.
//! - [`is_non_empty`] treats `null`, blank strings, and empty collections as
//!   empty; every other value (including `0` and `false`) is non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonical keys carried at the top level of a work item instead of `fields`.
pub const TOP_LEVEL_CANONICAL_KEYS: [&str; 3] = ["title", "description", "acceptance_criteria"];

/// Canonical key for the area path field.
pub const AREA_PATH_KEY: &str = "area_path";
/// Canonical key for the iteration path field.
pub const ITERATION_PATH_KEY: &str = "iteration_path";
/// Canonical key for the owner field.
pub const OWNER_KEY: &str = "owner";

// ============================================================================
// SECTION: Bundle
// ============================================================================

/// One staged batch of related work items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle document version.
    pub schema_version: String,
    /// Logical label; not unique across files.
    pub bundle_id: String,
    /// Free-form provenance block.
    #[serde(default)]
    pub source: Value,
    /// Bundle-wide defaults.
    #[serde(default)]
    pub context: BundleContext,
    /// Work items in declared order.
    pub work_items: Vec<WorkItem>,
}

/// Defaults shared by every item in a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleContext {
    /// Area path used when an item has none.
    #[serde(default)]
    pub default_area_path: Option<String>,
    /// Iteration path used when an item has none.
    #[serde(default)]
    pub default_iteration_path: Option<String>,
    /// Team whose roster resolves owners.
    #[serde(default)]
    pub team: Option<String>,
    /// Tags applied to every item.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BundleContext {
    /// Returns the trimmed default area path, if set.
    #[must_use]
    pub fn area_path(&self) -> Option<&str> {
        non_blank(self.default_area_path.as_deref())
    }

    /// Returns the trimmed default iteration path, if set.
    #[must_use]
    pub fn iteration_path(&self) -> Option<&str> {
        non_blank(self.default_iteration_path.as_deref())
    }

    /// Returns the trimmed team name, if set.
    #[must_use]
    pub fn team(&self) -> Option<&str> {
        non_blank(self.team.as_deref())
    }
}

// ============================================================================
// SECTION: Work Items
// ============================================================================

/// One proposed work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Bundle-scoped identifier.
    pub local_id: String,
    /// Canonical type name.
    #[serde(rename = "type")]
    pub canonical_type: String,
    /// Title text.
    #[serde(default)]
    pub title: String,
    /// Markdown description.
    #[serde(default)]
    pub description: String,
    /// Acceptance criteria, one entry per criterion.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Canonical field values keyed by canonical field key.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Hierarchy relations.
    #[serde(default)]
    pub relations: Relations,
    /// Item-level tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Declared relations of a work item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// Sibling local id, registry local id, or literal remote id of the parent.
    #[serde(default)]
    pub parent_local_id: Option<String>,
}

impl WorkItem {
    /// Returns the trimmed local id, if not blank.
    #[must_use]
    pub fn local_id(&self) -> Option<&str> {
        non_blank(Some(&self.local_id))
    }

    /// Returns the local id, or an index label for items without one.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.local_id().map_or_else(|| format!("<index:{index}>"), str::to_string)
    }

    /// Returns the trimmed canonical type, if not blank.
    #[must_use]
    pub fn canonical_type(&self) -> Option<&str> {
        non_blank(Some(&self.canonical_type))
    }

    /// Returns the trimmed parent reference, if declared.
    #[must_use]
    pub fn parent_local_id(&self) -> Option<&str> {
        non_blank(self.relations.parent_local_id.as_deref())
    }

    /// Returns a field value as trimmed text, if it is a non-blank string.
    #[must_use]
    pub fn field_text(&self, key: &str) -> Option<&str> {
        non_blank(self.fields.get(key).and_then(Value::as_str))
    }

    /// Returns true when a top-level canonical key carries a value.
    ///
    /// Returns `None` for keys that are not top-level canonical keys.
    #[must_use]
    pub fn top_level_present(&self, key: &str) -> Option<bool> {
        match key {
            "title" => Some(!self.title.trim().is_empty()),
            "description" => Some(!self.description.trim().is_empty()),
            "acceptance_criteria" => Some(!self.acceptance_criteria.is_empty()),
            _ => None,
        }
    }

    /// Returns true when `fields[key]` is present and non-empty.
    #[must_use]
    pub fn field_present(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(is_non_empty)
    }

    /// Returns the item's trimmed, non-blank tags.
    pub fn tag_set(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when a JSON value counts as supplied.
#[must_use]
pub fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Trims text and maps blank text to `None`.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::WorkItem;
    use super::is_non_empty;

    #[test]
    fn zero_and_false_count_as_supplied() -> Result<(), String> {
        for value in [json!(0), json!(false), json!("x"), json!([1]), json!({"a": 1})] {
            if !is_non_empty(&value) {
                return Err(format!("expected non-empty: {value}"));
            }
        }
        for value in [json!(null), json!("  "), json!([]), json!({})] {
            if is_non_empty(&value) {
                return Err(format!("expected empty: {value}"));
            }
        }
        Ok(())
    }

    #[test]
    fn accessors_trim_and_label_blank_ids() -> Result<(), String> {
        let item: WorkItem = serde_json::from_value(json!({
            "local_id": "  ",
            "type": " Feature ",
            "title": "t",
            "description": "",
            "relations": {"parent_local_id": " F-1 "}
        }))
        .map_err(|err| err.to_string())?;
        if item.local_id().is_some() || item.label(3) != "<index:3>" {
            return Err("blank local id must fall back to an index label".to_string());
        }
        if item.canonical_type() != Some("Feature") || item.parent_local_id() != Some("F-1") {
            return Err("accessors must trim".to_string());
        }
        if item.top_level_present("description") != Some(false)
            || item.top_level_present("priority").is_some()
        {
            return Err("unexpected top-level presence".to_string());
        }
        Ok(())
    }
}
