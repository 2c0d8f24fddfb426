// crates/outbox-cli/tests/common/mod.rs
// ============================================================================
// Module: CLI Test Fixtures
// Description: Seeds a contract and outbox at the binary's default locations.
// Purpose: Let command tests run `outbox` with no path flags.
// Dependencies: serde_json, tempfile
// ============================================================================

//! ## Overview
//! [`CliWorkspace`] writes a Feature/UserStory contract under `config/` in a
//! temp directory so the binary's relative defaults resolve against it.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Bundle schema shipped with the repository.
pub const SCHEMA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../schema/bundle.schema.json");

/// Known area path.
pub const AREA: &str = "Black Lagoon\\Team A";
/// Known iteration path.
pub const ITERATION: &str = "Black Lagoon\\Sprint 1";

/// Wit map.
pub const WIT_MAP: &str = "\
schema_version: '1.0'
canonical_to_ado:
  Feature: Feature
  UserStory: User Story
";

/// Field map.
pub const FIELD_MAP: &str = "\
schema_version: '1.0'
canonical_to_ado:
  title:
    reference_name: System.Title
    applies_to: [Feature, UserStory]
  description:
    reference_name: System.Description
    applies_to: [Feature, UserStory]
  acceptance_criteria:
    reference_name: Microsoft.VSTS.Common.AcceptanceCriteria
    applies_to: [UserStory]
  area_path:
    reference_name: System.AreaPath
    applies_to: [Feature, UserStory]
  iteration_path:
    reference_name: System.IterationPath
    applies_to: [Feature, UserStory]
  owner:
    reference_name: System.AssignedTo
    applies_to: [Feature, UserStory]
  priority:
    reference_name: Microsoft.VSTS.Common.Priority
    applies_to: [Feature]
  story_points:
    reference_name: Microsoft.VSTS.Scheduling.StoryPoints
    applies_to: [UserStory]
";

/// Field policy.
pub const FIELD_POLICY: &str = "\
schema_version: '1.0'
agent_contract_export:
  include_work_item_types: [Feature, UserStory]
allowed_fields:
  Feature: [area_path, iteration_path, owner, priority]
  UserStory: [area_path, iteration_path, owner, story_points]
required_fields:
  Feature: [title, description, area_path, iteration_path]
  UserStory: [title, description, acceptance_criteria, area_path, iteration_path, story_points]
description_required_sections: {}
description_optional_sections: {}
owner_identity:
  format: display_name
";

/// Link policy.
pub const LINK_POLICY: &str = "\
schema_version: '1.0'
allowed_link_types: [parent-child]
max_depth: 3
forbid_double_nesting: [Feature]
";

/// Standards without required tags.
pub const STANDARDS: &str = "\
schema_version: '1.0'
required_tags: []
work_item_standards: {}
";

/// Generated metadata for both remote types.
pub const WIT_CONTRACT: &str = "\
schema_version: '1.0'
work_item_types:
  Feature:
    fields:
      - reference_name: System.Title
        alwaysRequired: true
      - reference_name: System.Description
      - reference_name: System.AreaPath
      - reference_name: System.IterationPath
      - reference_name: System.AssignedTo
      - reference_name: System.Tags
      - reference_name: Microsoft.VSTS.Common.Priority
  User Story:
    fields:
      - reference_name: System.Title
        required: true
      - reference_name: System.Description
      - reference_name: System.AreaPath
      - reference_name: System.IterationPath
      - reference_name: System.AssignedTo
      - reference_name: System.Tags
      - reference_name: Microsoft.VSTS.Common.AcceptanceCriteria
      - reference_name: Microsoft.VSTS.Scheduling.StoryPoints
";

/// Area path catalog.
pub const PATHS_AREA: &str = "\
area_paths:
  - 'Black Lagoon'
  - 'Black Lagoon\\Team A'
";

/// Iteration path catalog.
pub const PATHS_ITERATION: &str = "\
iteration_paths:
  - 'Black Lagoon\\Sprint 1'
";

/// Team rosters.
pub const PLANNING_CONTEXT: &str = "\
project_assignable_identities:
  - display_name: Project Lead
    unique_name: lead@example.org
teams:
  - name: Team A
    assignable_identities:
      - display_name: Alex Data
        unique_name: alex.data@example.org
";

// ============================================================================
// SECTION: Workspace
// ============================================================================

/// Temp directory holding `config/policy`, `config/generated`, and `outbox/`.
pub struct CliWorkspace {
    /// Owning temp directory.
    pub root: TempDir,
}

impl CliWorkspace {
    /// Writes every contract document and reference file.
    pub fn new() -> std::io::Result<Self> {
        let workspace = Self {
            root: TempDir::new()?,
        };
        for (name, text) in [
            ("wit_map.yaml", WIT_MAP),
            ("field_map.yaml", FIELD_MAP),
            ("field_policy.yaml", FIELD_POLICY),
            ("link_policy.yaml", LINK_POLICY),
            ("standards.yaml", STANDARDS),
        ] {
            write(&workspace.path().join("config/policy").join(name), text)?;
        }
        for (name, text) in [
            ("wit_contract.yaml", WIT_CONTRACT),
            ("paths_area.yaml", PATHS_AREA),
            ("paths_iteration.yaml", PATHS_ITERATION),
            ("planning_context.yaml", PLANNING_CONTEXT),
        ] {
            write(&workspace.path().join("config/generated").join(name), text)?;
        }
        Ok(workspace)
    }

    /// Workspace root, used as the binary's working directory.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Writes a bundle relative to the workspace root.
    pub fn bundle(&self, relative: &str, bundle: &Value) -> std::io::Result<PathBuf> {
        let path = self.path().join(relative);
        let text = serde_json::to_string_pretty(bundle).map_err(std::io::Error::other)?;
        write(&path, &text)?;
        Ok(path)
    }

    /// Lists file names in a workspace directory, sorted.
    pub fn names(&self, relative: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path().join(relative))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().is_file())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Writes text, creating parent directories.
fn write(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

// ============================================================================
// SECTION: Bundles
// ============================================================================

/// Feature with a literal remote parent, and a UserStory under it.
pub fn feature_story_bundle(bundle_id: &str) -> Value {
    json!({
        "schema_version": "1.0",
        "bundle_id": bundle_id,
        "source": {
            "agent_name": "planner",
            "prompt_id": "prompt-7",
            "generated_at": "2026-01-05T10:00:00Z"
        },
        "context": {
            "default_area_path": AREA,
            "default_iteration_path": ITERATION,
            "team": "Team A",
            "tags": ["agent"]
        },
        "work_items": [
            {
                "local_id": "F-001",
                "type": "Feature",
                "title": "Checkout revamp",
                "description": "# Summary\n- Faster checkout\n- Fewer steps",
                "fields": { "priority": 2 },
                "relations": { "parent_local_id": "9001" }
            },
            {
                "local_id": "US-001",
                "type": "UserStory",
                "title": "Pay with saved card",
                "description": "Shoppers reuse a stored card.",
                "acceptance_criteria": ["Card is preselected", "CVV is requested"],
                "fields": { "story_points": 3 },
                "relations": { "parent_local_id": "F-001" }
            }
        ]
    })
}

/// The feature/story bundle with both items sharing one local id.
pub fn duplicate_id_bundle(bundle_id: &str) -> Value {
    let mut bundle = feature_story_bundle(bundle_id);
    bundle["work_items"][1]["local_id"] = json!("F-001");
    bundle["work_items"][1]["relations"]["parent_local_id"] = json!("9001");
    bundle
}
