// crates/outbox-contract/tests/common/mod.rs
// ============================================================================
// Module: Contract Lint Fixtures
// Description: On-disk policy sets for linter and export tests.
// Purpose: Start every test from a lint-clean contract and perturb one part.
// Dependencies: outbox-config, tempfile
// ============================================================================

//! ## Overview
//! [`Workspace::clean`] writes a Feature/Task/UserStory contract with no lint
//! findings. Task is mapped but kept out of the export scope with no policy
//! content, so it produces no informational finding either.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

use std::fs;
use std::path::Path;

use outbox_config::ContractPaths;
use tempfile::TempDir;

/// Lint-clean wit map.
pub const WIT_MAP: &str = "\
schema_version: '1.0'
canonical_to_ado:
  Feature: Feature
  Task: Task
  UserStory: User Story
";

/// Lint-clean field map.
pub const FIELD_MAP: &str = "\
schema_version: '1.0'
canonical_to_ado:
  title:
    reference_name: System.Title
  description:
    reference_name: System.Description
    applies_to: [Feature, UserStory]
  priority:
    reference_name: Microsoft.VSTS.Common.Priority
    applies_to: [Feature]
  story_points:
    reference_name: Microsoft.VSTS.Scheduling.StoryPoints
    applies_to: [UserStory]
";

/// Lint-clean field policy.
pub const FIELD_POLICY: &str = "\
schema_version: '1.0'
agent_contract_export:
  include_work_item_types: [Feature, UserStory]
allowed_fields:
  Feature: [title, description, priority]
  UserStory: [title, description, story_points]
required_fields:
  Feature: [title]
  UserStory: [title, story_points]
description_required_sections:
  Feature: [Summary]
";

/// Lint-clean link policy.
pub const LINK_POLICY: &str = "\
schema_version: '1.0'
allowed_link_types: [parent-child]
max_depth: 3
forbid_double_nesting: [Feature]
";

/// Lint-clean standards.
pub const STANDARDS: &str = "\
schema_version: '1.0'
required_tags: [agent]
work_item_standards:
  UserStory:
    story_points:
      required: true
      allowed_values: [1, 2, 3, 5, 8]
";

/// Generated metadata for every mapped type.
pub const WIT_CONTRACT: &str = "\
schema_version: '1.0'
work_item_types:
  Feature:
    fields:
      - reference_name: System.Title
        alwaysRequired: true
      - reference_name: System.Description
      - reference_name: Microsoft.VSTS.Common.Priority
  Task:
    fields:
      - reference_name: System.Title
        alwaysRequired: true
  User Story:
    fields:
      - reference_name: System.Title
        alwaysRequired: true
      - reference_name: System.Description
      - reference_name: Microsoft.VSTS.Scheduling.StoryPoints
";

/// Policy and generated directories under a temp root.
pub struct Workspace {
    /// Owning temp directory.
    pub root: TempDir,
    /// Contract directories.
    pub paths: ContractPaths,
}

impl Workspace {
    /// Writes the lint-clean contract.
    pub fn clean() -> Result<Self, Box<dyn std::error::Error>> {
        let root = tempfile::tempdir()?;
        let paths = ContractPaths::new(root.path().join("policy"), root.path().join("generated"));
        let workspace = Self {
            root,
            paths,
        };
        workspace.policy("wit_map.yaml", WIT_MAP)?;
        workspace.policy("field_map.yaml", FIELD_MAP)?;
        workspace.policy("field_policy.yaml", FIELD_POLICY)?;
        workspace.policy("link_policy.yaml", LINK_POLICY)?;
        workspace.policy("standards.yaml", STANDARDS)?;
        workspace.generated("wit_contract.yaml", WIT_CONTRACT)?;
        Ok(workspace)
    }

    /// Overwrites a policy document.
    pub fn policy(&self, name: &str, text: &str) -> std::io::Result<()> {
        write(&self.paths.policy_dir.join(name), text)
    }

    /// Overwrites a generated document.
    pub fn generated(&self, name: &str, text: &str) -> std::io::Result<()> {
        write(&self.paths.generated_dir.join(name), text)
    }
}

/// Writes text, creating parent directories.
fn write(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
