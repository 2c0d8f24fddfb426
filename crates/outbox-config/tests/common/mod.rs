// crates/outbox-config/tests/common/mod.rs
// ============================================================================
// Module: Contract Test Fixtures
// Description: Shared on-disk contract fixtures for loader tests.
// Purpose: Provide a coherent policy set that individual tests perturb.
// Dependencies: outbox-config, tempfile
// ============================================================================

//! ## Overview
//! Writes a coherent Feature/UserStory contract into a temp directory. Tests
//! overwrite single documents to introduce exactly one inconsistency.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

use std::fs;
use std::path::Path;

use outbox_config::ContractPaths;
use tempfile::TempDir;

/// Coherent wit map.
pub const WIT_MAP: &str = "\
schema_version: '1.0'
canonical_to_ado:
  Feature: Feature
  UserStory: User Story
";

/// Coherent field map.
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
  priority:
    reference_name: Microsoft.VSTS.Common.Priority
    applies_to: [Feature]
  story_points:
    reference_name: Microsoft.VSTS.Scheduling.StoryPoints
    applies_to: [UserStory]
";

/// Coherent field policy.
pub const FIELD_POLICY: &str = "\
schema_version: '1.0'
agent_contract_export:
  include_work_item_types: [Feature, UserStory]
allowed_fields:
  Feature: [title, description, priority]
  UserStory: [title, description, acceptance_criteria, story_points]
required_fields:
  Feature: [title, description]
  UserStory: [title, description, acceptance_criteria, story_points]
description_required_sections: {}
description_optional_sections: {}
";

/// Coherent link policy.
pub const LINK_POLICY: &str = "\
schema_version: '1.0'
allowed_link_types: [parent-child]
max_depth: 2
forbid_double_nesting: [Feature, UserStory]
";

/// Coherent standards.
pub const STANDARDS: &str = "\
schema_version: '1.0'
required_tags: []
work_item_standards: {}
";

/// Generated metadata matching the coherent policy set.
pub const WIT_CONTRACT: &str = "\
schema_version: '1.0'
work_item_types:
  Feature:
    fields:
      - reference_name: System.Title
        alwaysRequired: true
      - reference_name: System.Description
      - reference_name: Microsoft.VSTS.Common.Priority
  User Story:
    fields:
      - reference_name: System.Title
        required: true
      - reference_name: System.Description
      - reference_name: Microsoft.VSTS.Common.AcceptanceCriteria
      - reference_name: Microsoft.VSTS.Scheduling.StoryPoints
";

/// Contract documents written under a temporary root.
pub struct ContractFixture {
    /// Owning temp directory.
    pub root: TempDir,
    /// Policy/generated directories under the root.
    pub paths: ContractPaths,
}

impl ContractFixture {
    /// Writes the coherent contract.
    pub fn coherent() -> Result<Self, Box<dyn std::error::Error>> {
        let root = tempfile::tempdir()?;
        let paths = ContractPaths::new(root.path().join("policy"), root.path().join("generated"));
        let fixture = Self {
            root,
            paths,
        };
        fixture.policy("wit_map.yaml", WIT_MAP)?;
        fixture.policy("field_map.yaml", FIELD_MAP)?;
        fixture.policy("field_policy.yaml", FIELD_POLICY)?;
        fixture.policy("link_policy.yaml", LINK_POLICY)?;
        fixture.policy("standards.yaml", STANDARDS)?;
        fixture.generated("wit_contract.yaml", WIT_CONTRACT)?;
        Ok(fixture)
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
pub fn write(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
