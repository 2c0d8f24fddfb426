// crates/outbox-core/tests/common/mod.rs
// ============================================================================
// Module: Outbox Test Fixtures
// Description: Contract, outbox layout, bundle builders, and a recording writer.
// Purpose: Give validation and write tests one coherent on-disk workspace.
// Dependencies: outbox-core, outbox-config, serde_json, tempfile
// ============================================================================

//! ## Overview
//! [`OutboxFixture`] writes a Feature/UserStory contract with area and
//! iteration catalogs plus a team roster, and an empty outbox. Bundle
//! builders return JSON values that tests perturb before queueing.
//! [`RecordingWriter`] stands in for the remote system.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

use std::cell::Cell;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use outbox_config::ContractPaths;
use outbox_core::BundleSelection;
use outbox_core::OutboxLayout;
use outbox_core::PatchEntry;
use outbox_core::RemoteEndpoint;
use outbox_core::RemoteWorkItem;
use outbox_core::RemoteWriter;
use outbox_core::TransportError;
use outbox_core::WriteOverrides;
use outbox_core::WriteRequest;
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
// SECTION: Workspace Fixture
// ============================================================================

/// Contract, outbox, and audit directories under one temp root.
pub struct OutboxFixture {
    /// Owning temp directory.
    pub root: TempDir,
    /// Contract document locations.
    pub paths: ContractPaths,
    /// Outbox layout.
    pub layout: OutboxLayout,
    /// Audit directory.
    pub audit_dir: PathBuf,
    /// Remote endpoint used by write tests.
    pub endpoint: RemoteEndpoint,
}

impl OutboxFixture {
    /// Writes the full contract, catalogs, and rosters.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let root = tempfile::tempdir()?;
        let paths = ContractPaths::new(root.path().join("policy"), root.path().join("generated"));
        let layout = OutboxLayout::new(root.path().join("outbox"));
        let audit_dir = root.path().join("outbox").join("audit");
        let fixture = Self {
            root,
            paths,
            layout,
            audit_dir,
            endpoint: RemoteEndpoint::new("https://dev.azure.com/example-org", "Black Lagoon", "7.0"),
        };
        fixture.policy("wit_map.yaml", WIT_MAP)?;
        fixture.policy("field_map.yaml", FIELD_MAP)?;
        fixture.policy("field_policy.yaml", FIELD_POLICY)?;
        fixture.policy("link_policy.yaml", LINK_POLICY)?;
        fixture.policy("standards.yaml", STANDARDS)?;
        fixture.generated("wit_contract.yaml", WIT_CONTRACT)?;
        fixture.generated("paths_area.yaml", PATHS_AREA)?;
        fixture.generated("paths_iteration.yaml", PATHS_ITERATION)?;
        fixture.generated("planning_context.yaml", PLANNING_CONTEXT)?;
        for dir in [
            fixture.layout.ready_dir(),
            fixture.layout.validated_dir(),
            fixture.layout.failed_dir(),
            fixture.layout.archived_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
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

    /// Removes a generated document.
    pub fn remove_generated(&self, name: &str) -> std::io::Result<()> {
        fs::remove_file(self.paths.generated_dir.join(name))
    }

    /// Writes a bundle into `ready/`.
    pub fn ready(&self, name: &str, bundle: &Value) -> std::io::Result<PathBuf> {
        write_bundle(&self.layout.ready_dir().join(name), bundle)
    }

    /// Writes a bundle into `validated/`.
    pub fn validated(&self, name: &str, bundle: &Value) -> std::io::Result<PathBuf> {
        write_bundle(&self.layout.validated_dir().join(name), bundle)
    }

    /// Writes a bundle outside the outbox.
    pub fn loose(&self, name: &str, bundle: &Value) -> std::io::Result<PathBuf> {
        write_bundle(&self.root.path().join("loose").join(name), bundle)
    }

    /// Schema path.
    pub fn schema(&self) -> PathBuf {
        PathBuf::from(SCHEMA)
    }

    /// Builds a write request for a selection.
    pub fn write_request<'a>(
        &'a self,
        selection: &'a BundleSelection,
        overrides: &'a WriteOverrides,
    ) -> WriteRequest<'a> {
        WriteRequest {
            selection,
            contract_paths: &self.paths,
            layout: &self.layout,
            audit_dir: &self.audit_dir,
            endpoint: &self.endpoint,
            overrides,
        }
    }

    /// Lists file names in a directory, sorted.
    pub fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
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
pub fn write(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

/// Writes a bundle as pretty JSON.
pub fn write_bundle(path: &Path, bundle: &Value) -> std::io::Result<PathBuf> {
    let text = serde_json::to_string_pretty(bundle).map_err(std::io::Error::other)?;
    write(path, &text)?;
    Ok(path.to_path_buf())
}

// ============================================================================
// SECTION: Bundle Builders
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

/// Single UserStory whose parent is a registry entry or literal.
pub fn story_bundle(bundle_id: &str, local_id: &str, parent: &str) -> Value {
    json!({
        "schema_version": "1.0",
        "bundle_id": bundle_id,
        "source": {
            "agent_name": "planner",
            "prompt_id": "prompt-8",
            "generated_at": "2026-01-06T10:00:00Z"
        },
        "context": {
            "default_area_path": AREA,
            "default_iteration_path": ITERATION
        },
        "work_items": [
            {
                "local_id": local_id,
                "type": "UserStory",
                "title": "Follow-up story",
                "description": "Continue the feature.",
                "acceptance_criteria": ["Works"],
                "fields": { "story_points": 1 },
                "relations": { "parent_local_id": parent }
            }
        ]
    })
}

/// Returns a mutable reference to a work item of a bundle.
pub fn item_mut(bundle: &mut Value, index: usize) -> &mut Value {
    &mut bundle["work_items"][index]
}

// ============================================================================
// SECTION: Recording Writer
// ============================================================================

/// One call received by the recording writer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// `POST` or `PATCH`.
    pub method: &'static str,
    /// Target URL.
    pub url: String,
    /// Patch document.
    pub patch: Vec<PatchEntry>,
}

/// Remote writer double assigning sequential ids.
pub struct RecordingWriter {
    /// Calls in order.
    pub calls: RefCell<Vec<RecordedCall>>,
    /// Next id to assign.
    next_id: Cell<u64>,
    /// Zero-based create call index that fails.
    pub fail_create_at: Option<usize>,
    /// Zero-based link call index that fails.
    pub fail_link_at: Option<usize>,
    /// Create calls seen.
    creates: Cell<usize>,
    /// Link calls seen.
    links: Cell<usize>,
}

impl RecordingWriter {
    /// Writer that accepts every call, assigning ids from `first_id`.
    pub fn new(first_id: u64) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(first_id),
            fail_create_at: None,
            fail_link_at: None,
            creates: Cell::new(0),
            links: Cell::new(0),
        }
    }

    /// Methods of recorded calls in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|call| call.method).collect()
    }

    /// Records a call.
    fn record(&self, method: &'static str, url: &str, patch: &[PatchEntry]) {
        self.calls.borrow_mut().push(RecordedCall {
            method,
            url: url.to_string(),
            patch: patch.to_vec(),
        });
    }
}

impl RemoteWriter for RecordingWriter {
    fn create(&self, type_url: &str, patch: &[PatchEntry]) -> Result<RemoteWorkItem, TransportError> {
        self.record("POST", type_url, patch);
        let index = self.creates.get();
        self.creates.set(index + 1);
        if self.fail_create_at == Some(index) {
            return Err(TransportError::Status {
                status: 400,
                body: "create rejected".to_string(),
            });
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(RemoteWorkItem {
            id,
        })
    }

    fn link(&self, item_url: &str, patch: &[PatchEntry]) -> Result<RemoteWorkItem, TransportError> {
        self.record("PATCH", item_url, patch);
        let index = self.links.get();
        self.links.set(index + 1);
        if self.fail_link_at == Some(index) {
            return Err(TransportError::Status {
                status: 404,
                body: "parent not found".to_string(),
            });
        }
        let id = item_url
            .split('?')
            .next()
            .and_then(|path| path.rsplit('/').next())
            .and_then(|segment| segment.parse().ok())
            .unwrap_or_default();
        Ok(RemoteWorkItem {
            id,
        })
    }
}
