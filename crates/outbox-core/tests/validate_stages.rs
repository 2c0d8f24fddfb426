// crates/outbox-core/tests/validate_stages.rs
// ============================================================================
// Module: Validation Stage Tests
// Description: Integration tests for the schema, policy, and metadata stages.
// Purpose: Pin stage ordering, issue codes, and hierarchy walk termination.
// Dependencies: outbox-core, outbox-config, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Each test starts from the passing Feature/UserStory bundle, perturbs one
//! aspect, and checks the issues and stage statuses of the report.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use outbox_config::Severity;
use outbox_core::IssueCode;
use outbox_core::Stage;
use outbox_core::StageStatus;
use outbox_core::ValidationReport;
use outbox_core::runtime::BundleValidator;
use serde_json::Value;
use serde_json::json;

use crate::common::OutboxFixture;
use crate::common::feature_story_bundle;
use crate::common::item_mut;

/// Validates a bundle value against the fixture contract.
fn validate(fixture: &OutboxFixture, bundle: &Value) -> ValidationReport {
    let validator = BundleValidator::load(&fixture.paths, &fixture.schema()).unwrap();
    validator.validate_value("inline.json", bundle)
}

/// Codes of a report's issues in order.
fn codes(report: &ValidationReport) -> Vec<IssueCode> {
    report.issues.iter().map(|issue| issue.code).collect()
}

// ============================================================================
// SECTION: Passing Bundle
// ============================================================================

#[test]
fn coherent_bundle_passes_every_stage() {
    let fixture = OutboxFixture::new().unwrap();
    let report = validate(&fixture, &feature_story_bundle("bundle-1"));

    assert!(report.passed(), "{:?}", report.issues);
    assert_eq!(report.stages.schema.status, StageStatus::Passed);
    assert_eq!(report.stages.policy.status, StageStatus::Passed);
    assert_eq!(report.stages.metadata.status, StageStatus::Passed);
    assert_eq!(report.bundle.bundle_id.as_deref(), Some("bundle-1"));
}

// ============================================================================
// SECTION: Schema Stage
// ============================================================================

#[test]
fn schema_violation_skips_later_stages() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    item_mut(&mut bundle, 1).as_object_mut().unwrap().remove("title");
    // Duplicate ids would fail policy if policy ran.
    item_mut(&mut bundle, 1)["local_id"] = json!("F-001");

    let report = validate(&fixture, &bundle);

    assert_eq!(report.stages.schema.status, StageStatus::Failed);
    assert_eq!(report.stages.policy.status, StageStatus::Skipped);
    assert_eq!(report.stages.metadata.status, StageStatus::Skipped);
    assert_eq!(report.issues_for(Stage::Policy).count(), 0);
    assert_eq!(report.issues_for(Stage::Metadata).count(), 0);
    assert!(codes(&report).iter().all(|code| *code == IssueCode::SchemaViolation));
}

#[test]
fn schema_issues_are_sorted_by_path() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    item_mut(&mut bundle, 1)["unexpected"] = json!(true);
    item_mut(&mut bundle, 0)["title"] = json!(7);

    let report = validate(&fixture, &bundle);

    let paths: Vec<&str> = report.issues.iter().map(|issue| issue.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort_unstable();
    assert_eq!(paths, sorted);
    assert!(paths.contains(&"$.work_items.0.title"), "{paths:?}");
}

#[test]
fn undecodable_file_reports_decode_error() {
    let fixture = OutboxFixture::new().unwrap();
    let path = fixture.root.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let validator = BundleValidator::load(&fixture.paths, &fixture.schema()).unwrap();

    let report = validator.validate_file(&path);

    assert_eq!(codes(&report), vec![IssueCode::BundleJsonDecodeError]);
    assert_eq!(report.issues[0].path, "$");
    assert_eq!(report.stages.policy.status, StageStatus::Skipped);
}

// ============================================================================
// SECTION: Policy Stage
// ============================================================================

#[test]
fn each_duplicated_local_id_is_reported_once() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    let story = item_mut(&mut bundle, 1).clone();
    let items = bundle["work_items"].as_array_mut().unwrap();
    items.push(story.clone());
    items.push(story);

    let report = validate(&fixture, &bundle);

    let duplicates: Vec<_> = report
        .issues
        .iter()
        .filter(|issue| issue.code == IssueCode::DuplicateLocalId)
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert!(duplicates[0].message.contains("'US-001'"));
    assert_eq!(report.stages.metadata.status, StageStatus::Skipped);
}

#[test]
fn three_item_cycle_is_detected_without_looping() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    let template = item_mut(&mut bundle, 1).clone();
    let mut items = Vec::new();
    for (local_id, parent) in [("A", "B"), ("B", "C"), ("C", "A")] {
        let mut item = template.clone();
        item["local_id"] = json!(local_id);
        item["relations"]["parent_local_id"] = json!(parent);
        items.push(item);
    }
    bundle["work_items"] = Value::Array(items);

    let report = validate(&fixture, &bundle);

    assert!(codes(&report).contains(&IssueCode::HierarchyCycle), "{:?}", codes(&report));
    assert!(!codes(&report).contains(&IssueCode::MaxDepthExceeded));
}

#[test]
fn chains_deeper_than_max_depth_are_reported() {
    let fixture = OutboxFixture::new().unwrap();
    fixture
        .policy(
            "link_policy.yaml",
            "schema_version: '1.0'\nallowed_link_types: [parent-child]\nmax_depth: 2\nforbid_double_nesting: []\n",
        )
        .unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    let mut grandchild = item_mut(&mut bundle, 1).clone();
    grandchild["local_id"] = json!("US-002");
    grandchild["relations"]["parent_local_id"] = json!("US-001");
    bundle["work_items"].as_array_mut().unwrap().push(grandchild);

    let report = validate(&fixture, &bundle);

    let depth: Vec<_> = report
        .issues
        .iter()
        .filter(|issue| issue.code == IssueCode::MaxDepthExceeded)
        .collect();
    assert_eq!(depth.len(), 1);
    assert_eq!(depth[0].path, "$.work_items.2.relations.parent_local_id");
}

#[test]
fn same_type_parent_is_forbidden_for_listed_types() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    let mut child_feature = item_mut(&mut bundle, 0).clone();
    child_feature["local_id"] = json!("F-002");
    child_feature["relations"]["parent_local_id"] = json!("F-001");
    bundle["work_items"].as_array_mut().unwrap().push(child_feature);

    let report = validate(&fixture, &bundle);

    assert_eq!(codes(&report), vec![IssueCode::DoubleNestingForbidden]);
}

#[test]
fn required_tags_accept_context_or_item_tags() {
    let fixture = OutboxFixture::new().unwrap();
    fixture
        .policy(
            "standards.yaml",
            "schema_version: '1.0'\nrequired_tags: [agent, planning]\nwork_item_standards: {}\n",
        )
        .unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    item_mut(&mut bundle, 0)["tags"] = json!(["planning"]);

    let report = validate(&fixture, &bundle);

    let tags: Vec<_> = report
        .issues
        .iter()
        .filter(|issue| issue.code == IssueCode::MissingRequiredTags)
        .collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].path, "$.work_items.1.tags");
    assert!(tags[0].message.ends_with("missing required tags: [planning]."));
}

#[test]
fn required_fields_and_allowed_fields_are_enforced() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    item_mut(&mut bundle, 1)["acceptance_criteria"] = json!([]);
    item_mut(&mut bundle, 1)["fields"] = json!({ "story_points": 0, "priority": 1 });

    let report = validate(&fixture, &bundle);

    let found: Vec<(IssueCode, &str)> =
        report.issues.iter().map(|issue| (issue.code, issue.path.as_str())).collect();
    assert_eq!(
        found,
        vec![
            (IssueCode::MissingRequiredField, "$.work_items.1.fields.acceptance_criteria"),
            (IssueCode::FieldNotAllowedByPolicy, "$.work_items.1.fields.priority"),
        ]
    );
}

#[test]
fn area_path_default_satisfies_required_field() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    bundle["context"].as_object_mut().unwrap().remove("default_area_path");
    item_mut(&mut bundle, 0)["fields"]["area_path"] = json!(common::AREA);

    let report = validate(&fixture, &bundle);

    let missing: Vec<&str> = report
        .issues
        .iter()
        .filter(|issue| issue.code == IssueCode::MissingRequiredField)
        .map(|issue| issue.path.as_str())
        .collect();
    assert_eq!(missing, vec!["$.work_items.1.fields.area_path"]);
}

// ============================================================================
// SECTION: Metadata Stage
// ============================================================================

#[test]
fn unknown_paths_and_unmapped_fields_fail_metadata() {
    let fixture = OutboxFixture::new().unwrap();
    fixture
        .policy(
            "field_policy.yaml",
            &common::FIELD_POLICY.replace(
                "UserStory: [area_path, iteration_path, owner, story_points]",
                "UserStory: [area_path, iteration_path, owner, story_points, risk]",
            ),
        )
        .unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    item_mut(&mut bundle, 1)["fields"]["risk"] = json!("high");
    item_mut(&mut bundle, 0)["fields"]["area_path"] = json!("Black Lagoon\\Unknown Team");

    let report = validate(&fixture, &bundle);

    assert_eq!(report.stages.policy.status, StageStatus::Passed);
    assert_eq!(report.stages.metadata.status, StageStatus::Failed);
    let found: Vec<(IssueCode, &str)> =
        report.issues.iter().map(|issue| (issue.code, issue.path.as_str())).collect();
    assert_eq!(
        found,
        vec![
            (IssueCode::UnknownAreaPath, "$.work_items.0.fields.area_path"),
            (IssueCode::UnknownCanonicalFieldKey, "$.work_items.1.fields.risk"),
        ]
    );
}

#[test]
fn area_paths_compare_after_normalization() {
    let fixture = OutboxFixture::new().unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    bundle["context"]["default_area_path"] = json!("/Black Lagoon//Team A ");

    let report = validate(&fixture, &bundle);

    assert!(report.passed(), "{:?}", report.issues);
}

#[test]
fn remote_type_missing_from_metadata_skips_field_checks() {
    let fixture = OutboxFixture::new().unwrap();
    fixture
        .generated(
            "wit_contract.yaml",
            &common::WIT_CONTRACT.replace("  User Story:", "  Story Renamed:"),
        )
        .unwrap();
    let report = validate(&fixture, &feature_story_bundle("bundle-1"));

    assert_eq!(codes(&report), vec![IssueCode::WitNotInGeneratedMetadata]);
    assert_eq!(report.issues[0].path, "$.work_items.1.type");
}

#[test]
fn missing_path_catalogs_are_informational() {
    let fixture = OutboxFixture::new().unwrap();
    fixture.remove_generated("paths_area.yaml").unwrap();
    fixture.remove_generated("paths_iteration.yaml").unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    bundle["context"]["default_area_path"] = json!("Anything\\Goes");

    let report = validate(&fixture, &bundle);

    assert!(report.passed(), "{:?}", report.issues);
    assert_eq!(report.stages.metadata.status, StageStatus::Passed);
    assert_eq!(
        codes(&report),
        vec![IssueCode::AreaPathsMetadataMissing, IssueCode::IterationPathsMetadataMissing]
    );
    assert!(report.issues.iter().all(|issue| issue.severity == Severity::Info));
}

#[test]
fn missing_classification_is_unresolved() {
    let fixture = OutboxFixture::new().unwrap();
    fixture
        .policy(
            "field_policy.yaml",
            &common::FIELD_POLICY
                .replace(
                    "Feature: [title, description, area_path, iteration_path]",
                    "Feature: [title, description]",
                )
                .replace(
                    "UserStory: [title, description, acceptance_criteria, area_path, iteration_path, story_points]",
                    "UserStory: [title, description]",
                ),
        )
        .unwrap();
    let mut bundle = feature_story_bundle("bundle-1");
    bundle["context"].as_object_mut().unwrap().remove("default_iteration_path");

    let report = validate(&fixture, &bundle);

    let unresolved: Vec<&str> = report
        .issues
        .iter()
        .filter(|issue| issue.code == IssueCode::UnresolvedIterationPath)
        .map(|issue| issue.path.as_str())
        .collect();
    assert_eq!(
        unresolved,
        vec!["$.work_items.0.fields.iteration_path", "$.work_items.1.fields.iteration_path"]
    );
}
