// crates/outbox-config/src/contract/tests.rs
// ============================================================================
// Module: Effective Contract Unit Tests
// Description: Unit coverage for private contract helpers.
// Purpose: Pin deterministic ordering of persisted policy sections.
// Dependencies: outbox-config
// ============================================================================

//! ## Overview
//! Confirms the set-sorting helper used when persisting the field policy.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions format values for diagnostics."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use super::sorted_sets;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sorted_sets_orders_and_dedupes_members() -> Result<(), String> {
    let mut map = BTreeMap::new();
    map.insert(
        "UserStory".to_string(),
        vec!["title".to_string(), "area_path".to_string(), "title".to_string()],
    );
    map.insert("Feature".to_string(), vec!["description".to_string()]);

    let sorted = sorted_sets(&map);
    let keys: Vec<&str> = sorted.keys().copied().collect();
    if keys != ["Feature", "UserStory"] {
        return Err(format!("unexpected key order: {keys:?}"));
    }
    if sorted.get("UserStory") != Some(&vec!["area_path", "title"]) {
        return Err(format!("unexpected members: {:?}", sorted.get("UserStory")));
    }
    Ok(())
}
