// crates/outbox-core/src/interfaces/mod.rs
// ============================================================================
// Module: Outbox Interfaces
// Description: Remote-write collaborator contract and patch document types.
// Purpose: Keep the write orchestrator independent of any HTTP client.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The write orchestrator builds JSON Patch documents and hands them to a
//! [`RemoteWriter`]. The HTTP implementation lives in a separate crate; tests
//! substitute a recording double.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Patch Documents
// ============================================================================

/// Relation type linking a child to its parent.
pub const HIERARCHY_REVERSE: &str = "System.LinkTypes.Hierarchy-Reverse";

/// JSON Patch operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a value at the path.
    Add,
}

/// One JSON Patch entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Patch operation.
    pub op: PatchOp,
    /// Target path, e.g. `/fields/System.Title`.
    pub path: String,
    /// Value to apply.
    pub value: Value,
}

impl PatchEntry {
    /// Builds an `add` entry for a remote field reference name.
    #[must_use]
    pub fn field(reference_name: &str, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: format!("/fields/{reference_name}"),
            value,
        }
    }

    /// Builds an `add` entry appending a parent hierarchy relation.
    #[must_use]
    pub fn parent_relation(parent_url: &str) -> Self {
        Self {
            op: PatchOp::Add,
            path: "/relations/-".to_string(),
            value: json!({
                "rel": HIERARCHY_REVERSE,
                "url": parent_url,
            }),
        }
    }
}

// ============================================================================
// SECTION: Remote Writer
// ============================================================================

/// Work item returned by a remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWorkItem {
    /// Remote identifier.
    pub id: u64,
}

/// Remote write transport errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be sent or timed out.
    #[error("remote request failed: {0}")]
    Request(String),
    /// The remote system answered with an error status.
    #[error("remote returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// The response body could not be decoded.
    #[error("remote response decode failed: {0}")]
    Decode(String),
}

/// Creates and links work items in the remote system.
pub trait RemoteWriter {
    /// Creates a work item by posting a patch document to a type URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the remote call fails.
    fn create(&self, type_url: &str, patch: &[PatchEntry])
    -> Result<RemoteWorkItem, TransportError>;

    /// Applies a patch document to an existing work item.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the remote call fails.
    fn link(&self, item_url: &str, patch: &[PatchEntry]) -> Result<RemoteWorkItem, TransportError>;
}
