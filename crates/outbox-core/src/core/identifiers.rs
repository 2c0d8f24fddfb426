// crates/outbox-core/src/core/identifiers.rs
// ============================================================================
// Module: Work Item Identifiers
// Description: Remote work-item identifiers and dry-run placeholders.
// Purpose: Keep assigned and not-yet-assigned ids in one typed value.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A write run maps each local id to a [`WorkItemRef`]. Real runs record the
//! id assigned by the remote system; dry runs record a placeholder that
//! renders as `pending:<local_id>` in planned URLs and reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde::Serializer;

// ============================================================================
// SECTION: Work Item Reference
// ============================================================================

/// Reference to a work item in the remote system.
///
/// # Invariants
/// - `Remote` serializes as a number; `Pending` as `pending:<local_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkItemRef {
    /// Identifier assigned by the remote system.
    Remote(u64),
    /// Placeholder for an item whose create call was only planned.
    Pending(String),
}

impl WorkItemRef {
    /// Returns the remote id, if assigned.
    #[must_use]
    pub const fn remote_id(&self) -> Option<u64> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Pending(_) => None,
        }
    }
}

impl fmt::Display for WorkItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Pending(local_id) => write!(f, "pending:{local_id}"),
        }
    }
}

impl Serialize for WorkItemRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Remote(id) => serializer.serialize_u64(*id),
            Self::Pending(_) => serializer.collect_str(self),
        }
    }
}

// ============================================================================
// SECTION: Parent Sources
// ============================================================================

/// Where a parent reference was resolved from.
///
/// # Invariants
/// - Resolution is attempted in declaration order: sibling, batch, registry,
///   literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSource {
    /// An item created earlier in the same bundle.
    Sibling,
    /// An item created by an earlier bundle of the same run.
    Batch,
    /// An entry in the persisted written-item registry.
    Registry,
    /// A literal numeric remote id.
    Literal,
}
