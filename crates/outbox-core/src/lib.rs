// crates/outbox-core/src/lib.rs
// ============================================================================
// Module: Outbox Core Library
// Description: Bundle validation and write orchestration for the outbox.
// Purpose: Move agent-authored bundles through ready, validated, and archived.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Bundles are JSON documents listing related work items. This crate checks
//! them in three ordered stages (schema, policy, metadata), routes them
//! between queue directories, and writes validated bundles to the remote
//! system through the [`RemoteWriter`] seam.
//!
//! ## Invariants
//! - Validation never returns an error for bundle content; it reports it.
//! - Every queue transition is an atomic, non-overwriting rename.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::Bundle;
pub use crate::core::BundleOutcome;
pub use crate::core::IssueCode;
pub use crate::core::Stage;
pub use crate::core::StageStatus;
pub use crate::core::ValidationIssue;
pub use crate::core::ValidationReport;
pub use crate::core::WorkItemRef;
pub use crate::interfaces::PatchEntry;
pub use crate::interfaces::RemoteWorkItem;
pub use crate::interfaces::RemoteWriter;
pub use crate::interfaces::TransportError;
pub use crate::runtime::BundleSelection;
pub use crate::runtime::OutboxError;
pub use crate::runtime::OutboxLayout;
pub use crate::runtime::RemoteEndpoint;
pub use crate::runtime::ValidateRunReport;
pub use crate::runtime::WriteMode;
pub use crate::runtime::WriteOverrides;
pub use crate::runtime::WriteRequest;
pub use crate::runtime::WriteRunReport;
pub use crate::runtime::validate_outbox;
pub use crate::runtime::write_outbox;
