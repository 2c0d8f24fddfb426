// crates/outbox-core/src/core/mod.rs
// ============================================================================
// Module: Outbox Core Types
// Description: Bundle, identifier, and report data model.
// Purpose: Group the serializable types shared by validation and write.
// Dependencies: crate::core::{bundle, identifiers, report}
// ============================================================================

//! ## Overview
//! Pure data types with no I/O. The runtime modules consume these types and
//! the CLI serializes them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bundle;
pub mod identifiers;
pub mod report;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bundle::Bundle;
pub use bundle::BundleContext;
pub use bundle::Relations;
pub use bundle::WorkItem;
pub use identifiers::ParentSource;
pub use identifiers::WorkItemRef;
pub use report::BundleOutcome;
pub use report::IssueCode;
pub use report::ReportedBundle;
pub use report::Stage;
pub use report::StageIssues;
pub use report::StageStatus;
pub use report::ValidationIssue;
pub use report::ValidationReport;
