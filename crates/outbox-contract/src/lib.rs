// crates/outbox-contract/src/lib.rs
// ============================================================================
// Module: Outbox Contract Library
// Description: Contract linting and agent contract export.
// Purpose: Surface authoring mistakes and publish the effective contract.
// Dependencies: outbox-config, serde, serde_yaml, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`lint_contract`] cross-validates the policy documents and always returns a
//! report, even when the documents cannot be loaded. [`export_contract`]
//! promotes remote-required fields into policy and writes the agent contract
//! snapshot consumed by bundle authors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use outbox_config::ConfigError;
use outbox_config::PersistError;
use thiserror::Error;

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod lint;
pub mod snapshot;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use lint::Finding;
pub use lint::FindingCode;
pub use lint::LintReport;
pub use lint::lint_contract;
pub use lint::write_lint_report;
pub use snapshot::ExportOutcome;
pub use snapshot::export_contract;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while exporting or persisting contract artifacts.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Contract documents could not be loaded or rewritten.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Artifact could not be written.
    #[error(transparent)]
    Persist(#[from] PersistError),
}
