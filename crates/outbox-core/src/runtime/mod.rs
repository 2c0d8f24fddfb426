// crates/outbox-core/src/runtime/mod.rs
// ============================================================================
// Module: Outbox Runtime
// Description: Validation pipeline, queue routing, and write orchestration.
// Purpose: Run bundles through the outbox state machine.
// Dependencies: crate::runtime::*, outbox-config, thiserror
// ============================================================================

//! ## Overview
//! Bundles move `ready -> validated | failed` through [`validate_outbox`] and
//! `validated -> archived` through [`write_outbox`]. Both entry points take
//! every directory root explicitly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod layout;
pub mod markdown;
pub mod patch;
pub mod queue;
pub mod registry;
pub mod urls;
pub mod validator;
pub mod writer;

// ============================================================================
// SECTION: Imports
// ============================================================================

use outbox_config::ConfigError;
use outbox_config::PersistError;
use thiserror::Error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use layout::BundleSelection;
pub use layout::OutboxLayout;
pub use patch::WriteOverrides;
pub use queue::ValidateRunReport;
pub use queue::ValidatedBundle;
pub use queue::validate_outbox;
pub use registry::RegistryEntry;
pub use registry::WrittenItemRegistry;
pub use urls::RemoteEndpoint;
pub use validator::BundleValidator;
pub use writer::WriteMode;
pub use writer::WriteRequest;
pub use writer::WriteRunReport;
pub use writer::write_outbox;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Outbox run errors.
///
/// Content problems never surface here; they become report entries.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    /// The contract could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An artifact could not be persisted.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The bundle JSON Schema is unreadable or invalid.
    #[error("bundle schema error: {path}: {message}")]
    Schema {
        /// Schema document path.
        path: String,
        /// Failure description.
        message: String,
    },
    /// A queue directory or bundle file operation failed.
    #[error("outbox io error: {path}: {message}")]
    Io {
        /// Path the operation targeted.
        path: String,
        /// Underlying I/O failure.
        message: String,
    },
    /// The caller combined options incorrectly.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A single bundle path does not name a file.
    #[error("bundle file not found: {0}")]
    BundleNotFound(String),
    /// Another write run holds the outbox lock.
    #[error("outbox is locked by another write run: {0}")]
    Locked(String),
}

impl OutboxError {
    /// Builds an I/O error for a path.
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
