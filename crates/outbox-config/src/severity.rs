// crates/outbox-config/src/severity.rs
// ============================================================================
// Module: Finding Severity
// Description: Severity levels shared by lint findings and validation issues.
// Purpose: Provide one ordering for report sorting across crates.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Severity ordering is `error < warning < info`, so sorting ascending puts
//! blocking findings first. Only `error` blocks strict readiness.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Severity of a report finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks strict readiness.
    Error,
    /// Worth fixing; does not block.
    Warning,
    /// Informational only.
    Info,
}

impl Severity {
    /// Returns the serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Returns true for blocking severities.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
