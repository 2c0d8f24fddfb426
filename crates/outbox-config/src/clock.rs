// crates/outbox-config/src/clock.rs
// ============================================================================
// Module: Artifact Timestamps
// Description: UTC timestamps for persisted artifacts.
// Purpose: Keep report, registry, and audit timestamps in one format.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Persisted artifacts carry RFC 3339 UTC timestamps. Audit filenames use a
//! compact `YYYYMMDDTHHMMSSZ` stamp so they sort lexicographically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Formats a timestamp as RFC 3339.
///
/// Falls back to Unix seconds when the value is outside the RFC 3339 year range.
#[must_use]
pub fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Formats a timestamp as a compact filename stamp (`20260101T120000Z`).
#[must_use]
pub fn compact_stamp(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Returns the current time as RFC 3339.
#[must_use]
pub fn now_rfc3339() -> String {
    rfc3339(now_utc())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
