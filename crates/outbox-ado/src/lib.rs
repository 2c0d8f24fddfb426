// crates/outbox-ado/src/lib.rs
// ============================================================================
// Module: Outbox ADO Transport
// Description: HTTP remote writer for the work item API.
// Purpose: Send create and link patch documents over blocking HTTP.
// Dependencies: crate::http
// ============================================================================

//! ## Overview
//! [`AdoHttpWriter`] implements [`outbox_core::RemoteWriter`] with a blocking
//! `reqwest` client. The orchestrator owns URL construction; this crate only
//! authenticates, sends, and decodes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::AdoHttpConfig;
pub use http::AdoHttpWriter;
