// crates/outbox-config/src/lib.rs
// ============================================================================
// Module: Outbox Config Library
// Description: Contract loader for the work-item outbox.
// Purpose: Expose policy documents, the effective contract, and persistence helpers.
// Dependencies: crate::{clock, contract, documents, persist, reference, severity}
// ============================================================================

//! ## Overview
//! The outbox contract is assembled from five operator-managed policy
//! documents plus harvested metadata. This crate parses them strictly into
//! typed records, composes them into an [`EffectiveContract`], and provides the
//! atomic write primitives every other outbox crate uses to persist artifacts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod contract;
pub mod documents;
pub mod persist;
pub mod reference;
pub mod severity;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use contract::ContractPaths;
pub use contract::EffectiveContract;
pub use contract::save_field_policy;
pub use documents::ConfigError;
pub use documents::FieldMap;
pub use documents::FieldMapping;
pub use documents::FieldPolicy;
pub use documents::GeneratedWitContract;
pub use documents::LinkPolicy;
pub use documents::OwnerIdentityFormat;
pub use documents::StandardRule;
pub use documents::StandardsPolicy;
pub use documents::WitCapabilities;
pub use documents::WitMap;
pub use persist::PersistError;
pub use persist::move_unique;
pub use persist::unique_destination;
pub use persist::write_atomic;
pub use persist::write_yaml_atomic;
pub use reference::Identity;
pub use reference::PathCatalog;
pub use reference::PlanningContext;
pub use reference::Reference;
pub use reference::Team;
pub use severity::Severity;
