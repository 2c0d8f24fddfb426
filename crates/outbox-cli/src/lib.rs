// crates/outbox-cli/src/lib.rs
// ============================================================================
// Module: Outbox CLI Library
// Description: Shared helpers for the `outbox` binary.
// Purpose: Expose the message catalog to the binary and its tests.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! Library half of the CLI crate. The binary lives in `main.rs`; this crate
//! root only hosts the message catalog and the [`t!`] macro.

pub mod i18n;
