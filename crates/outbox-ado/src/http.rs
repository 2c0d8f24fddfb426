// crates/outbox-ado/src/http.rs
// ============================================================================
// Module: HTTP Remote Writer
// Description: Blocking HTTP transport for work item create and link calls.
// Purpose: Authenticate with a personal access token and map HTTP failures.
// Dependencies: base64, outbox-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! Create calls are `POST` and link calls are `PATCH`; both send a JSON Patch
//! array as `application/json-patch+json` with Basic authentication built
//! from an empty user name and the token. Responses with status 400 or above
//! become [`TransportError::Status`] carrying a truncated body.
//!
//! ## Invariants
//! - Success bodies are read up to `max_response_bytes`; error bodies are
//!   read up to the kept prefix so the status survives oversized bodies.
//! - The token never appears in `Debug` output or errors.
//! - Redirects are not followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use outbox_core::PatchEntry;
use outbox_core::RemoteWorkItem;
use outbox_core::RemoteWriter;
use outbox_core::TransportError;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Value;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type of patch documents.
pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
/// Characters of an error body kept in [`TransportError::Status`].
pub const ERROR_BODY_LIMIT: usize = 500;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP remote writer.
///
/// # Invariants
/// - `timeout_ms` applies to the full request lifecycle.
/// - `max_response_bytes` bounds every response body read.
#[derive(Clone, PartialEq, Eq)]
pub struct AdoHttpConfig {
    /// Personal access token.
    pub pat: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Maximum response size read, in bytes.
    pub max_response_bytes: usize,
}

impl AdoHttpConfig {
    /// Creates a configuration with default limits for a token.
    #[must_use]
    pub fn new(pat: impl Into<String>) -> Self {
        Self {
            pat: pat.into(),
            timeout_ms: 30_000,
            user_agent: "outbox/0.1".to_string(),
            max_response_bytes: 1024 * 1024,
        }
    }
}

impl fmt::Debug for AdoHttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdoHttpConfig")
            .field("pat", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Remote writer sending patch documents over HTTP.
pub struct AdoHttpWriter {
    /// Limits and credentials.
    config: AdoHttpConfig,
    /// Precomputed `Authorization` header value.
    authorization: String,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl AdoHttpWriter {
    /// Creates a writer with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the HTTP client cannot be built.
    pub fn new(config: AdoHttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| TransportError::Request(format!("http client build failed: {err}")))?;
        Ok(Self {
            authorization: basic_authorization(&config.pat),
            config,
            client,
        })
    }

    /// Sends a patch document and decodes the returned work item.
    fn send(
        &self,
        method: Method,
        url: &str,
        patch: &[PatchEntry],
    ) -> Result<RemoteWorkItem, TransportError> {
        let body = serde_json::to_vec(patch)
            .map_err(|err| TransportError::Request(format!("patch encoding failed: {err}")))?;
        debug!(%method, url, entries = patch.len(), "sending work item request");
        let mut response = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .body(body)
            .send()
            .map_err(|err| TransportError::Request(err.without_url().to_string()))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(TransportError::Status {
                status,
                body: read_error_body(&mut response),
            });
        }
        let bytes = read_response_limited(&mut response, self.config.max_response_bytes)?;
        decode_work_item(&bytes)
    }
}

impl RemoteWriter for AdoHttpWriter {
    fn create(&self, type_url: &str, patch: &[PatchEntry]) -> Result<RemoteWorkItem, TransportError> {
        self.send(Method::POST, type_url, patch)
    }

    fn link(&self, item_url: &str, patch: &[PatchEntry]) -> Result<RemoteWorkItem, TransportError> {
        self.send(Method::PATCH, item_url, patch)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the Basic authorization value for a token with an empty user name.
#[must_use]
pub fn basic_authorization(pat: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{pat}")))
}

/// Keeps the first `limit` characters of `text`.
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Decodes the `id` of a work item response.
fn decode_work_item(bytes: &[u8]) -> Result<RemoteWorkItem, TransportError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| TransportError::Decode(format!("response is not JSON: {err}")))?;
    let id = value
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| TransportError::Decode("response has no numeric id".to_string()))?;
    Ok(RemoteWorkItem {
        id,
    })
}

/// Reads the start of an error body, ignoring the response size limit.
///
/// Only the first [`ERROR_BODY_LIMIT`] characters are kept; read failures
/// yield an empty body so the status code is never lost.
fn read_error_body(response: &mut Response) -> String {
    // Four bytes per character covers any UTF-8 prefix of the kept length.
    let prefix_bytes = u64::try_from(ERROR_BODY_LIMIT.saturating_mul(4)).unwrap_or(u64::MAX);
    let mut buf = Vec::new();
    if response.take(prefix_bytes).read_to_end(&mut buf).is_err() {
        return String::new();
    }
    truncate_chars(&String::from_utf8_lossy(&buf), ERROR_BODY_LIMIT)
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, TransportError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| TransportError::Decode("response size limit exceeds u64".to_string()))?;
    if response.content_length().is_some_and(|expected| expected > max_bytes_u64) {
        return Err(TransportError::Decode("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| TransportError::Decode(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(TransportError::Decode("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
