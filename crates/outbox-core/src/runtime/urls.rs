// crates/outbox-core/src/runtime/urls.rs
// ============================================================================
// Module: Remote Endpoint URLs
// Description: Work item API URL construction.
// Purpose: Build create, update, and relation URLs with encoded segments.
// Dependencies: crate::core, urlencoding
// ============================================================================

//! ## Overview
//! Every path segment is percent-decoded then re-encoded so operator input
//! that is already encoded is not double-encoded. Create URLs address the
//! type as `$Type`, which renders as `%24Type`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::WorkItemRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default work item API version.
pub const DEFAULT_API_VERSION: &str = "7.0";

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Organization, project, and API version of the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Organization base URL.
    pub org_url: String,
    /// Project name.
    pub project: String,
    /// API version query value.
    pub api_version: String,
}

impl RemoteEndpoint {
    /// Creates an endpoint description.
    #[must_use]
    pub fn new(
        org_url: impl Into<String>,
        project: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            org_url: org_url.into(),
            project: project.into(),
            api_version: api_version.into(),
        }
    }

    /// URL that creates a work item of `remote_type`.
    #[must_use]
    pub fn create_url(&self, remote_type: &str) -> String {
        let base = join_url(
            &self.org_url,
            &[&self.project, "_apis", "wit", "workitems", &format!("${remote_type}")],
        );
        self.with_version(base)
    }

    /// URL identifying an existing work item, used as a relation target.
    #[must_use]
    pub fn item_url(&self, item: &WorkItemRef) -> String {
        let base = join_url(&self.org_url, &[&self.project, "_apis", "wit", "workitems"]);
        match item {
            WorkItemRef::Remote(id) => format!("{base}/{id}"),
            WorkItemRef::Pending(local_id) => format!("{base}/pending:{}", encode_segment(local_id)),
        }
    }

    /// URL that patches an existing work item.
    #[must_use]
    pub fn update_url(&self, item: &WorkItemRef) -> String {
        self.with_version(self.item_url(item))
    }

    /// Appends the API version query.
    fn with_version(&self, url: String) -> String {
        format!("{url}?api-version={}", urlencoding::encode(&self.api_version))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Percent-encodes one path segment without double-encoding.
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |d| d.into_owned());
    urlencoding::encode(&decoded).into_owned()
}

/// Joins a base URL with encoded segments, skipping blank ones.
#[must_use]
pub fn join_url(base_url: &str, segments: &[&str]) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    url
}

// ============================================================================
// SECTION: Tests
// ============================================================================
