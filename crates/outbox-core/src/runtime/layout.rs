// crates/outbox-core/src/runtime/layout.rs
// ============================================================================
// Module: Outbox Layout
// Description: Queue directories, registry, and lock locations.
// Purpose: Derive every outbox path from one explicit root.
// Dependencies: std::fs
// ============================================================================

//! ## Overview
//! The outbox root holds four queue directories (`ready`, `validated`,
//! `failed`, `archived`), the written-item registry, and the write lock.
//! [`BundleSelection`] captures whether a run targets one file or a queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::runtime::OutboxError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Registry file name inside the outbox root.
pub const REGISTRY_FILE: &str = "_written_work_items.yaml";
/// Lock file name inside the outbox root.
pub const LOCK_FILE: &str = ".write.lock";

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Directory layout of an outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxLayout {
    /// Outbox root directory.
    pub root: PathBuf,
}

impl OutboxLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Bundles awaiting validation.
    #[must_use]
    pub fn ready_dir(&self) -> PathBuf {
        self.root.join("ready")
    }

    /// Bundles that passed validation.
    #[must_use]
    pub fn validated_dir(&self) -> PathBuf {
        self.root.join("validated")
    }

    /// Bundles that failed validation, with their reports.
    #[must_use]
    pub fn failed_dir(&self) -> PathBuf {
        self.root.join("failed")
    }

    /// Bundles written successfully.
    #[must_use]
    pub fn archived_dir(&self) -> PathBuf {
        self.root.join("archived")
    }

    /// Persisted written-item registry.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    /// Advisory lock held by write runs.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Creates the given queue directories.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::Io`] when a directory cannot be created.
    pub fn ensure_dirs(&self, dirs: &[PathBuf]) -> Result<(), OutboxError> {
        for dir in dirs {
            fs::create_dir_all(dir).map_err(|err| OutboxError::io(dir, &err))?;
        }
        Ok(())
    }
}

/// Returns true when `path` resolves inside `dir`.
#[must_use]
pub fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

/// Lists `*.json` files in a queue directory in lexicographic name order.
///
/// # Errors
///
/// Returns [`OutboxError::Io`] when the directory cannot be read.
pub fn queued_bundles(dir: &Path) -> Result<Vec<PathBuf>, OutboxError> {
    let entries = fs::read_dir(dir).map_err(|err| OutboxError::io(dir, &err))?;
    let mut bundles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| OutboxError::io(dir, &err))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|extension| extension == "json") {
            bundles.push(path);
        }
    }
    bundles.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(bundles)
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Which bundles a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSelection {
    /// One bundle file at an arbitrary path.
    Single(PathBuf),
    /// Every bundle in the run's source queue.
    Queue,
}

impl BundleSelection {
    /// Builds a selection from a bundle argument and an "all" flag.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::InvalidRequest`] unless exactly one is given.
    pub fn from_args(bundle: Option<PathBuf>, all: bool) -> Result<Self, OutboxError> {
        match (bundle, all) {
            (Some(_), true) => Err(OutboxError::InvalidRequest(
                "pass either a bundle path or the all flag, not both".to_string(),
            )),
            (None, false) => Err(OutboxError::InvalidRequest(
                "provide a bundle path or pass the all flag".to_string(),
            )),
            (Some(path), false) => Ok(Self::Single(path)),
            (None, true) => Ok(Self::Queue),
        }
    }

    /// Resolves the selection to bundle paths, reading `queue_dir` for
    /// [`BundleSelection::Queue`].
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::BundleNotFound`] when a single path is not a
    /// file, or [`OutboxError::Io`] when the queue cannot be listed.
    pub fn resolve(&self, queue_dir: &Path) -> Result<Vec<PathBuf>, OutboxError> {
        match self {
            Self::Single(path) => {
                if !path.is_file() {
                    return Err(OutboxError::BundleNotFound(path.display().to_string()));
                }
                Ok(vec![path.canonicalize().map_err(|err| OutboxError::io(path, &err))?])
            }
            Self::Queue => queued_bundles(queue_dir),
        }
    }
}
