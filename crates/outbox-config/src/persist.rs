// crates/outbox-config/src/persist.rs
// ============================================================================
// Module: Atomic Persistence
// Description: Temp-file-then-rename writes and collision-avoiding moves.
// Purpose: Guarantee readers never observe a partially written artifact.
// Dependencies: serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! All persisted artifacts (policy rewrites, reports, the registry, audit
//! records) go through [`write_atomic`]. Queue transitions go through
//! [`move_unique`], which never overwrites an existing file.
//!
//! ## Invariants
//! - A failed write removes its temporary file.
//! - [`unique_destination`] tries `name.ext`, then `name.1.ext`, `name.2.ext`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    /// Filesystem operation failed.
    #[error("persist io error: {path}: {message}")]
    Io {
        /// Path the operation targeted.
        path: String,
        /// Underlying I/O failure.
        message: String,
    },
    /// Payload could not be serialized.
    #[error("persist encode error: {0}")]
    Encode(String),
}

impl PersistError {
    /// Builds an I/O error for a path.
    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Attempts made to allocate a unique temporary file.
const TEMP_ATTEMPTS: usize = 16;
/// Process-wide counter disambiguating temporary file names.
static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// SECTION: Writes
// ============================================================================

/// Writes bytes to `path` through a synced sibling temp file and a rename.
///
/// # Errors
///
/// Returns [`PersistError::Io`] when any filesystem step fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|err| PersistError::io(parent, &err))?;
    }
    let (temp_path, mut file) = create_temp(path)?;
    if let Err(err) = file.write_all(contents).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistError::io(&temp_path, &err));
    }
    drop(file);
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistError::io(path, &err));
    }
    Ok(())
}

/// Creates a uniquely named hidden temp file next to the destination.
fn create_temp(path: &Path) -> Result<(PathBuf, fs::File), PersistError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
        PersistError::Io {
            path: path.display().to_string(),
            message: "path does not include a file name".to_string(),
        }
    })?;
    for _ in 0 .. TEMP_ATTEMPTS {
        let attempt = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent.join(format!(".{file_name}.tmp.{}.{attempt}", std::process::id()));
        match OpenOptions::new().write(true).create_new(true).open(&temp_path) {
            Ok(file) => return Ok((temp_path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(PersistError::io(&temp_path, &err)),
        }
    }
    Err(PersistError::Io {
        path: path.display().to_string(),
        message: "failed to allocate temporary file".to_string(),
    })
}

/// Renders a payload as YAML preceded by `# ` header comment lines.
///
/// # Errors
///
/// Returns [`PersistError::Encode`] when the payload cannot be serialized.
pub fn render_yaml_with_header<T: Serialize>(
    payload: &T,
    header_lines: &[&str],
) -> Result<String, PersistError> {
    let body =
        serde_yaml::to_string(payload).map_err(|err| PersistError::Encode(err.to_string()))?;
    let header: String = header_lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| format!("# {line}\n"))
        .collect();
    if header.is_empty() {
        return Ok(body);
    }
    Ok(format!("{header}\n{body}"))
}

/// Serializes a payload to YAML with a header and writes it atomically.
///
/// # Errors
///
/// Returns [`PersistError`] when encoding or writing fails.
pub fn write_yaml_atomic<T: Serialize>(
    path: &Path,
    payload: &T,
    header_lines: &[&str],
) -> Result<(), PersistError> {
    let text = render_yaml_with_header(payload, header_lines)?;
    write_atomic(path, text.as_bytes())
}

// ============================================================================
// SECTION: Queue Moves
// ============================================================================

/// Returns the first free path for `file_name` inside `dir`.
///
/// # Errors
///
/// Returns [`PersistError::Io`] when the directory cannot be created.
pub fn unique_destination(dir: &Path, file_name: &str) -> Result<PathBuf, PersistError> {
    fs::create_dir_all(dir).map_err(|err| PersistError::io(dir, &err))?;
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (file_name, None),
    };
    let mut index: u64 = 1;
    loop {
        let numbered = extension.map_or_else(
            || format!("{stem}.{index}"),
            |extension| format!("{stem}.{index}.{extension}"),
        );
        let candidate = dir.join(numbered);
        if !candidate.exists() {
            return Ok(candidate);
        }
        index += 1;
    }
}

/// Moves `source` into `dir` without overwriting, returning the new path.
///
/// # Errors
///
/// Returns [`PersistError::Io`] when the source has no file name or the rename fails.
pub fn move_unique(source: &Path, dir: &Path) -> Result<PathBuf, PersistError> {
    let file_name =
        source.file_name().and_then(|name| name.to_str()).ok_or_else(|| PersistError::Io {
            path: source.display().to_string(),
            message: "path does not include a file name".to_string(),
        })?;
    let destination = unique_destination(dir, file_name)?;
    fs::rename(source, &destination).map_err(|err| PersistError::io(source, &err))?;
    Ok(destination)
}
