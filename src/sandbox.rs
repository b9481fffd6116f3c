//! Path confinement for scratch-space file operations.
//!
//! Every relative path supplied by a client is resolved through
//! [`Sandbox::resolve`] before any filesystem access. The check rejects
//! absolute paths, `..` traversal, and symlinks that point outside the
//! sandbox root, including symlinks on intermediate components.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("scratch root '{path}' is not usable: {source}")]
    RootUnavailable { path: String, source: io::Error },

    #[error("path '{path}' is absolute; scratch paths must be relative")]
    AbsolutePath { path: String },

    #[error("path '{path}' contains a parent-directory component")]
    ParentTraversal { path: String },

    #[error("path '{path}' resolves outside the scratch directory")]
    EscapesRoot { path: String },
}

/// A canonicalized directory that relative paths are confined to.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open a sandbox rooted at an existing, writable directory.
    pub fn new(root: &Path) -> Result<Self, SandboxError> {
        let root = fs::canonicalize(root).map_err(|source| SandboxError::RootUnavailable {
            path: root.display().to_string(),
            source,
        })?;
        if !root.is_dir() {
            return Err(SandboxError::RootUnavailable {
                path: root.display().to_string(),
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            });
        }
        // Writability is confirmed up front so a misconfigured root fails
        // at startup rather than on the first file operation.
        let marker = root.join(format!(".opsgate-write-check-{}", std::process::id()));
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .map_err(|source| SandboxError::RootUnavailable {
                path: root.display().to_string(),
                source,
            })?;
        let _ = fs::remove_file(&marker);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied relative path to an absolute path inside
    /// the root, or reject it.
    ///
    /// The containment check canonicalizes the deepest existing ancestor
    /// of the candidate path first, so a symlink anywhere along the way
    /// cannot smuggle the target outside the root. Broken symlinks are
    /// rejected outright since their destination cannot be verified.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, SandboxError> {
        let path = Path::new(rel);
        if path.is_absolute() {
            return Err(SandboxError::AbsolutePath { path: rel.to_string() });
        }

        let mut cleaned = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => cleaned.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(SandboxError::ParentTraversal { path: rel.to_string() });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SandboxError::AbsolutePath { path: rel.to_string() });
                }
            }
        }

        let candidate = self.root.join(&cleaned);

        // Peel off components that do not exist yet. symlink_metadata
        // succeeds on broken symlinks, so a dangling link counts as the
        // existing node and fails canonicalization below.
        let mut existing = candidate.clone();
        let mut missing: Vec<OsString> = Vec::new();
        while existing != self.root && existing.symlink_metadata().is_err() {
            match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) => {
                    missing.push(name.to_os_string());
                    existing = parent.to_path_buf();
                }
                _ => break,
            }
        }

        let resolved = fs::canonicalize(&existing)
            .map_err(|_| SandboxError::EscapesRoot { path: rel.to_string() })?;
        if resolved != self.root && !resolved.starts_with(&self.root) {
            return Err(SandboxError::EscapesRoot { path: rel.to_string() });
        }

        let mut full = resolved;
        for part in missing.iter().rev() {
            full.push(part);
        }
        Ok(full)
    }
}
