//! Scratch-space file operations.
//!
//! Every operation routes its client-supplied path through the
//! [`Sandbox`] before touching the filesystem. The scratch space gives a
//! client somewhere to stage files, apply patches, and snapshot
//! resources without any access outside the configured root.

use std::fs;
use std::io;

use thiserror::Error;

use crate::resources::ResourceSet;
use crate::sandbox::{Sandbox, SandboxError};

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("{op} '{path}' failed: {source}")]
    Io {
        op: &'static str,
        path: String,
        source: io::Error,
    },

    #[error("invalid patch: {0}")]
    PatchInvalid(String),

    #[error("patch does not apply to '{path}': {detail}")]
    PatchFailed { path: String, detail: String },

    #[error("search text not found in '{path}'")]
    SearchNotFound { path: String },

    #[error("resource '{uri}' not found")]
    ResourceNotFound { uri: String },

    #[error("no resources match prefix '{prefix}'")]
    NoMatchingResources { prefix: String },
}

fn io_err(op: &'static str, path: &str) -> impl FnOnce(io::Error) -> ScratchError {
    let path = path.to_string();
    move |source| ScratchError::Io { op, path, source }
}

/// Sandboxed scratch directory with file operations.
#[derive(Debug, Clone)]
pub struct Scratch {
    sandbox: Sandbox,
}

impl Scratch {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Write a file, creating parent directories as needed. Overwrites
    /// an existing file.
    pub fn create_file(&self, path: &str, content: &str) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_err("create parent of", path))?;
        }
        fs::write(&full, content).map_err(io_err("write", path))?;
        tracing::debug!(path, bytes = content.len(), "created scratch file");
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<String, ScratchError> {
        let full = self.sandbox.resolve(path)?;
        fs::read_to_string(&full).map_err(io_err("read", path))
    }

    pub fn delete_file(&self, path: &str) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        fs::remove_file(&full).map_err(io_err("delete", path))
    }

    /// Apply a unified diff to an existing file.
    pub fn modify_file(&self, path: &str, diff: &str) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        let original = fs::read_to_string(&full).map_err(io_err("read", path))?;
        let patch =
            diffy::Patch::from_str(diff).map_err(|e| ScratchError::PatchInvalid(e.to_string()))?;
        let patched = diffy::apply(&original, &patch).map_err(|e| ScratchError::PatchFailed {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        fs::write(&full, patched).map_err(io_err("write", path))
    }

    /// Replace every occurrence of `search` in a file. Erroring when the
    /// text is absent makes a stale replacement visible to the caller
    /// instead of silently doing nothing.
    pub fn search_replace(
        &self,
        path: &str,
        search: &str,
        replace: &str,
    ) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        let original = fs::read_to_string(&full).map_err(io_err("read", path))?;
        if !original.contains(search) {
            return Err(ScratchError::SearchNotFound {
                path: path.to_string(),
            });
        }
        let updated = original.replace(search, replace);
        fs::write(&full, updated).map_err(io_err("write", path))
    }

    /// List immediate entries of a directory, one per line, sorted by
    /// name. Directories carry a trailing slash.
    pub fn list_directory(&self, path: &str) -> Result<String, ScratchError> {
        let full = self.sandbox.resolve(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&full).map_err(io_err("list", path))? {
            let entry = entry.map_err(io_err("list", path))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .map_err(io_err("list", path))?
                .is_dir();
            if is_dir {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        let mut listing = String::new();
        for name in names {
            listing.push_str(&name);
            listing.push('\n');
        }
        Ok(listing)
    }

    pub fn create_directory(&self, path: &str) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        fs::create_dir_all(&full).map_err(io_err("create directory", path))
    }

    /// Remove an empty directory. Refuses non-empty directories.
    pub fn remove_directory(&self, path: &str) -> Result<(), ScratchError> {
        let full = self.sandbox.resolve(path)?;
        fs::remove_dir(&full).map_err(io_err("remove directory", path))
    }

    /// Snapshot a single resource's content into a scratch file.
    pub fn copy_resource(
        &self,
        resources: &ResourceSet,
        uri: &str,
        dest: &str,
    ) -> Result<(), ScratchError> {
        let content = resources
            .content_of(uri)
            .ok_or_else(|| ScratchError::ResourceNotFound {
                uri: uri.to_string(),
            })?;
        self.create_file(dest, &content)
    }

    /// Snapshot every resource under a URI prefix into a scratch
    /// directory, preserving the URI structure below the prefix.
    /// Returns the number of files written.
    pub fn copy_resource_tree(
        &self,
        resources: &ResourceSet,
        prefix: &str,
        dest_dir: &str,
    ) -> Result<usize, ScratchError> {
        let matching = resources.select_tree(prefix);
        if matching.is_empty() {
            return Err(ScratchError::NoMatchingResources {
                prefix: prefix.to_string(),
            });
        }

        let mut copied = 0;
        for resource in matching {
            let mut relative = resource.uri[prefix.len()..]
                .trim_start_matches('/')
                .to_string();
            if relative.is_empty() {
                // Exact prefix match: fall back to the last URI segment.
                relative = resource
                    .uri
                    .rsplit('/')
                    .next()
                    .unwrap_or(&resource.uri)
                    .to_string();
            }
            let dest = format!("{}/{}", dest_dir.trim_end_matches('/'), relative);
            let content = resources
                .content_of(&resource.uri)
                .unwrap_or_default();
            self.create_file(&dest, &content)?;
            copied += 1;
        }
        tracing::debug!(prefix, dest_dir, copied, "copied resource tree");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Resource;
    use tempfile::tempdir;

    fn scratch(dir: &tempfile::TempDir) -> Scratch {
        Scratch::new(Sandbox::new(dir.path()).unwrap())
    }

    #[test]
    fn test_create_read_delete_file() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);

        sc.create_file("notes/today.txt", "hello").unwrap();
        assert_eq!(sc.read_file("notes/today.txt").unwrap(), "hello");

        sc.delete_file("notes/today.txt").unwrap();
        assert!(matches!(
            sc.read_file("notes/today.txt"),
            Err(ScratchError::Io { .. })
        ));
    }

    #[test]
    fn test_create_file_rejects_traversal() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        assert!(matches!(
            sc.create_file("../escape.txt", "x"),
            Err(ScratchError::Sandbox(_))
        ));
    }

    #[test]
    fn test_modify_file_applies_patch() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        sc.create_file("a.txt", "one\ntwo\nthree\n").unwrap();

        let diff = "--- a.txt\n+++ a.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+2\n three\n";
        sc.modify_file("a.txt", diff).unwrap();
        assert_eq!(sc.read_file("a.txt").unwrap(), "one\n2\nthree\n");
    }

    #[test]
    fn test_modify_file_rejects_garbage_patch() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        sc.create_file("a.txt", "content\n").unwrap();
        assert!(matches!(
            sc.modify_file("a.txt", "not a diff at all"),
            Err(ScratchError::PatchInvalid(_))
        ));
    }

    #[test]
    fn test_search_replace() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        sc.create_file("a.txt", "red fish, red boat").unwrap();

        sc.search_replace("a.txt", "red", "blue").unwrap();
        assert_eq!(sc.read_file("a.txt").unwrap(), "blue fish, blue boat");

        assert!(matches!(
            sc.search_replace("a.txt", "green", "blue"),
            Err(ScratchError::SearchNotFound { .. })
        ));
    }

    #[test]
    fn test_list_directory_sorted_with_dir_markers() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        sc.create_file("zeta.txt", "").unwrap();
        sc.create_file("alpha.txt", "").unwrap();
        sc.create_directory("middle").unwrap();

        let listing = sc.list_directory("").unwrap();
        assert_eq!(listing, "alpha.txt\nmiddle/\nzeta.txt\n");
    }

    #[test]
    fn test_remove_directory_refuses_non_empty() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        sc.create_directory("d").unwrap();
        sc.create_file("d/file.txt", "x").unwrap();

        assert!(matches!(
            sc.remove_directory("d"),
            Err(ScratchError::Io { .. })
        ));

        sc.delete_file("d/file.txt").unwrap();
        sc.remove_directory("d").unwrap();
    }

    fn resource_fixture() -> ResourceSet {
        ResourceSet::new(vec![
            Resource {
                uri: "app://docs".into(),
                description: "index".into(),
                content: "index content".into(),
                command: None,
            },
            Resource {
                uri: "app://docs/guide/install".into(),
                description: "install".into(),
                content: "install content".into(),
                command: None,
            },
        ])
    }

    #[test]
    fn test_copy_resource() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        let resources = resource_fixture();

        sc.copy_resource(&resources, "app://docs", "docs.txt").unwrap();
        assert_eq!(sc.read_file("docs.txt").unwrap(), "index content");

        assert!(matches!(
            sc.copy_resource(&resources, "app://missing", "x.txt"),
            Err(ScratchError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_copy_resource_tree_preserves_structure() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        let resources = resource_fixture();

        let copied = sc
            .copy_resource_tree(&resources, "app://docs", "snapshot")
            .unwrap();
        assert_eq!(copied, 2);
        assert_eq!(sc.read_file("snapshot/docs").unwrap(), "index content");
        assert_eq!(
            sc.read_file("snapshot/guide/install").unwrap(),
            "install content"
        );
    }

    #[test]
    fn test_copy_resource_tree_no_match() {
        let dir = tempdir().unwrap();
        let sc = scratch(&dir);
        let resources = resource_fixture();
        assert!(matches!(
            sc.copy_resource_tree(&resources, "app://other", "out"),
            Err(ScratchError::NoMatchingResources { .. })
        ));
    }
}
