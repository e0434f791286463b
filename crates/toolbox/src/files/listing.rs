//! Single-level directory listings with virtual paths.

use std::fs;
use std::io;

use tracing::debug;

use super::registry::{AliasKind, AliasRegistry};
use super::resolver::Resolution;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Virtual path a client requests to fetch this entry.
    pub virtual_path: String,
    /// Entry name (not full path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Whether the entry is a regular file.
    pub is_file: bool,
}

/// Contents of a resolved directory.
///
/// `entries` and `custom_entries` are each sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Immediate children of the directory.
    pub entries: Vec<DirectoryEntry>,
    /// Aliases surfaced alongside the served directory's top level.
    pub custom_entries: Vec<DirectoryEntry>,
    /// The virtual path as requested.
    pub requested_path: String,
}

/// Builds listings for resolved directories.
pub struct DirectoryLister<'a> {
    registry: &'a AliasRegistry,
}

impl<'a> DirectoryLister<'a> {
    /// Create a lister that surfaces aliases from `registry`.
    pub fn new(registry: &'a AliasRegistry) -> Self {
        Self { registry }
    }

    /// List the immediate children of `resolution.local_path`.
    ///
    /// Custom entries are only filled in for the top of the served
    /// directory; alias namespaces never nest other aliases.
    pub fn list(&self, resolution: &Resolution, requested: &str) -> io::Result<DirectoryListing> {
        let mut entries = Vec::new();

        for entry_result in fs::read_dir(&resolution.local_path)? {
            let entry = match entry_result {
                Ok(e) => e,
                Err(_) => continue, // Skip entries we can't read
            };

            // Names that are not UTF-8 cannot be requested back.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(name = ?raw, "Skipping non-UTF-8 entry");
                    continue;
                }
            };

            let path = entry.path();
            let virtual_path = match resolution.virtual_path_for(&path) {
                Some(p) => p,
                None => continue,
            };

            // Follows symlinks; a dangling link is neither.
            let (is_dir, is_file) = fs::metadata(&path)
                .map(|m| (m.is_dir(), m.is_file()))
                .unwrap_or((false, false));

            entries.push(DirectoryEntry {
                virtual_path,
                name,
                is_dir,
                is_file,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut custom_entries = Vec::new();
        if resolution.is_serve_root() {
            custom_entries = self
                .registry
                .entries()
                .map(|alias| DirectoryEntry {
                    virtual_path: alias.virtual_path.clone(),
                    name: alias.name().to_string(),
                    is_dir: alias.kind == AliasKind::Directory,
                    is_file: alias.kind == AliasKind::File,
                })
                .collect();
            custom_entries.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(DirectoryListing {
            entries,
            custom_entries,
            requested_path: requested.to_string(),
        })
    }
}
