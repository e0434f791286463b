//! Alias registry mapping stable virtual paths to local files and directories.
//!
//! The registry is built once from configuration and never mutated. Every
//! local path is canonicalized and checked for existence at load time;
//! requests never re-validate it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{AliasConfig, ConfigError};

/// On-disk kind of an alias target, captured at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    /// The alias points at a regular file.
    File,
    /// The alias points at a directory; requests may descend into it.
    Directory,
}

/// A single registered alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Virtual path, always starting with `/`.
    pub virtual_path: String,
    /// Canonical local path.
    pub local_path: PathBuf,
    /// Kind of the local path.
    pub kind: AliasKind,
}

impl AliasEntry {
    /// Last segment of the virtual path, used as the display name.
    pub fn name(&self) -> &str {
        self.virtual_path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("")
    }
}

/// Immutable set of aliases keyed by virtual path.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    aliases: BTreeMap<String, AliasEntry>,
}

impl AliasRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from alias records.
    ///
    /// Each `local_path` is joined onto `alias_root` and canonicalized. The
    /// load is all-or-nothing: the first bad record aborts it.
    pub fn load(records: &[AliasConfig], alias_root: &Path) -> Result<Self, ConfigError> {
        let root = fs::canonicalize(alias_root)
            .map_err(|_| ConfigError::MissingLocalPath(alias_root.to_path_buf()))?;

        let mut aliases = BTreeMap::new();

        for record in records {
            let virtual_path = normalize_virtual_path(&record.server_path);
            if virtual_path == "/" {
                return Err(ConfigError::InvalidServerPath(record.server_path.clone()));
            }
            if aliases.contains_key(&virtual_path) {
                return Err(ConfigError::DuplicateAlias(virtual_path));
            }

            let joined = root.join(&record.local_path);
            let local_path =
                fs::canonicalize(&joined).map_err(|_| ConfigError::MissingLocalPath(joined))?;

            if !local_path.starts_with(&root) {
                return Err(ConfigError::AliasOutsideRoot(local_path));
            }

            let metadata = fs::metadata(&local_path)
                .map_err(|_| ConfigError::MissingLocalPath(local_path.clone()))?;
            let kind = if metadata.is_dir() {
                AliasKind::Directory
            } else if metadata.is_file() {
                AliasKind::File
            } else {
                return Err(ConfigError::UnsupportedAliasTarget(local_path));
            };

            debug!(virtual_path = %virtual_path, local_path = %local_path.display(), ?kind, "Registered alias");

            aliases.insert(
                virtual_path.clone(),
                AliasEntry {
                    virtual_path,
                    local_path,
                    kind,
                },
            );
        }

        Ok(Self { aliases })
    }

    /// Exact lookup by virtual path (including the leading `/`).
    pub fn lookup(&self, virtual_path: &str) -> Option<&AliasEntry> {
        self.aliases.get(virtual_path)
    }

    /// All aliases, ordered by virtual path.
    pub fn entries(&self) -> impl Iterator<Item = &AliasEntry> {
        self.aliases.values()
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether no aliases are registered.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Exactly one leading `/`, no trailing `/`.
fn normalize_virtual_path(server_path: &str) -> String {
    format!("/{}", server_path.trim_matches('/'))
}
