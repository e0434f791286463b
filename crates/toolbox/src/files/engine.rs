//! File serving engine: resolve, then read or list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{Config, ConfigError};

use super::listing::{DirectoryLister, DirectoryListing};
use super::registry::AliasRegistry;
use super::resolver::{PathResolver, Resolution, ResolveError};

/// Failures after a path has been resolved.
///
/// Resolution failures never show up here; they become
/// [`ServerResponse::InvalidPath`].
#[derive(Debug, Error)]
pub enum ServeError {
    /// Reading a resolved path failed (permissions, or it vanished).
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of serving a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerResponse {
    /// Nothing servable at this path, or the path escapes its boundary.
    InvalidPath,
    /// Full contents of a regular file.
    FileResult { local_path: PathBuf, content: Vec<u8> },
    /// Listing of a directory.
    DirectoryListing(DirectoryListing),
}

/// Serves virtual paths from an alias registry and a served directory.
///
/// Holds no mutable state; share it behind an `Arc` and swap the whole
/// engine to pick up a new registry.
#[derive(Debug)]
pub struct FileServingEngine {
    registry: AliasRegistry,
    serve_root: PathBuf,
}

impl FileServingEngine {
    /// Create an engine.
    ///
    /// The served directory is canonicalized when it exists. A missing one is
    /// kept as given, and every lookup that falls back to it is invalid.
    pub fn new(registry: AliasRegistry, serve_root: impl AsRef<Path>) -> Self {
        let serve_root = serve_root.as_ref();
        let serve_root =
            fs::canonicalize(serve_root).unwrap_or_else(|_| serve_root.to_path_buf());

        Self {
            registry,
            serve_root,
        }
    }

    /// Build an engine from configuration.
    ///
    /// Fails if any alias record is invalid; no partial registry is built.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let records = config.alias_records()?;
        let registry = AliasRegistry::load(&records, &config.files.alias_root)?;
        info!(
            aliases = registry.len(),
            serve_directory = %config.files.serve_directory.display(),
            "Loaded alias registry"
        );
        Ok(Self::new(registry, &config.files.serve_directory))
    }

    /// The alias registry in use.
    pub fn registry(&self) -> &AliasRegistry {
        &self.registry
    }

    /// The served directory.
    pub fn serve_root(&self) -> &Path {
        &self.serve_root
    }

    /// Resolve without reading.
    pub fn resolve(&self, requested: &str) -> Result<Resolution, ResolveError> {
        PathResolver::new(&self.registry, &self.serve_root).resolve(requested)
    }

    /// Serve a requested virtual path (without its leading `/`).
    pub fn serve(&self, requested: &str) -> Result<ServerResponse, ServeError> {
        let resolution = match self.resolve(requested) {
            Ok(r) => r,
            Err(e) => {
                debug!(requested, reason = %e, "Invalid path");
                return Ok(ServerResponse::InvalidPath);
            }
        };

        let metadata =
            fs::metadata(&resolution.local_path).map_err(|e| self.io_error(&resolution, e))?;

        if metadata.is_file() {
            let content =
                fs::read(&resolution.local_path).map_err(|e| self.io_error(&resolution, e))?;
            debug!(requested, path = %resolution.local_path.display(), bytes = content.len(), "Serving file");
            return Ok(ServerResponse::FileResult {
                local_path: resolution.local_path,
                content,
            });
        }

        if metadata.is_dir() {
            let listing = DirectoryLister::new(&self.registry)
                .list(&resolution, requested)
                .map_err(|e| self.io_error(&resolution, e))?;
            debug!(
                requested,
                entries = listing.entries.len(),
                custom_entries = listing.custom_entries.len(),
                "Serving directory listing"
            );
            return Ok(ServerResponse::DirectoryListing(listing));
        }

        // Sockets, devices, fifos
        debug!(requested, path = %resolution.local_path.display(), "Not a file or directory");
        Ok(ServerResponse::InvalidPath)
    }

    fn io_error(&self, resolution: &Resolution, source: io::Error) -> ServeError {
        error!(path = %resolution.local_path.display(), error = %source, "Failed to read resolved path");
        ServeError::Io {
            path: resolution.local_path.clone(),
            source,
        }
    }
}
