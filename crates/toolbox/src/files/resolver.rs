//! Virtual path resolution with containment checks.
//!
//! A requested virtual path is resolved in three steps, first match wins:
//!
//! 1. exact alias match on `"/" + path`;
//! 2. namespace alias match on the first path segment, with the remainder
//!    resolved inside the alias's local path;
//! 3. fallback into the served directory.
//!
//! The candidate is canonicalized (symlinks and `..` resolved) before it is
//! compared against its boundary. A canonical path that does not exist, or
//! that is not the boundary or a descendant of it, is rejected before any
//! read happens.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::registry::AliasRegistry;

/// Reasons a virtual path fails to resolve.
///
/// Both variants mean "not found" to a client; the distinction exists for
/// logging only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The candidate path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    /// The canonical candidate escapes its containment boundary.
    #[error("path is outside allowed boundary: {0}")]
    OutsideBoundary(PathBuf),
}

/// Which lookup step produced a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    /// Resolved inside the served directory.
    Root,
    /// Resolved inside an alias, exactly or through its namespace.
    Alias {
        /// The alias's virtual path, with its leading `/`.
        virtual_path: String,
    },
}

/// A validated local path.
///
/// `local_path` is canonical, exists, and is `boundary` or a descendant of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical local path.
    pub local_path: PathBuf,
    /// Canonical containment boundary.
    pub boundary: PathBuf,
    /// Lookup step that matched.
    pub branch: Branch,
}

impl Resolution {
    /// Virtual path to display for `child`, a path under this resolution.
    ///
    /// Served-directory children map to `/<relative>`; alias children map to
    /// `<alias virtual path>/<relative>`. Returns `None` for paths outside
    /// the boundary.
    pub fn virtual_path_for(&self, child: &Path) -> Option<String> {
        let relative = child.strip_prefix(&self.boundary).ok()?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let prefix = match &self.branch {
            Branch::Root => "",
            Branch::Alias { virtual_path } => virtual_path.trim_end_matches('/'),
        };

        Some(format!("{}/{}", prefix, relative))
    }

    /// Whether this is the served directory itself.
    pub fn is_serve_root(&self) -> bool {
        self.branch == Branch::Root && self.local_path == self.boundary
    }
}

/// Resolves requested virtual paths against the alias registry and the
/// served directory.
///
/// Stateless; each call reads the filesystem as it is at call time.
pub struct PathResolver<'a> {
    registry: &'a AliasRegistry,
    serve_root: &'a Path,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver.
    ///
    /// `serve_root` should already be canonical; a root that does not exist
    /// makes every fallback lookup fail.
    pub fn new(registry: &'a AliasRegistry, serve_root: &'a Path) -> Self {
        Self {
            registry,
            serve_root,
        }
    }

    /// Resolve a requested virtual path (without its leading `/`).
    pub fn resolve(&self, requested: &str) -> Result<Resolution, ResolveError> {
        // Exact alias match
        if let Some(alias) = self.registry.lookup(&format!("/{}", requested)) {
            debug!(requested, alias = %alias.virtual_path, "Exact alias match");
            return contain(
                alias.local_path.clone(),
                &alias.local_path,
                Branch::Alias {
                    virtual_path: alias.virtual_path.clone(),
                },
                requested,
            );
        }

        // Namespace alias match
        let namespace = requested.split('/').next().unwrap_or("");
        if let Some(alias) = self.registry.lookup(&format!("/{}", namespace)) {
            let remainder = &requested[namespace.len()..];
            let remainder = remainder.strip_prefix('/').unwrap_or(remainder);
            debug!(requested, alias = %alias.virtual_path, remainder, "Namespace alias match");

            let candidate = if remainder.is_empty() || remainder == "/" {
                alias.local_path.clone()
            } else {
                alias.local_path.join(remainder)
            };

            return contain(
                candidate,
                &alias.local_path,
                Branch::Alias {
                    virtual_path: alias.virtual_path.clone(),
                },
                requested,
            );
        }

        // Served directory fallback
        debug!(requested, "Falling back to served directory");
        contain(
            self.serve_root.join(requested),
            self.serve_root,
            Branch::Root,
            requested,
        )
    }
}

/// Canonicalize `candidate` and check it stays within `boundary`.
fn contain(
    candidate: PathBuf,
    boundary: &Path,
    branch: Branch,
    requested: &str,
) -> Result<Resolution, ResolveError> {
    let canonical = fs::canonicalize(&candidate).map_err(|e| {
        debug!(requested, candidate = %candidate.display(), error = %e, "Candidate does not resolve");
        ResolveError::NotFound(candidate.clone())
    })?;

    // Component-wise, so `/srv/tools2` is not inside `/srv/tools`.
    if !canonical.starts_with(boundary) {
        warn!(
            requested,
            resolved = %canonical.display(),
            boundary = %boundary.display(),
            "Rejected path outside boundary"
        );
        return Err(ResolveError::OutsideBoundary(canonical));
    }

    Ok(Resolution {
        local_path: canonical,
        boundary: boundary.to_path_buf(),
        branch,
    })
}
