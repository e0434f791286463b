//! File serving: alias registry, path resolution, and directory listings.
//!
//! Requests name a virtual path. It is matched against configured aliases
//! first (exact, then by namespace) and otherwise resolved inside the
//! served directory.
//!
//! # Security
//!
//! Every candidate path is canonicalized before it is compared against its
//! containment boundary, so `..` segments, absolute remainders, and symlinks
//! cannot reach outside it. A path that escapes and a path that does not
//! exist produce the same [`ServerResponse::InvalidPath`].

pub mod engine;
pub mod listing;
pub mod registry;
pub mod resolver;

pub use engine::{FileServingEngine, ServeError, ServerResponse};
pub use listing::{DirectoryEntry, DirectoryLister, DirectoryListing};
pub use registry::{AliasEntry, AliasKind, AliasRegistry};
pub use resolver::{Branch, PathResolver, Resolution, ResolveError};
