//! # Toolbox Server Library
//!
//! Exposes files to a client over HTTP under two disjoint namespaces:
//!
//! - **Aliases**: configured virtual paths mapped to individual files or
//!   directories anywhere under an alias root (tool binaries, payloads)
//! - **Served directory**: one operator-chosen directory tree for ad-hoc
//!   file transfer
//!
//! It also renders reverse-shell payload templates for a given host and
//! port.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HTTP router                           │
//! │   /shells/...        /debug/...          everything else     │
//! ├──────────────────┬──────────────────┬────────────────────────┤
//! │ PayloadGenerator │  beacon logging  │   FileServingEngine    │
//! │                  │                  │  ┌──────────────────┐  │
//! │                  │                  │  │   PathResolver   │  │
//! │                  │                  │  ├──────────────────┤  │
//! │                  │                  │  │ DirectoryLister  │  │
//! │                  │                  │  ├──────────────────┤  │
//! │                  │                  │  │  AliasRegistry   │  │
//! │                  │                  │  └──────────────────┘  │
//! └──────────────────┴──────────────────┴────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolbox::{Config, FileServingEngine, ServerResponse};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let engine = FileServingEngine::from_config(&config)?;
//!
//!     match engine.serve("tools/nc.exe")? {
//!         ServerResponse::FileResult { content, .. } => println!("{} bytes", content.len()),
//!         ServerResponse::DirectoryListing(listing) => println!("{:?}", listing.entries),
//!         ServerResponse::InvalidPath => println!("not found"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Alias registry, path resolution, listings, serving engine
//! - [`payloads`]: Payload template rendering
//! - [`http`]: Axum router and server loop

pub mod config;
pub mod files;
pub mod http;
pub mod payloads;

// Re-export config types for convenience
pub use config::{AliasConfig, Config, ConfigError};

// Re-export files types for convenience
pub use files::{
    AliasEntry, AliasKind, AliasRegistry, DirectoryEntry, DirectoryListing, FileServingEngine,
    ServeError, ServerResponse,
};

// Re-export HTTP types for convenience
pub use http::{router, AppState, HttpError};

// Re-export payload types for convenience
pub use payloads::{PayloadError, PayloadGenerator};
