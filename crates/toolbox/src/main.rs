//! Toolbox Server
//!
//! Serves aliased tools, a working directory, and payload templates over HTTP.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use toolbox::config::{default_config_path, Config};
use toolbox::files::{AliasKind, FileServingEngine, ServerResponse};
use toolbox::http::{self, AppState};
use toolbox::payloads::PayloadGenerator;
use tracing_subscriber::EnvFilter;

/// Toolbox - serve tools, files, and payloads over HTTP.
#[derive(Parser, Debug)]
#[command(name = "toolbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind on
        #[arg(long)]
        host: Option<String>,

        /// Port to serve from
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve (overrides files.serve_directory)
        root_directory: Option<PathBuf>,
    },

    /// List configured aliases
    Aliases,

    /// Resolve a virtual path and show what would be served
    Resolve {
        /// Virtual path, e.g. `tools/nc.exe`
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();

    if let Commands::Serve {
        host,
        port,
        root_directory,
    } = &cli.command
    {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(dir) = root_directory {
            config.files.serve_directory = dir.clone();
        }
    }

    config.validate()?;

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("Using config file: {:?}", config_path);

    match cli.command {
        Commands::Serve { root_directory, .. } => {
            run_server(config, config_path, root_directory).await?;
        }
        Commands::Aliases => {
            let engine = FileServingEngine::from_config(&config)
                .context("Failed to load alias registry")?;

            if engine.registry().is_empty() {
                println!("No aliases configured.");
            } else {
                println!("Configured aliases:");
                for alias in engine.registry().entries() {
                    let kind = match alias.kind {
                        AliasKind::File => "file",
                        AliasKind::Directory => "directory",
                    };
                    println!(
                        "  {} -> {} ({})",
                        alias.virtual_path,
                        alias.local_path.display(),
                        kind
                    );
                }
            }
        }
        Commands::Resolve { path } => {
            let engine = FileServingEngine::from_config(&config)
                .context("Failed to load alias registry")?;
            let requested = path.trim_start_matches('/');

            match engine.serve(requested)? {
                ServerResponse::InvalidPath => {
                    println!("/{}: not found", requested);
                    std::process::exit(1);
                }
                ServerResponse::FileResult {
                    local_path,
                    content,
                } => {
                    println!(
                        "/{}: file {} ({} bytes)",
                        requested,
                        local_path.display(),
                        content.len()
                    );
                }
                ServerResponse::DirectoryListing(listing) => {
                    println!("/{}: directory", requested);
                    for entry in listing.entries.iter().chain(&listing.custom_entries) {
                        let suffix = if entry.is_dir { "/" } else { "" };
                        println!("  {}{}", entry.virtual_path, suffix);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Run the HTTP server until SIGINT or SIGTERM. SIGHUP reloads aliases.
async fn run_server(
    config: Config,
    config_path: PathBuf,
    serve_override: Option<PathBuf>,
) -> anyhow::Result<()> {
    validate_directory(&config.files.serve_directory)?;
    check_port_permissions(config.server.port)?;

    let engine =
        FileServingEngine::from_config(&config).context("Failed to load alias registry")?;
    let payloads = PayloadGenerator::from_config(&config.payloads)?;
    let state = AppState::new(engine, payloads);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;

    tracing::info!(
        "Serving {} (aliases from {})",
        config.files.serve_directory.display(),
        config.files.alias_root.display()
    );

    let shutdown = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;

    let signal_state = state.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT");
                    break;
                }
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    if let Err(e) = reload(&signal_state, &config_path, serve_override.as_deref()).await {
                        tracing::warn!("Reload failed, keeping current aliases: {:#}", e);
                    }
                }
            }
        }
        signal_shutdown.cancel();
    });

    http::serve(listener, state, shutdown).await
}

/// Re-read the config file and swap in a freshly built engine.
async fn reload(
    state: &AppState,
    config_path: &Path,
    serve_override: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;
    config.apply_env_overrides();
    if let Some(dir) = serve_override {
        config.files.serve_directory = dir.to_path_buf();
    }
    config.validate()?;
    state.reload(&config).await?;
    Ok(())
}

/// The served directory must exist and be a directory.
fn validate_directory(dir: &Path) -> anyhow::Result<()> {
    let resolved = std::fs::canonicalize(dir)
        .with_context(|| format!("'{}' is not a valid folder", dir.display()))?;
    if !resolved.is_dir() {
        anyhow::bail!("'{}' is not a valid folder", resolved.display());
    }
    Ok(())
}

/// Ports below 1024 need root.
fn check_port_permissions(port: u16) -> anyhow::Result<()> {
    if port < 1024 && !nix::unistd::geteuid().is_root() {
        anyhow::bail!("root permission required to bind to port '{}'", port);
    }
    Ok(())
}
