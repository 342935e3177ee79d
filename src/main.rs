//! vocscan command-line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vocscan::config::Config;
use vocscan::scanner::{Scanner, StdinInput};
use vocscan::storage::RegistryStore;

#[derive(Parser)]
#[command(name = "vocscan")]
#[command(about = "Klavogonki vocabulary scanner with interactive moderation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe vocabulary IDs and moderate the found ones
    Scan {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First ID to probe (default: resume past the registry's highest ID)
        #[arg(short, long)]
        start: Option<u64>,

        /// Number of concurrent prober workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Vocabulary page URL prefix
        #[arg(long)]
        base_url: Option<String>,

        /// Path of the approved-vocabularies registry file
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Per-probe timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the contents of the approved-vocabularies registry
    Registry {
        /// Path of the registry file
        #[arg(short, long, default_value = "valid_vocabularies.json")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose, &cli.log_format);

    match cli.command {
        Commands::Scan {
            config,
            start,
            workers,
            base_url,
            registry,
            timeout,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::from_env()?,
            };

            // CLI flags override file and environment settings
            if let Some(start) = start {
                config.scanner.start_id = Some(start);
            }
            if let Some(workers) = workers {
                config.scanner.workers = workers;
            }
            if let Some(base_url) = base_url {
                config.scanner.base_url = base_url;
            }
            if let Some(registry) = registry {
                config.registry.path = registry;
            }
            if let Some(timeout) = timeout {
                config.http.probe_timeout_secs = timeout;
            }

            let scanner = Scanner::new(config).context("Invalid configuration")?;
            let report = scanner
                .run(Arc::new(StdinInput::new()))
                .await
                .context("Scan failed")?;

            println!();
            println!("Scan summary");
            println!("  IDs probed:   {}", report.requests);
            println!("  found:        {}", report.found);
            println!("  absent:       {}", report.absent);
            println!("  errors:       {}", report.errors);
            println!("  approved:     {}", report.approved);
            println!("  skipped:      {}", report.skipped);
            println!("  registry now: {} IDs", report.registry_total);
            println!("  next scan resumes at ID {}", report.next_id);
        }

        Commands::Registry { path } => {
            let store = RegistryStore::new(&path);
            let registry = store
                .load()
                .with_context(|| format!("Failed to load registry: {}", path.display()))?;

            if registry.is_empty() {
                println!("Registry {} is empty", path.display());
            } else {
                println!("Registry {} ({} IDs)", path.display(), registry.len());
                for (category, ids) in registry.iter() {
                    println!("  {category}: {} IDs", ids.len());
                }
            }
        }
    }

    Ok(())
}

fn setup_tracing(verbose: bool, format: &str) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vocscan=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vocscan=info,warn"))
    };

    // Logs go to stderr so the moderation prompt owns stdout
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
