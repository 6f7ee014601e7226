use crate::{models::backup::DEFAULT_CATEGORY, services::backup_service::DEFAULT_WORKERS};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};

pub const ENV_ROOT: &str = "OBJECT_STORE_ROOT";
pub const ENV_BUCKET: &str = "OBJECT_STORE_BUCKET";
pub const ENV_WORKERS: &str = "OBJECT_STORE_WORKERS";

const DEFAULT_ROOT: &str = "./cloud_simulated_storage";
const DEFAULT_BUCKET: &str = "anime-data-pipeline-prod";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub root: PathBuf,
    pub bucket: String,
    pub workers: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Local S3-style object store simulator")]
pub struct Args {
    /// Root directory of the simulated store (overrides OBJECT_STORE_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Bucket to operate on (overrides OBJECT_STORE_BUCKET)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Files copied concurrently during a backup (overrides OBJECT_STORE_WORKERS)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Copy files into `<category>/<timestamp>/<name>` keys and print the report
    Backup {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// First key segment for every stored file
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,

        /// Also store the report under `reports/`
        #[arg(long)]
        publish_report: bool,

        /// Re-check every stored file after the run
        #[arg(long)]
        verify: bool,
    },
    /// Store a single file under an explicit key
    Put { file: PathBuf, key: String },
    /// List objects under a prefix
    List {
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Show size, ETag and last-modified time of one object
    Head { key: String },
    /// Check that stored objects still match their metadata records
    Verify {
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Summarize bucket contents and operation history
    Stats,
    /// Print the audit log
    History {
        /// Only show failed operations
        #[arg(long)]
        failed_only: bool,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge parsed args with `lookup`, flags taking precedence.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<(Self, Command)> {
        // --- Environment fallback ---
        let env_root = lookup(ENV_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let env_bucket = lookup(ENV_BUCKET).unwrap_or_else(|| DEFAULT_BUCKET.into());
        let env_workers = match lookup(ENV_WORKERS) {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing {} value `{}`", ENV_WORKERS, value))?,
            None => DEFAULT_WORKERS,
        };

        // --- Merge ---
        let cfg = Self {
            root: args.root.unwrap_or(env_root),
            bucket: args.bucket.unwrap_or(env_bucket),
            workers: args.workers.unwrap_or(env_workers).max(1),
        };

        Ok((cfg, args.command))
    }
}
