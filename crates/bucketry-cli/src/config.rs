//! Command-line arguments.
//!
//! ```text
//! Cli
//! ├── gcs: GcsConfig     # bucket, endpoint, token, timeouts
//! └── command: Command   # ls | stat | put | rm | rm-all
//! ```
//!
//! Connection settings can be given as flags or as `GCS_*` environment
//! variables. Use `--help` to see all available options.

use std::path::PathBuf;

use bucketry_core::ops::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_PARALLELISM, MissingObjectPolicy};
use bucketry_gcs::GcsConfig;
use clap::{Args, Parser, Subcommand};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "bucketry")]
#[command(about = "List, upload and bulk-delete objects in a storage bucket")]
#[command(version)]
pub struct Cli {
    /// Storage connection configuration.
    #[clap(flatten)]
    pub gcs: GcsConfig,

    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads `.env` (with the `dotenv` feature) and parses the arguments.
    pub fn init() -> Self {
        load_dotenv();
        Self::parse()
    }
}

/// Loads environment variables from a `.env` file if present.
#[cfg(feature = "dotenv")]
fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Warning: failed to load .env file: {err}");
    }
}

#[cfg(not(feature = "dotenv"))]
fn load_dotenv() {}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List objects and common prefixes
    Ls(ListArgs),
    /// Print the metadata of one object
    Stat {
        /// Object name
        name: String,
    },
    /// Upload a local file as an object
    Put(PutArgs),
    /// Delete one object
    Rm {
        /// Object name
        name: String,

        /// Succeed when the object does not exist
        #[arg(long)]
        ignore_missing: bool,
    },
    /// Delete every object under a prefix using parallel workers
    RmAll(DeleteAllArgs),
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ls(_) => "ls",
            Self::Stat { .. } => "stat",
            Self::Put(_) => "put",
            Self::Rm { .. } => "rm",
            Self::RmAll(_) => "rm-all",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Only list names starting with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Fold names containing this delimiter after the prefix into prefixes
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Entries requested per page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Print one JSON document per page instead of text lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PutArgs {
    /// Object name
    pub name: String,

    /// Local file to upload
    pub path: PathBuf,

    /// MIME type recorded on the object
    #[arg(long)]
    pub content_type: Option<String>,

    /// Cache-Control metadata
    #[arg(long)]
    pub cache_control: Option<String>,

    /// Content-Language metadata
    #[arg(long)]
    pub content_language: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteAllArgs {
    /// Only delete names starting with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Number of concurrent delete workers
    #[arg(long, default_value_t = DEFAULT_PARALLELISM)]
    pub workers: usize,

    /// Names buffered between the lister and the workers
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Entries requested per listing page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Count objects that vanish before their delete instead of failing
    #[arg(long)]
    pub ignore_missing: bool,
}

impl DeleteAllArgs {
    /// Policy for objects deleted concurrently by someone else.
    pub fn missing_policy(&self) -> MissingObjectPolicy {
        if self.ignore_missing {
            MissingObjectPolicy::Ignore
        } else {
            MissingObjectPolicy::Fail
        }
    }
}
