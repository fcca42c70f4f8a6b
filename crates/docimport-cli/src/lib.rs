//! docimport CLI library
//!
//! Command-line surface over `docimport-ingest`:
//!
//! - **Single format imports**: `docimport csv|xml|json [INPUTS...]` import files,
//!   directories or glob patterns into one collection
//! - **Manifest imports**: `docimport run import.yml` imports several datasources
//!   with their own formats and option overrides in one run
//!
//! Connection settings come from flags or the `MONGODB_*` environment
//! variables; `--dry-run` swaps the database for an in-memory sink.

pub mod commands;
pub mod manifest;

pub use manifest::Manifest;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use docimport_ingest::sink::MongoConnection;
use docimport_ingest::ImportOptions;

use commands::csv::CsvArgs;
use commands::xml::XmlArgs;

/// docimport - bulk document importer
#[derive(Parser, Debug)]
#[command(name = "docimport")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub import: ImportArgs,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import delimited text files
    Csv {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        format: CsvArgs,
    },

    /// Import XML files, one document per element at the record depth
    Xml {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        format: XmlArgs,
    },

    /// Import newline-delimited JSON files
    Json {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Import every datasource listed in a YAML manifest
    Run {
        /// Manifest file
        manifest: PathBuf,
    },
}

/// Database connection
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Server host
    #[arg(long, env = "MONGODB_HOST", default_value = "localhost", global = true)]
    pub host: String,

    /// Server port
    #[arg(long, env = "MONGODB_PORT", default_value_t = 27017, global = true)]
    pub port: u16,

    /// User name
    #[arg(short, long, env = "MONGODB_USER", global = true)]
    pub user: Option<String>,

    /// Password
    #[arg(long, env = "MONGODB_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Target database
    #[arg(short, long, env = "MONGODB_DATABASE", global = true)]
    pub database: Option<String>,

    /// Database holding the user's credentials
    #[arg(long, env = "MONGODB_AUTH_DATABASE", global = true)]
    pub auth_database: Option<String>,
}

impl ConnectionArgs {
    pub fn to_connection(&self) -> MongoConnection {
        MongoConnection {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            auth_database: self.auth_database.clone(),
        }
    }
}

/// Import behavior shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Target collection (default: derived from the first input's name)
    #[arg(short, long, env = "MONGODB_COLLECTION", global = true)]
    pub collection: Option<String>,

    /// Number of files imported concurrently (default: one per CPU)
    #[arg(short, long, global = true)]
    pub parallelism: Option<usize>,

    /// Records per insert
    #[arg(short, long, global = true)]
    pub batch_size: Option<usize>,

    /// Stop importing a file at its first bad record
    #[arg(long, global = true)]
    pub fail_on_errors: bool,

    /// Keep every record error for the final report
    #[arg(long, global = true)]
    pub collect_errors: bool,

    /// Empty target collections before importing
    #[arg(long, global = true)]
    pub empty: bool,

    /// Lower-case field names and replace characters the database rejects
    #[arg(long, global = true)]
    pub sanitize: bool,

    /// Show the file currently being imported
    #[arg(long, global = true)]
    pub show_current_file: bool,

    /// One progress bar per file
    #[arg(long, global = true)]
    pub individual_progress: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Import into memory instead of the database
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl ImportArgs {
    /// Options set on the command line; flags that were not given stay unset
    /// so lower layers can still decide.
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            collection: self.collection.clone(),
            insertion_batch_size: self.batch_size,
            fail_on_first_error: self.fail_on_errors.then_some(true),
            collect_errors: self.collect_errors.then_some(true),
            empty_collection: self.empty.then_some(true),
            sanitize: self.sanitize.then_some(true),
            show_current_file: self.show_current_file.then_some(true),
            individual_progress: self.individual_progress.then_some(true),
            ..Default::default()
        }
    }
}

/// Files to import
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Files or directories (glob patterns with --glob)
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Treat inputs as glob patterns
    #[arg(short, long)]
    pub glob: bool,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    pub recursive: bool,
}
