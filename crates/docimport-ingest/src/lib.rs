//! Bulk document import
//!
//! Reads records from file-backed datasources, runs them through a hook chain,
//! and writes them in batches to a document store.
//!
//! - [`provider`]: where files come from (explicit list, glob pattern, directory walk)
//! - [`loader`]: how files become records (CSV, XML, JSON lines)
//! - [`hooks`]: per-record transformations between loading and writing
//! - [`sink`]: where records go (MongoDB, or memory for dry runs)
//! - [`config`]: run-wide and per-source options
//! - [`Importer`]: the pipeline tying it together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docimport_ingest::{Datasource, ImportOptions, Importer};
//! use docimport_ingest::loader::CsvLoader;
//! use docimport_ingest::provider::GlobProvider;
//! use docimport_ingest::sink::MemorySink;
//!
//! # async fn example() -> docimport_ingest::Result<()> {
//! let options = ImportOptions::new()
//!     .with_database("data")
//!     .with_loader(CsvLoader::default());
//! let importer = Importer::new(Arc::new(MemorySink::new()), options).with_parallelism(4);
//!
//! let people = Datasource::new("people", GlobProvider::new("exports/people-*.csv"))
//!     .with_options(ImportOptions::new().with_collection("people"));
//! let total = importer.run(vec![people]).await?;
//! println!("{}", total.summary());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod datasource;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod result;
pub mod sink;

pub use config::{ImportOptions, ResolvedOptions, DEFAULT_BATCH_SIZE};
pub use datasource::Datasource;
pub use error::{HookError, ImportError, JobError, LoadError, ProviderError, Result, SinkError};
pub use hooks::Record;
pub use pipeline::Importer;
pub use result::{PartialResult, SourceResult, TotalResult};
