//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. The format
//! commands share [`import_files`]; every command ends in [`execute`].

pub mod csv;
pub mod json;
pub mod run;
pub mod xml;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use docimport_common::{sanitize_name, valid_collection_name};
use docimport_ingest::loader::LoaderTemplate;
use docimport_ingest::provider::{GlobProvider, ListProvider, WalkProvider};
use docimport_ingest::sink::MemorySink;
use docimport_ingest::{Datasource, ImportOptions, Importer, TotalResult};
use tracing::{info, warn};

use crate::{ConnectionArgs, ImportArgs, InputArgs};

/// Import the command line inputs with one loader into one collection.
pub(crate) async fn import_files(
    connection: &ConnectionArgs,
    import: &ImportArgs,
    input: &InputArgs,
    loader: impl LoaderTemplate + 'static,
    extensions: &[&str],
) -> Result<()> {
    let mut options = import.options().with_loader(loader);
    if options.collection.as_deref().is_none_or(str::is_empty) {
        let first = input.inputs.first().context("No input given")?;
        options.collection = Some(derive_collection(first)?);
    }

    let sources = input_sources(input, extensions);
    execute(connection, import, options, sources, import.parallelism).await
}

/// One datasource per glob pattern or directory; plain files are grouped.
pub fn input_sources(input: &InputArgs, extensions: &[&str]) -> Vec<Datasource> {
    if input.glob {
        return input
            .inputs
            .iter()
            .map(|pattern| Datasource::new(pattern.clone(), GlobProvider::new(pattern.clone())))
            .collect();
    }

    let mut files = Vec::new();
    let mut sources = Vec::new();
    for raw in &input.inputs {
        let path = PathBuf::from(raw);
        if path.is_dir() {
            let walk = WalkProvider::new(path)
                .recursive(input.recursive)
                .with_extensions(extensions);
            sources.push(Datasource::new(raw.clone(), walk));
        } else {
            files.push(path);
        }
    }
    if !files.is_empty() {
        sources.insert(0, Datasource::new("files", ListProvider::new(files)));
    }
    sources
}

/// Collection name from a file or directory name: extension (and `.gz`)
/// dropped, then sanitized.
pub fn derive_collection(input: &str) -> Result<String> {
    let path = Path::new(input);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = if path.is_dir() {
        name
    } else {
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    };

    let collection = sanitize_name(stem);
    if collection.contains(['*', '?', '[', ']', '{', '}']) || !valid_collection_name(&collection) {
        bail!(
            "Cannot derive a collection name from '{}', use --collection",
            input
        );
    }
    Ok(collection)
}

/// Run the import against the database, or in memory for a dry run, and
/// print the report.
pub async fn execute(
    connection: &ConnectionArgs,
    import: &ImportArgs,
    options: ImportOptions,
    sources: Vec<Datasource>,
    parallelism: Option<usize>,
) -> Result<()> {
    let memory = import.dry_run.then(|| Arc::new(MemorySink::new()));

    let importer = match &memory {
        Some(sink) => {
            info!("Dry run, nothing is written to the database");
            let defaults = ImportOptions {
                database: connection.database.clone(),
                ..Default::default()
            };
            Importer::new(sink.clone(), ImportOptions::merge(&defaults, &options))
        },
        None => Importer::connect(&connection.to_connection(), options)
            .await
            .with_context(|| format!("Cannot reach {}:{}", connection.host, connection.port))?,
    };
    let importer = importer
        .with_parallelism(parallelism.unwrap_or(0))
        .with_progress(!import.no_progress);

    let token = importer.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            token.cancel();
        }
    });
    let total = importer.run(sources).await;
    interrupt.abort();
    let total = total?;

    print_report(&total);
    if let Some(sink) = memory {
        println!(
            "Dry run: {} documents in {} batches",
            sink.total_documents(),
            sink.batches().len()
        );
    }
    Ok(())
}

pub fn print_report(total: &TotalResult) {
    for source in &total.source_results {
        println!("{}", source.summary());
    }

    let errors: Vec<_> = total.errors().collect();
    if !errors.is_empty() {
        println!("Errors:");
        for (file, error) in errors {
            println!("  {}: {}", file.display(), error);
        }
    }

    println!("{}", total.summary());
}
