//! `docimport run` command implementation
//!
//! Imports every source of a manifest in one run. Command line flags override
//! the manifest's global options; each source's own keys override both.

use std::path::Path;

use anyhow::Result;
use docimport_ingest::ImportOptions;
use tracing::debug;

use super::execute;
use crate::manifest::Manifest;
use crate::{ConnectionArgs, ImportArgs};

/// Import the sources of a manifest
pub async fn run(connection: &ConnectionArgs, import: &ImportArgs, manifest: &Path) -> Result<()> {
    let loaded = Manifest::load(manifest)?;
    let sources = loaded.datasources()?;
    debug!(manifest = %manifest.display(), sources = sources.len(), "Loaded manifest");

    let options = ImportOptions::merge(&loaded.options.to_options(), &import.options());
    let parallelism = import.parallelism.or(loaded.parallelism);
    execute(connection, import, options, sources, parallelism).await
}
