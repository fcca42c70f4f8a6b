//! `docimport json` command implementation

use anyhow::Result;
use docimport_ingest::loader::JsonLinesLoader;

use super::import_files;
use crate::{ConnectionArgs, ImportArgs, InputArgs};

pub const EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// Import newline-delimited JSON files
pub async fn run(connection: &ConnectionArgs, import: &ImportArgs, input: &InputArgs) -> Result<()> {
    import_files(connection, import, input, JsonLinesLoader, EXTENSIONS).await
}
