//! `docimport csv` command implementation

use anyhow::{Context, Result};
use clap::Args;
use docimport_ingest::loader::csv::{parse_delimiter, parse_fields, DEFAULT_NULL_MARKER};
use docimport_ingest::loader::{CsvLoader, CsvOptions};
use serde::Deserialize;

use super::import_files;
use crate::{ConnectionArgs, ImportArgs, InputArgs};

/// Extensions picked up when walking a directory
pub const EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Delimited text settings, as flags or as a manifest `csv:` section
#[derive(Args, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvArgs {
    /// Field delimiter; escapes such as \t are expanded
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// Use the delimiter exactly as given, without expanding escapes
    #[arg(long)]
    pub literal_delimiter: bool,

    /// Comma separated field names; the first row is then data
    #[arg(long)]
    pub fields: Option<String>,

    /// With --fields, discard the first row
    #[arg(long)]
    pub skip_header: bool,

    /// Rows end with a bare carriage return
    #[arg(long)]
    pub excel: bool,

    /// Values imported as null; empty disables
    #[arg(long, default_value = DEFAULT_NULL_MARKER)]
    pub null_marker: String,

    /// Accept rows with more or fewer fields than the header
    #[arg(long)]
    pub flexible: bool,
}

impl Default for CsvArgs {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            literal_delimiter: false,
            fields: None,
            skip_header: false,
            excel: false,
            null_marker: DEFAULT_NULL_MARKER.to_string(),
            flexible: false,
        }
    }
}

impl CsvArgs {
    pub fn loader(&self) -> Result<CsvLoader> {
        let delimiter = parse_delimiter(&self.delimiter, self.literal_delimiter)
            .context("Invalid --delimiter")?;

        Ok(CsvLoader::new(CsvOptions {
            delimiter,
            fields: self.fields.as_deref().map(parse_fields),
            skip_header: self.skip_header,
            excel: self.excel,
            null_marker: Some(self.null_marker.clone()).filter(|m| !m.is_empty()),
            flexible: self.flexible,
        }))
    }
}

/// Import delimited text files
pub async fn run(
    connection: &ConnectionArgs,
    import: &ImportArgs,
    input: &InputArgs,
    format: &CsvArgs,
) -> Result<()> {
    import_files(connection, import, input, format.loader()?, EXTENSIONS).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_from_flags() {
        let args = CsvArgs {
            delimiter: "\\t".to_string(),
            fields: Some("a, b,c".to_string()),
            null_marker: String::new(),
            ..Default::default()
        };
        let loader = args.loader().unwrap();
        let options = loader.options();
        assert_eq!(options.delimiter, b'\t');
        assert_eq!(options.fields.as_deref(), Some(&["a".to_string(), "b".to_string(), "c".to_string()][..]));
        assert_eq!(options.null_marker, None);
    }

    #[test]
    fn test_literal_delimiter() {
        let args = CsvArgs {
            delimiter: "\\t".to_string(),
            literal_delimiter: true,
            ..Default::default()
        };
        assert!(args.loader().is_err());
    }

    #[test]
    fn test_manifest_section_defaults() {
        let args: CsvArgs = serde_yaml::from_str("delimiter: ';'").unwrap();
        let loader = args.loader().unwrap();
        assert_eq!(loader.options().delimiter, b';');
        assert_eq!(loader.options().null_marker.as_deref(), Some(DEFAULT_NULL_MARKER));
    }
}
