//! Import manifest handling (import.yml)
//!
//! A manifest lists the datasources of a run. Options under `options:` apply
//! to every source; the same keys on a source override them for that source.
//!
//! ```yaml
//! parallelism: 4
//! options:
//!   database: shop
//!   batch_size: 500
//! sources:
//!   - name: customers
//!     format: csv
//!     files: [exports/customers.csv]
//!     csv:
//!       delimiter: ";"
//!   - name: orders
//!     format: json
//!     glob: "exports/orders-*.jsonl.gz"
//!     collection: orders
//!     empty_collection: true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use docimport_ingest::loader::JsonLinesLoader;
use docimport_ingest::provider::{GlobProvider, ListProvider, WalkProvider};
use docimport_ingest::{Datasource, ImportOptions};
use serde::Deserialize;

use crate::commands::csv::{self, CsvArgs};
use crate::commands::json;
use crate::commands::xml::{self, XmlArgs};

/// Import manifest file
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Files imported concurrently (default: one per CPU)
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Options for every source
    #[serde(default)]
    pub options: OptionSpec,

    pub sources: Vec<SourceSpec>,
}

/// Import options as written in a manifest; absent keys stay unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OptionSpec {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub batch_size: Option<usize>,
    pub empty_collection: Option<bool>,
    pub sanitize: Option<bool>,
    pub fail_on_first_error: Option<bool>,
    pub collect_errors: Option<bool>,
    pub show_current_file: Option<bool>,
    pub individual_progress: Option<bool>,
}

impl OptionSpec {
    pub fn to_options(&self) -> ImportOptions {
        ImportOptions {
            database: self.database.clone(),
            collection: self.collection.clone(),
            insertion_batch_size: self.batch_size,
            empty_collection: self.empty_collection,
            sanitize: self.sanitize,
            fail_on_first_error: self.fail_on_first_error,
            collect_errors: self.collect_errors,
            show_current_file: self.show_current_file,
            individual_progress: self.individual_progress,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Xml,
    Json,
}

/// One datasource. Exactly one of `files`, `glob` and `dir` selects its files.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub name: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    pub format: Format,

    #[serde(default)]
    pub files: Vec<PathBuf>,

    #[serde(default)]
    pub glob: Option<String>,

    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// With `dir`, descend into subdirectories
    #[serde(default)]
    pub recursive: bool,

    /// With `dir`, extensions to import (default: the format's usual ones)
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub csv: CsvArgs,

    #[serde(default)]
    pub xml: XmlArgs,

    #[serde(flatten)]
    pub options: OptionSpec,
}

fn enabled_by_default() -> bool {
    true
}

impl SourceSpec {
    fn default_extensions(&self) -> &'static [&'static str] {
        match self.format {
            Format::Csv => csv::EXTENSIONS,
            Format::Xml => xml::EXTENSIONS,
            Format::Json => json::EXTENSIONS,
        }
    }

    /// Build the datasource: file provider, loader and option overrides.
    pub fn datasource(&self) -> Result<Datasource> {
        let mut options = self.options.to_options();
        options = match self.format {
            Format::Csv => options.with_loader(
                self.csv
                    .loader()
                    .with_context(|| format!("Source '{}'", self.name))?,
            ),
            Format::Xml => options.with_loader(self.xml.loader()),
            Format::Json => options.with_loader(JsonLinesLoader),
        };

        let source = match (self.files.is_empty(), &self.glob, &self.dir) {
            (false, None, None) => Datasource::new(&self.name, ListProvider::new(self.files.clone())),
            (true, Some(pattern), None) => {
                Datasource::new(&self.name, GlobProvider::new(pattern.clone()))
            },
            (true, None, Some(dir)) => {
                let walk = WalkProvider::new(dir).recursive(self.recursive);
                let walk = if self.extensions.is_empty() {
                    walk.with_extensions(self.default_extensions())
                } else {
                    walk.with_extensions(&self.extensions)
                };
                Datasource::new(&self.name, walk)
            },
            _ => bail!(
                "Source '{}' needs exactly one of 'files', 'glob' or 'dir'",
                self.name
            ),
        };

        Ok(source.with_options(options).with_enabled(self.enabled))
    }
}

impl Manifest {
    /// Load a manifest from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        if manifest.sources.is_empty() {
            bail!("No sources defined");
        }
        Ok(manifest)
    }

    /// Datasources in manifest order, disabled ones included
    pub fn datasources(&self) -> Result<Vec<Datasource>> {
        self.sources.iter().map(SourceSpec::datasource).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
parallelism: 2
options:
  database: shop
  batch_size: 500
  empty_collection: true
sources:
  - name: customers
    format: csv
    files: [customers.csv]
    csv:
      delimiter: ";"
  - name: orders
    format: json
    glob: "orders-*.jsonl"
    collection: orders
    empty_collection: false
  - name: catalog
    format: xml
    dir: catalog
    recursive: true
    enabled: false
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.parallelism, Some(2));
        assert_eq!(manifest.options.database.as_deref(), Some("shop"));
        assert_eq!(manifest.options.batch_size, Some(500));
        assert_eq!(manifest.sources.len(), 3);
        assert_eq!(manifest.sources[0].format, Format::Csv);
        assert_eq!(manifest.sources[0].csv.delimiter, ";");
        assert_eq!(manifest.sources[1].options.collection.as_deref(), Some("orders"));
        assert_eq!(manifest.sources[1].options.empty_collection, Some(false));
        assert!(!manifest.sources[2].enabled);
    }

    #[test]
    fn test_datasources_carry_overrides() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let sources = manifest.datasources().unwrap();

        assert_eq!(sources.len(), 3);
        assert!(sources[0].options().loader.is_some());
        assert_eq!(sources[0].options().collection, None);
        assert_eq!(sources[1].options().empty_collection, Some(false));
        assert!(!sources[2].is_enabled());

        let global = manifest.options.to_options();
        let resolved = sources[1].resolve(&global);
        assert_eq!(resolved.database.as_deref(), Some("shop"));
        assert_eq!(resolved.batch_size, 500);
        assert!(!resolved.empty_collection);
    }

    #[test]
    fn test_source_needs_one_file_selector() {
        let manifest = Manifest::parse(
            "sources:\n  - name: both\n    format: json\n    files: [a.json]\n    glob: '*.json'\n",
        )
        .unwrap();
        assert!(manifest.datasources().is_err());

        let manifest = Manifest::parse("sources:\n  - name: none\n    format: json\n").unwrap();
        assert!(manifest.datasources().is_err());
    }

    #[test]
    fn test_empty_manifest_is_rejected() {
        assert!(Manifest::parse("sources: []").is_err());
        assert!(Manifest::parse("options: {}").is_err());
    }
}
