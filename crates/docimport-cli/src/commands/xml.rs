//! `docimport xml` command implementation

use anyhow::Result;
use clap::Args;
use docimport_ingest::loader::{XmlLoader, XmlOptions};
use serde::Deserialize;

use super::import_files;
use crate::{ConnectionArgs, ImportArgs, InputArgs};

pub const EXTENSIONS: &[&str] = &["xml"];

/// XML conversion settings, as flags or as a manifest `xml:` section
#[derive(Args, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XmlArgs {
    /// Element depth of records; 0 is the document root
    #[arg(long, default_value_t = 1)]
    pub depth: usize,

    /// Prefix of attribute keys
    #[arg(long, default_value = "-")]
    pub attr_prefix: String,

    /// Lower-case element and attribute names
    #[arg(long)]
    pub lower_case: bool,

    /// Replace '-' with '_' in names
    #[arg(long)]
    pub snake_case: bool,

    /// Number child elements in document order with a `_seq` key
    #[arg(long)]
    pub seq: bool,

    /// Wrap text-only elements as {"#text": value}
    #[arg(long)]
    pub simple_values_as_map: bool,

    /// Cast values to numbers and booleans
    #[arg(long)]
    pub cast: bool,

    /// With --cast, also cast NaN and infinities (imported as null)
    #[arg(long)]
    pub cast_nan_inf: bool,

    /// With --cast, cast integral values to integers instead of floats
    #[arg(long)]
    pub cast_to_int: bool,

    /// With --cast, leave numbers as text
    #[arg(long)]
    pub no_cast_float: bool,

    /// With --cast, leave true/false as text
    #[arg(long)]
    pub no_cast_bool: bool,

    /// Keys whose values are never cast
    #[arg(long, value_delimiter = ',')]
    pub skip_cast_tags: Vec<String>,
}

impl Default for XmlArgs {
    fn default() -> Self {
        Self {
            depth: 1,
            attr_prefix: "-".to_string(),
            lower_case: false,
            snake_case: false,
            seq: false,
            simple_values_as_map: false,
            cast: false,
            cast_nan_inf: false,
            cast_to_int: false,
            no_cast_float: false,
            no_cast_bool: false,
            skip_cast_tags: Vec::new(),
        }
    }
}

impl XmlArgs {
    pub fn loader(&self) -> XmlLoader {
        XmlLoader::new(XmlOptions {
            depth: self.depth,
            attr_prefix: self.attr_prefix.clone(),
            lower_case: self.lower_case,
            snake_case_keys: self.snake_case,
            include_tag_seq_num: self.seq,
            simple_values_as_map: self.simple_values_as_map,
            cast: self.cast,
            cast_nan_inf: self.cast_nan_inf,
            cast_to_int: self.cast_to_int,
            cast_to_float: !self.no_cast_float,
            cast_to_bool: !self.no_cast_bool,
            skip_cast_tags: self.skip_cast_tags.iter().cloned().collect(),
        })
    }
}

/// Import XML files
pub async fn run(
    connection: &ConnectionArgs,
    import: &ImportArgs,
    input: &InputArgs,
    format: &XmlArgs,
) -> Result<()> {
    import_files(connection, import, input, format.loader(), EXTENSIONS).await
}
