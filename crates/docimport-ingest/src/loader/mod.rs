//! Record loaders
//!
//! A [`LoaderTemplate`] is the configured, shareable description of a file
//! format. For every file the pipeline asks it for a fresh [`RecordLoader`]
//! bound to that file's bytes, then drives it with `start`, repeated `load`
//! calls until `Ok(None)`, and `finish`.
//!
//! Loaders are synchronous and run on blocking threads.

use std::io::Read;

use crate::error::LoadError;
use crate::hooks::Record;

pub mod csv;
pub mod json;
pub mod reader;
pub mod xml;

pub use self::csv::{CsvLoader, CsvOptions};
pub use self::json::JsonLinesLoader;
pub use self::reader::{open_input, ProgressReader};
pub use self::xml::{XmlLoader, XmlOptions};

/// Stateful parser bound to one file
pub trait RecordLoader: Send {
    /// Read any preamble (e.g. a header row)
    fn start(&mut self) -> Result<(), LoadError>;

    /// Next record, or `Ok(None)` at end of input.
    ///
    /// After an `Err` the loader must either make progress on the next call
    /// or report end of input.
    fn load(&mut self) -> Result<Option<Record>, LoadError>;

    fn finish(&mut self) -> Result<(), LoadError> {
        Ok(())
    }
}

/// Factory for per-file loaders
pub trait LoaderTemplate: Send + Sync {
    /// Human label, e.g. "CSV"
    fn describe(&self) -> &str;

    fn instantiate(&self, input: Box<dyn Read + Send>, sanitize: bool) -> Box<dyn RecordLoader>;
}
