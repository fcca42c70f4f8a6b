//! Delimited text loader

use std::io::Read;

use ::csv::{ByteRecord, ReaderBuilder, Terminator};
use docimport_common::{sanitize_name, valid_field_name};
use serde_json::Value;

use super::{LoaderTemplate, RecordLoader};
use crate::error::LoadError;
use crate::hooks::Record;

/// Characters that in a header column almost certainly mean the wrong delimiter
const DELIMITER_CANDIDATES: [char; 6] = [';', ',', '|', '\t', '^', '~'];

/// Default marker for a null value, as written by database dumps
pub const DEFAULT_NULL_MARKER: &str = "\\N";

/// Delimited text settings
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Explicit field names; the file's first row is data unless `skip_header`
    pub fields: Option<Vec<String>>,
    /// Discard the first row when `fields` is given
    pub skip_header: bool,
    /// Lines end with a bare carriage return
    pub excel: bool,
    /// Values equal to this marker are imported as null
    pub null_marker: Option<String>,
    /// Allow rows whose field count differs from the header
    pub flexible: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            fields: None,
            skip_header: false,
            excel: false,
            null_marker: Some(DEFAULT_NULL_MARKER.to_string()),
            flexible: false,
        }
    }
}

/// Parse a delimiter argument.
///
/// Escapes such as `\t` are expanded unless `literal` is set. The result must
/// be a single byte.
pub fn parse_delimiter(value: &str, literal: bool) -> Result<u8, LoadError> {
    let expanded = if literal {
        value.to_string()
    } else {
        value
            .replace("\\t", "\t")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\\\", "\\")
    };

    match expanded.as_bytes() {
        [b] => Ok(*b),
        _ => Err(LoadError::Delimiter(value.to_string())),
    }
}

/// Split a comma separated field list, trimming blanks.
pub fn parse_fields(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

/// Template producing [`CsvRecordLoader`]s
#[derive(Debug, Clone, Default)]
pub struct CsvLoader {
    options: CsvOptions,
}

impl CsvLoader {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }
}

impl LoaderTemplate for CsvLoader {
    fn describe(&self) -> &str {
        "CSV"
    }

    fn instantiate(&self, input: Box<dyn Read + Send>, sanitize: bool) -> Box<dyn RecordLoader> {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true);
        if self.options.excel {
            builder.terminator(Terminator::Any(b'\r'));
        }

        Box::new(CsvRecordLoader {
            reader: builder.from_reader(input),
            options: self.options.clone(),
            sanitize,
            header: Vec::new(),
            row: ByteRecord::new(),
            started: false,
            done: false,
        })
    }
}

/// One file being read as delimited text
pub struct CsvRecordLoader {
    reader: ::csv::Reader<Box<dyn Read + Send>>,
    options: CsvOptions,
    sanitize: bool,
    header: Vec<String>,
    row: ByteRecord,
    started: bool,
    done: bool,
}

fn field_text(raw: &[u8]) -> String {
    if raw.contains(&0) {
        let stripped: Vec<u8> = raw.iter().copied().filter(|b| *b != 0).collect();
        String::from_utf8_lossy(&stripped).into_owned()
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

impl CsvRecordLoader {
    fn column_name(&self, index: usize, raw: &str) -> String {
        let name = raw.trim();
        let name = if self.sanitize || !valid_field_name(name) {
            sanitize_name(name)
        } else {
            name.to_string()
        };

        if name.is_empty() {
            format!("field_{}", index + 1)
        } else {
            name
        }
    }

    fn read_row(&mut self) -> Result<bool, LoadError> {
        match self.reader.read_byte_record(&mut self.row) {
            Ok(more) => Ok(more),
            Err(e) => {
                if e.is_io_error() {
                    self.done = true;
                }
                Err(e.into())
            },
        }
    }
}

impl RecordLoader for CsvRecordLoader {
    fn start(&mut self) -> Result<(), LoadError> {
        self.started = true;

        let raw: Vec<String> = match self.options.fields.clone() {
            Some(fields) => {
                if self.options.skip_header && !self.read_row()? {
                    self.done = true;
                }
                fields
            },
            None => {
                if !self.read_row()? {
                    self.done = true;
                    return Ok(());
                }
                self.row.iter().map(field_text).collect()
            },
        };

        if let Some(bad) = raw.iter().find(|c| c.contains(&DELIMITER_CANDIDATES[..])) {
            return Err(LoadError::HeaderDelimiter(bad.clone()));
        }

        self.header = raw
            .iter()
            .enumerate()
            .map(|(i, c)| self.column_name(i, c))
            .collect();
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Record>, LoadError> {
        if !self.started {
            return Err(LoadError::NotStarted);
        }
        if self.done || !self.read_row()? {
            self.done = true;
            return Ok(None);
        }

        if !self.options.flexible && self.row.len() != self.header.len() {
            return Err(LoadError::FieldCount {
                line: self.row.position().map(|p| p.line()).unwrap_or_default(),
                expected: self.header.len(),
                found: self.row.len(),
            });
        }

        let null = self.options.null_marker.as_deref();
        let record = self
            .header
            .iter()
            .zip(self.row.iter())
            .map(|(name, raw)| {
                let text = field_text(raw);
                let value = if Some(text.as_str()) == null {
                    Value::Null
                } else {
                    Value::String(text)
                };
                (name.clone(), value)
            })
            .collect();

        Ok(Some(record))
    }
}
