//! Newline-delimited JSON loader

use std::io::{BufRead, BufReader, Read};

use docimport_common::sanitize_name;
use serde_json::Value;

use super::{LoaderTemplate, RecordLoader};
use crate::error::LoadError;
use crate::hooks::Record;

/// One JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesLoader;

impl LoaderTemplate for JsonLinesLoader {
    fn describe(&self) -> &str {
        "JSON"
    }

    fn instantiate(&self, input: Box<dyn Read + Send>, sanitize: bool) -> Box<dyn RecordLoader> {
        Box::new(JsonLinesRecordLoader {
            reader: BufReader::new(input),
            sanitize,
            line: 0,
            buf: String::new(),
            done: false,
        })
    }
}

pub struct JsonLinesRecordLoader {
    reader: BufReader<Box<dyn Read + Send>>,
    sanitize: bool,
    line: u64,
    buf: String,
    done: bool,
}

/// Sanitize top-level keys only; nested documents are left as written.
fn sanitize_keys(record: Record) -> Record {
    record
        .into_iter()
        .map(|(k, v)| (sanitize_name(&k), v))
        .collect()
}

impl RecordLoader for JsonLinesRecordLoader {
    fn start(&mut self) -> Result<(), LoadError> {
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Record>, LoadError> {
        while !self.done {
            self.buf.clear();
            let n = match self.reader.read_line(&mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Err(e.into());
                },
            };
            if n == 0 {
                self.done = true;
                break;
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(text).map_err(|error| LoadError::Json {
                line: self.line,
                error,
            })?;

            return match value {
                Value::Object(record) if self.sanitize => Ok(Some(sanitize_keys(record))),
                Value::Object(record) => Ok(Some(record)),
                _ => Err(LoadError::NotAnObject { line: self.line }),
            };
        }
        Ok(None)
    }
}
