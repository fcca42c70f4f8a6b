//! Tree markup loader
//!
//! Every element found at [`XmlOptions::depth`] (0 is the document root, 1 its
//! children) becomes one record `{tag: value}`:
//!
//! - attributes become `<attr_prefix><name>` keys
//! - child elements become keys; repeated children collapse into an array
//! - an element with only text becomes that text (or `{"#text": ..}` when it
//!   also has attributes or children, or `simple_values_as_map` is set)
//! - an element with neither text, attributes nor children becomes `""`

use std::collections::HashSet;
use std::fmt::Display;
use std::io::{BufReader, Read};

use docimport_common::sanitize_name;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Number, Value};

use super::{LoaderTemplate, RecordLoader};
use crate::error::LoadError;
use crate::hooks::Record;

/// Characters trimmed from text nodes
const TEXT_NOISE: [char; 5] = ['\t', '\r', '\u{8}', '\n', ' '];

/// Element-to-record conversion settings
#[derive(Debug, Clone)]
pub struct XmlOptions {
    pub depth: usize,
    pub attr_prefix: String,
    pub lower_case: bool,
    /// Replace `-` with `_` in keys
    pub snake_case_keys: bool,
    /// Add a `_seq` index to each child, in document order
    pub include_tag_seq_num: bool,
    pub simple_values_as_map: bool,
    /// Cast text and attribute values to numbers and booleans
    pub cast: bool,
    /// With `cast`, also cast NaN and infinities. They have no JSON number
    /// representation and are imported as null.
    pub cast_nan_inf: bool,
    pub cast_to_int: bool,
    pub cast_to_float: bool,
    pub cast_to_bool: bool,
    /// Keys whose values are never cast
    pub skip_cast_tags: HashSet<String>,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            attr_prefix: "-".to_string(),
            lower_case: false,
            snake_case_keys: false,
            include_tag_seq_num: false,
            simple_values_as_map: false,
            cast: false,
            cast_nan_inf: false,
            cast_to_int: false,
            cast_to_float: true,
            cast_to_bool: true,
            skip_cast_tags: HashSet::new(),
        }
    }
}

/// Template producing [`XmlRecordLoader`]s
#[derive(Debug, Clone, Default)]
pub struct XmlLoader {
    options: XmlOptions,
}

impl XmlLoader {
    pub fn new(options: XmlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &XmlOptions {
        &self.options
    }
}

impl LoaderTemplate for XmlLoader {
    fn describe(&self) -> &str {
        "XML"
    }

    fn instantiate(&self, input: Box<dyn Read + Send>, sanitize: bool) -> Box<dyn RecordLoader> {
        Box::new(XmlRecordLoader {
            reader: Reader::from_reader(BufReader::new(input)),
            converter: Converter {
                options: self.options.clone(),
                sanitize,
            },
            buf: Vec::new(),
            level: 0,
            started: false,
            done: false,
        })
    }
}

type XmlReader = Reader<BufReader<Box<dyn Read + Send>>>;

fn xml_error(position: u64, error: impl Display) -> LoadError {
    LoadError::Xml {
        position,
        message: error.to_string(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

struct Converter {
    options: XmlOptions,
    sanitize: bool,
}

impl Converter {
    fn key(&self, raw: &[u8]) -> String {
        let mut key = String::from_utf8_lossy(raw).into_owned();
        if self.options.snake_case_keys {
            key = key.replace('-', "_");
        }
        if self.options.lower_case {
            key = key.to_lowercase();
        }
        key
    }

    fn element_key(&self, raw: &[u8]) -> String {
        let key = self.key(raw);
        if self.sanitize {
            sanitize_name(&key)
        } else {
            key
        }
    }

    fn cast(&self, text: &str, key: &str) -> Value {
        let opts = &self.options;
        if !opts.cast || opts.skip_cast_tags.contains(key) {
            return Value::String(text.to_string());
        }

        let lower = text.to_lowercase();
        let non_finite = matches!(
            lower.trim_start_matches(['+', '-']),
            "nan" | "inf" | "infinity"
        );
        if non_finite {
            return if opts.cast_nan_inf && opts.cast_to_float {
                Value::Null
            } else {
                Value::String(text.to_string())
            };
        }

        if opts.cast_to_int {
            if let Ok(n) = text.parse::<i64>() {
                return Value::Number(n.into());
            }
            if let Ok(n) = text.parse::<u64>() {
                return Value::Number(n.into());
            }
        }
        if opts.cast_to_float {
            if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        }
        if opts.cast_to_bool {
            if let Some(b) = parse_bool(text) {
                return Value::Bool(b);
            }
        }
        Value::String(text.to_string())
    }

    fn attributes(&self, start: &BytesStart<'_>, position: u64) -> Result<Record, LoadError> {
        let mut map = Record::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| xml_error(position, e))?;
            let key = format!(
                "{}{}",
                self.options.attr_prefix,
                self.key(attr.key.local_name().as_ref())
            );
            let value = attr.unescape_value().map_err(|e| xml_error(position, e))?;
            let value = self.cast(&value, &key);
            map.insert(key, value);
        }
        Ok(map)
    }

    fn push_child(&self, children: &mut Record, key: String, value: Value, seq: &mut u64) {
        let value = if self.options.include_tag_seq_num {
            let mut map = match value {
                Value::Object(map) => map,
                simple => {
                    let mut map = Record::new();
                    map.insert("#text".to_string(), simple);
                    map
                },
            };
            map.insert("_seq".to_string(), Value::from(*seq));
            *seq += 1;
            Value::Object(map)
        } else {
            value
        };

        match children.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            },
            None => {
                children.insert(key, value);
            },
        }
    }

    fn empty_element(&self, start: &BytesStart<'_>, position: u64) -> Result<(String, Value), LoadError> {
        let key = self.element_key(start.local_name().as_ref());
        let attrs = self.attributes(start, position)?;
        let value = if attrs.is_empty() {
            Value::String(String::new())
        } else {
            Value::Object(attrs)
        };
        Ok((key, value))
    }

    /// Convert the element opened by `start`, consuming events up to its end tag.
    fn element(&self, reader: &mut XmlReader, start: &BytesStart<'_>) -> Result<(String, Value), LoadError> {
        let key = self.element_key(start.local_name().as_ref());
        let mut children = self.attributes(start, reader.buffer_position() as u64)?;
        let mut text: Option<String> = None;
        let mut seq = 0;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(reader.buffer_position() as u64, e))?;

            match event {
                Event::Start(e) => {
                    let child = e.into_owned();
                    let (k, v) = self.element(reader, &child)?;
                    self.push_child(&mut children, k, v, &mut seq);
                },
                Event::Empty(e) => {
                    let child = e.into_owned();
                    let (k, v) = self.empty_element(&child, reader.buffer_position() as u64)?;
                    self.push_child(&mut children, k, v, &mut seq);
                },
                Event::Text(e) => {
                    let raw = e
                        .unescape()
                        .map_err(|err| xml_error(reader.buffer_position() as u64, err))?;
                    let trimmed = raw.trim_matches(&TEXT_NOISE[..]);
                    if !trimmed.is_empty() {
                        text = Some(trimmed.to_string());
                    }
                },
                Event::CData(e) => {
                    let raw = String::from_utf8_lossy(&e);
                    let trimmed = raw.trim_matches(&TEXT_NOISE[..]);
                    if !trimmed.is_empty() {
                        text = Some(trimmed.to_string());
                    }
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(xml_error(
                        reader.buffer_position() as u64,
                        format!("unexpected end of input inside <{}>", key),
                    ));
                },
                _ => {},
            }
            buf.clear();
        }

        let value = match text {
            Some(t) if children.is_empty() && !self.options.simple_values_as_map => self.cast(&t, &key),
            Some(t) => {
                let v = self.cast(&t, "#text");
                children.insert("#text".to_string(), v);
                Value::Object(children)
            },
            None if children.is_empty() => Value::String(String::new()),
            None => Value::Object(children),
        };
        Ok((key, value))
    }
}

/// One file being read as tree markup
pub struct XmlRecordLoader {
    reader: XmlReader,
    converter: Converter,
    buf: Vec<u8>,
    /// Number of currently open elements above the record depth
    level: usize,
    started: bool,
    done: bool,
}

impl XmlRecordLoader {
    fn single(entry: Result<(String, Value), LoadError>, done: &mut bool) -> Result<Option<Record>, LoadError> {
        match entry {
            Ok((key, value)) => {
                let mut record = Record::new();
                record.insert(key, value);
                Ok(Some(record))
            },
            Err(e) => {
                // The stream cannot be resynchronised after a syntax error.
                *done = true;
                Err(e)
            },
        }
    }
}

impl RecordLoader for XmlRecordLoader {
    fn start(&mut self) -> Result<(), LoadError> {
        self.started = true;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Record>, LoadError> {
        if !self.started {
            return Err(LoadError::NotStarted);
        }
        let depth = self.converter.options.depth;

        while !self.done {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    return Err(xml_error(self.reader.buffer_position() as u64, e));
                },
            };

            match event {
                Event::Start(e) if self.level == depth => {
                    let start = e.into_owned();
                    let entry = self.converter.element(&mut self.reader, &start);
                    return Self::single(entry, &mut self.done);
                },
                Event::Empty(e) if self.level == depth => {
                    let start = e.into_owned();
                    let entry = self
                        .converter
                        .empty_element(&start, self.reader.buffer_position() as u64);
                    return Self::single(entry, &mut self.done);
                },
                Event::Start(_) => self.level += 1,
                Event::End(_) => self.level = self.level.saturating_sub(1),
                Event::Eof => self.done = true,
                _ => {},
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog>
   <book id="bk101">
      <author>Gambardella, Matthew</author>
      <title>XML Developer's Guide</title>
      <price>44.95</price>
   </book>
   <book id="bk102">
      <author>Ralls, Kim</author>
      <title>Midnight Rain</title>
      <price>5.95</price>
   </book>
</catalog>"#;

    fn load_all(options: XmlOptions, data: &'static str) -> Vec<Value> {
        let mut l = XmlLoader::new(options).instantiate(Box::new(data.as_bytes()), false);
        l.start().unwrap();
        let mut out = Vec::new();
        while let Some(r) = l.load().unwrap() {
            out.push(Value::Object(r));
        }
        out
    }

    #[test]
    fn test_records_at_default_depth() {
        let records = load_all(XmlOptions::default(), CATALOG);
        assert_eq!(
            records,
            vec![
                json!({"book": {"-id": "bk101", "author": "Gambardella, Matthew",
                    "title": "XML Developer's Guide", "price": "44.95"}}),
                json!({"book": {"-id": "bk102", "author": "Ralls, Kim",
                    "title": "Midnight Rain", "price": "5.95"}}),
            ]
        );
    }

    #[test]
    fn test_root_depth_collects_repeated_children() {
        let options = XmlOptions {
            depth: 0,
            ..Default::default()
        };
        let records = load_all(options, CATALOG);
        assert_eq!(records.len(), 1);
        let books = records[0]["catalog"]["book"].as_array().unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[1]["-id"], json!("bk102"));
    }

    #[test]
    fn test_casting() {
        let options = XmlOptions {
            cast: true,
            cast_to_int: true,
            skip_cast_tags: HashSet::from(["code".to_string()]),
            ..Default::default()
        };
        let data = "<r><i><n>42</n><f>4.5</f><b>true</b><code>007</code><x>NaN</x></i></r>";
        let records = load_all(options, data);
        assert_eq!(
            records[0],
            json!({"i": {"n": 42, "f": 4.5, "b": true, "code": "007", "x": "NaN"}})
        );
    }

    #[test]
    fn test_text_with_attributes_and_empty_elements() {
        let options = XmlOptions {
            lower_case: true,
            snake_case_keys: true,
            ..Default::default()
        };
        let data = r#"<r><Item Unit-Code="kg">5 &amp; 6</Item><Gap/><Hole></Hole></r>"#;
        let records = load_all(options, data);
        assert_eq!(
            records,
            vec![
                json!({"item": {"-unit_code": "kg", "#text": "5 & 6"}}),
                json!({"gap": ""}),
                json!({"hole": ""}),
            ]
        );
    }

    #[test]
    fn test_sequence_numbers() {
        let options = XmlOptions {
            include_tag_seq_num: true,
            ..Default::default()
        };
        let data = "<r><e><a>x</a><b k=\"v\"/></e></r>";
        let records = load_all(options, data);
        assert_eq!(
            records[0],
            json!({"e": {"a": {"#text": "x", "_seq": 0}, "b": {"-k": "v", "_seq": 1}}})
        );
    }

    #[test]
    fn test_syntax_error_ends_input() {
        let data = "<r><e><a>1</a></e><e><a>2</b></e><e/></r>";
        let mut l = XmlLoader::default().instantiate(Box::new(data.as_bytes()), false);
        l.start().unwrap();

        assert!(l.load().unwrap().is_some());
        assert!(matches!(l.load(), Err(LoadError::Xml { .. })));
        assert!(l.load().unwrap().is_none());
    }
}
