//! Streaming record reader for delimited source files
//!
//! Files are read incrementally: UTF-8 input is handed to the CSV parser as
//! is (minus a leading byte-order mark), any other encoding is transcoded to
//! UTF-8 on the fly.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::models::SourceResource;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const CHUNK_SIZE: usize = 8 * 1024;

/// Error type for reading a source file
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported delimiter {0:?}: only single-byte ASCII delimiters are supported")]
    UnsupportedDelimiter(char),
}

/// One data record: header name to raw field text.
///
/// Fields missing from a short record are absent. When a header repeats,
/// the later column wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based position among data records (the header is not counted)
    pub number: usize,
    pub fields: HashMap<String, String>,
}

impl RawRecord {
    /// Raw value of a column, `None` when the record does not have it
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Compact JSON rendering of the first `limit` columns, for error context
    pub fn head(&self, columns: &[&str], limit: usize) -> String {
        let mut snippet = serde_json::Map::new();
        for column in columns.iter().take(limit) {
            let value = match self.get(column) {
                Some(v) => serde_json::Value::String(v.to_string()),
                None => serde_json::Value::Null,
            };
            snippet.insert(column.to_string(), value);
        }
        let rendered = serde_json::Value::Object(snippet).to_string();
        if rendered.chars().count() > 300 {
            let cut: String = rendered.chars().take(300).collect();
            format!("{}...", cut)
        } else {
            rendered
        }
    }
}

/// Iterator over the records of a delimited file with a header row
pub struct RecordReader {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    number: usize,
}

impl RecordReader {
    /// Open a resolved file with the resource's delimiter and encoding
    pub fn open(path: &Path, resource: &SourceResource) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Self::from_reader(file, resource.delimiter, &resource.encoding)
    }

    /// Build a reader over any byte source
    pub fn from_reader<R: Read + Send + 'static>(
        reader: R,
        delimiter: char,
        encoding: &str,
    ) -> Result<Self, ReadError> {
        if !delimiter.is_ascii() {
            return Err(ReadError::UnsupportedDelimiter(delimiter));
        }
        let delimiter = delimiter as u8;
        let source = decoding_reader(reader, encoding)?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            headers,
            records: csv_reader.into_records(),
            number: 0,
        })
    }

    /// Header row as read from the file
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for RecordReader {
    type Item = Result<RawRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        self.number += 1;

        let fields = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();

        Some(Ok(RawRecord {
            number: self.number,
            fields,
        }))
    }
}

/// Wrap `reader` so that it yields UTF-8 bytes.
///
/// Labels are matched case-insensitively and `_` is accepted for `-`, so
/// `utf_8_sig`, `UTF-8` and `latin_1` all work.
fn decoding_reader<R: Read + Send + 'static>(
    reader: R,
    label: &str,
) -> Result<Box<dyn Read + Send>, ReadError> {
    let normalized = label.trim().to_lowercase().replace('_', "-");
    let normalized = match normalized.as_str() {
        "" | "utf-8-sig" | "utf8-sig" => "utf-8",
        "latin-1" => "latin1",
        other => other,
    };

    let encoding = Encoding::for_label(normalized.as_bytes())
        .ok_or_else(|| ReadError::UnsupportedEncoding(label.to_string()))?;

    if encoding == UTF_8 {
        let mut buffered = BufReader::new(reader);
        if buffered.fill_buf()?.starts_with(&UTF8_BOM) {
            buffered.consume(UTF8_BOM.len());
        }
        return Ok(Box::new(buffered));
    }

    Ok(Box::new(TranscodingReader::new(reader, encoding)))
}

/// Streams another encoding as UTF-8; malformed sequences become U+FFFD
struct TranscodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    output: Vec<u8>,
    output_pos: usize,
    output_len: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> TranscodingReader<R> {
    fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0; CHUNK_SIZE],
            input_pos: 0,
            input_len: 0,
            output: vec![0; CHUNK_SIZE * 3],
            output_pos: 0,
            output_len: 0,
            eof: false,
            finished: false,
        }
    }
}

impl<R: Read> Read for TranscodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_pos < self.output_len {
                let n = buf.len().min(self.output_len - self.output_pos);
                buf[..n].copy_from_slice(&self.output[self.output_pos..self.output_pos + n]);
                self.output_pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }

            if self.input_pos == self.input_len && !self.eof {
                let n = self.inner.read(&mut self.input)?;
                self.input_pos = 0;
                self.input_len = n;
                self.eof = n == 0;
            }

            let (result, read, written, _) = self.decoder.decode_to_utf8(
                &self.input[self.input_pos..self.input_len],
                &mut self.output,
                self.eof,
            );
            self.input_pos += read;
            self.output_pos = 0;
            self.output_len = written;

            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}
