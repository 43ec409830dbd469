//! Purpose: Render range results as plain text, JSON lines, or one JSON array.
//! Exports: `OutputFormat`, `RenderOptions`, `Render`, `renderer`, `encode_text`.
//! Role: Output sink for the fetch loop, chosen once per invocation.
//! Invariants: Plain and JSON-lines output is written and flushed page by page.
//! Invariants: JSON array output is written once, by `finish`, or not at all.
//! Invariants: `binary` switches every key/value to standard base64 in all formats.
use crate::core::error::{Error, ErrorKind};
use crate::core::page::{KeyValue, Page};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `key: value` per line.
    #[default]
    Plain,
    /// A single JSON array of `{key, value}` objects.
    Json,
    /// One `{key, value}` JSON object per line.
    Jsonl,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub values_only: bool,
    pub binary: bool,
}

/// Page sink; `finish` is called once after the last page.
pub trait Render {
    fn consume(&mut self, page: Page) -> Result<(), Error>;
    fn finish(&mut self) -> Result<(), Error>;
}

pub fn renderer<'a, W>(options: RenderOptions, out: W) -> Box<dyn Render + 'a>
where
    W: Write + 'a,
{
    match options.format {
        OutputFormat::Plain => Box::new(PlainRenderer { out, options }),
        OutputFormat::Jsonl => Box::new(JsonLinesRenderer { out, options }),
        OutputFormat::Json => Box::new(JsonArrayRenderer {
            out,
            options,
            buffer: Some(Vec::new()),
        }),
    }
}

/// Text form of a key or value: base64 when `binary`, lossy UTF-8 otherwise.
pub fn encode_text(bytes: &[u8], binary: bool) -> Cow<'_, str> {
    if binary {
        Cow::Owned(STANDARD.encode(bytes))
    } else {
        String::from_utf8_lossy(bytes)
    }
}

#[derive(Serialize)]
struct RecordJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<Cow<'a, str>>,
    value: Cow<'a, str>,
}

impl<'a> RecordJson<'a> {
    fn from_record(record: &'a KeyValue, options: &RenderOptions) -> Self {
        Self {
            key: (!options.values_only).then(|| encode_text(&record.key, options.binary)),
            value: encode_text(&record.value, options.binary),
        }
    }
}

struct PlainRenderer<W> {
    out: W,
    options: RenderOptions,
}

impl<W: Write> PlainRenderer<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.options.binary {
            self.out.write_all(STANDARD.encode(bytes).as_bytes())
        } else {
            self.out.write_all(bytes)
        }
    }

    fn write_record(&mut self, record: &KeyValue) -> std::io::Result<()> {
        if !self.options.values_only {
            self.write_bytes(&record.key)?;
            self.out.write_all(b": ")?;
        }
        self.write_bytes(&record.value)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> Render for PlainRenderer<W> {
    fn consume(&mut self, page: Page) -> Result<(), Error> {
        for record in &page.records {
            self.write_record(record).map_err(write_error)?;
        }
        self.out.flush().map_err(write_error)
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.out.flush().map_err(write_error)
    }
}

struct JsonLinesRenderer<W> {
    out: W,
    options: RenderOptions,
}

impl<W: Write> Render for JsonLinesRenderer<W> {
    fn consume(&mut self, page: Page) -> Result<(), Error> {
        for record in &page.records {
            let line = RecordJson::from_record(record, &self.options);
            serde_json::to_writer(&mut self.out, &line).map_err(encode_error)?;
            self.out.write_all(b"\n").map_err(write_error)?;
        }
        self.out.flush().map_err(write_error)
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.out.flush().map_err(write_error)
    }
}

/// Holds the whole result set; nothing reaches `out` before `finish`.
struct JsonArrayRenderer<W> {
    out: W,
    options: RenderOptions,
    buffer: Option<Vec<KeyValue>>,
}

impl<W: Write> Render for JsonArrayRenderer<W> {
    fn consume(&mut self, page: Page) -> Result<(), Error> {
        match self.buffer.as_mut() {
            Some(buffer) => {
                buffer.extend(page.records);
                Ok(())
            }
            None => Err(Error::new(ErrorKind::Internal)
                .with_message("json output already flushed")),
        }
    }

    fn finish(&mut self) -> Result<(), Error> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(());
        };
        let records = buffer
            .iter()
            .map(|record| RecordJson::from_record(record, &self.options))
            .collect::<Vec<_>>();
        serde_json::to_writer(&mut self.out, &records).map_err(encode_error)?;
        self.out.write_all(b"\n").map_err(write_error)?;
        self.out.flush().map_err(write_error)
    }
}

fn write_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write output")
        .with_source(err)
}

fn encode_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to encode json output")
        .with_source(err)
}
