//! Document <-> wire-text codec.
//!
//! The wire format on both channels is UTF-8 JSON. Presentation (indentation
//! vs. compactness) is configurable but purely cosmetic; key order is always
//! preserved, so `decode(encode(d)) == d` for any well-formed document.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use strum_macros::{Display, EnumString};
use transport_plugin::message::Document;
use transport_plugin::plugin::TransportError;

/// How outbound documents are rendered. `Indented` uses three spaces, the
/// historical default of the gateway's other transports; `Plain` is a single
/// line with a space after each separator, readable but newline-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JsonFormat {
    #[default]
    Indented,
    Plain,
    Compact,
}

/// Compact layout with `", "` and `": "` separators instead of bare `,`/`:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn encode_with<F: Formatter>(document: &Document, formatter: F) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut ser)?;
    Ok(buf)
}

/// Render a document as wire text. Total for any `Document` in practice; the
/// error path exists so a failure is reported instead of crashing.
pub fn encode(document: &Document, format: JsonFormat) -> Result<String, TransportError> {
    let bytes = match format {
        JsonFormat::Indented => encode_with(document, PrettyFormatter::with_indent(b"   ")),
        JsonFormat::Plain => encode_with(document, SpacedFormatter),
        JsonFormat::Compact => serde_json::to_vec(document),
    }
    .map_err(|e| TransportError::Encode(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| TransportError::Encode(e.to_string()))
}

/// Parse inbound wire bytes into a document. Failure carries the offending
/// line and column so callers can log it without crashing.
pub fn decode(payload: &[u8]) -> Result<Document, TransportError> {
    serde_json::from_slice(payload).map_err(TransportError::from)
}
