//! Request envelope: session metadata plus the ordered task list.
//!
//! The envelope is serialized as ASCII-only JSON (anything outside ASCII
//! is written as `\uXXXX` escapes, separators are `", "` and `": "`).
//! That text is then byte-escaped for the wire: every `\` is doubled and
//! DEL becomes `\x7f`. The application undoes that layer before parsing.
//! The escaped bytes are gzip-compressed and handed to the
//! [`Paginator`](crate::paginate::Paginator).

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};
use tracing::{Level, debug};

use crate::codec;
use crate::error::{Error, Result};
use crate::identity;

/// One opaque unit of server-side work. Key order is preserved.
pub type Task = Map<String, Value>;

/// Version of this client, sent as `ApiVersion`.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Oldest application version this client is written against.
pub const DEFAULT_EXPECTED_VERSION: &str = "1.6.0";

/// Turn a JSON value into a [`Task`]; only objects qualify.
pub fn task_from_value(value: Value) -> Result<Task> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Config(format!(
            "a task must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Envelope ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<'a> {
    auth_token: &'a str,
    api_version: &'a str,
    expected_version: &'a str,
    mac_address: &'a str,
    request_tasks: &'a [Task],
}

/// Builds request headers for one session.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    auth_token: String,
    expected_version: String,
    machine_id: &'static str,
}

impl EnvelopeBuilder {
    pub fn new(auth_token: impl Into<String>, expected_version: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            expected_version: expected_version.into(),
            machine_id: identity::machine_id(),
        }
    }

    pub fn expected_version(&self) -> &str {
        &self.expected_version
    }

    /// The envelope JSON, before wire escaping.
    pub fn to_json(&self, tasks: &[Task]) -> Result<Vec<u8>> {
        self.render(&self.auth_token, tasks)
    }

    /// The uncompressed header bytes exactly as sent.
    pub fn to_wire(&self, tasks: &[Task]) -> Result<Vec<u8>> {
        Ok(escape_wire(&self.to_json(tasks)?))
    }

    /// The compressed header for `tasks`.
    pub fn build(&self, tasks: &[Task]) -> Result<Vec<u8>> {
        let wire = self.to_wire(tasks)?;
        if tracing::enabled!(Level::DEBUG) {
            let redacted = self.render("<redacted>", tasks)?;
            debug!(
                tasks = tasks.len(),
                "request envelope: {}",
                String::from_utf8_lossy(&redacted)
            );
        }
        codec::compress(&wire)
    }

    fn render(&self, auth_token: &str, tasks: &[Task]) -> Result<Vec<u8>> {
        let envelope = Envelope {
            auth_token,
            api_version: API_VERSION,
            expected_version: &self.expected_version,
            mac_address: self.machine_id,
            request_tasks: tasks,
        };
        to_ascii_json(&envelope)
    }
}

impl std::fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeBuilder")
            .field("expected_version", &self.expected_version)
            .field("machine_id", &self.machine_id)
            .finish_non_exhaustive()
    }
}

// ── ASCII JSON ───────────────────────────────────────────────────

/// JSON with `", "` / `": "` separators that escapes every non-ASCII
/// character.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
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

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (at, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..at])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = at + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

fn to_ascii_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut serializer = Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

// ── Wire escaping ────────────────────────────────────────────────

/// Byte-escape ASCII JSON for the wire.
///
/// Input is expected to be ASCII. Printable bytes pass through, `\` is
/// doubled, and everything else is written as `\t`, `\n`, `\r` or
/// `\xNN`.
pub fn escape_wire(json: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(json.len() + json.len() / 8);
    for &byte in json {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x20..=0x7e => out.push(byte),
            other => out.extend_from_slice(format!("\\x{other:02x}").as_bytes()),
        }
    }
    out
}

/// Reverse [`escape_wire`], as the receiving application does.
pub fn unescape_wire(wire: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(wire.len());
    let mut bytes = wire.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b't') => out.push(b'\t'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b'x') => {
                let hex = [bytes.next(), bytes.next()];
                let value = match hex {
                    [Some(hi), Some(lo)] => std::str::from_utf8(&[hi, lo])
                        .ok()
                        .and_then(|h| u8::from_str_radix(h, 16).ok()),
                    _ => None,
                };
                out.push(value.ok_or_else(|| Error::Codec("bad \\x escape in header".into()))?);
            }
            _ => return Err(Error::Codec("bad escape in header".into())),
        }
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────
