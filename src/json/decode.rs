//! Purpose: Strict JSON request-body decoding with client-facing diagnostics.
//! Exports: `JsonCodec`, `DecodeDiagnostic`, `DecodeFailure`, `classify`.
//! Role: Single seam through which handler bodies are read and triaged.
//! Invariants: At most `max_body_bytes` are consumed; one more byte trips the ceiling.
//! Invariants: Keys the destination ignores are rejected, never silently dropped.
//! Invariants: Exactly one top-level JSON value per body (whitespace may trail).
//! Invariants: Each failure maps to exactly one `DecodeDiagnostic`, in `classify` order.
//! Notes: Structure is scanned before typing, so a malformed body never reports a type mismatch.
//! Notes: Triage works on `DecodeFailure`, so priority is testable without serde_json errors.
use std::fmt;
use std::io::{self, Read};

use axum::body::Body;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::error::Category;
use tokio_stream::StreamExt;

use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::core::error::{Error, ErrorKind};

/// Classification of a rejected request body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeDiagnostic {
    Syntax { offset: u64 },
    UnexpectedEnd,
    TypeMismatch { field: Option<String>, offset: u64 },
    EmptyBody,
    UnknownField { name: String },
    TooLarge { limit: u64 },
    MultipleValues,
    /// Caller bug, not bad input. Converting it into an error panics.
    InvalidTarget { detail: String },
    Other { message: String },
}

impl fmt::Display for DecodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeDiagnostic::Syntax { offset } => {
                write!(f, "body contains badly-formed JSON (at character {offset})")
            }
            DecodeDiagnostic::UnexpectedEnd => f.write_str("body contains badly-formed JSON"),
            DecodeDiagnostic::TypeMismatch {
                field: Some(field),
                ..
            } => write!(f, "body contains incorrect JSON type for field \"{field}\""),
            DecodeDiagnostic::TypeMismatch {
                field: None,
                offset,
            } => write!(f, "body contains incorrect JSON type (at character {offset})"),
            DecodeDiagnostic::EmptyBody => f.write_str("body must not be empty"),
            DecodeDiagnostic::UnknownField { name } => {
                write!(f, "body contains unknown key \"{name}\"")
            }
            DecodeDiagnostic::TooLarge { limit } => {
                write!(f, "body must not be larger than {limit} bytes")
            }
            DecodeDiagnostic::MultipleValues => {
                f.write_str("body must only contain a single JSON value")
            }
            DecodeDiagnostic::InvalidTarget { detail } => {
                write!(f, "invalid decode destination: {detail}")
            }
            DecodeDiagnostic::Other { message } => f.write_str(message),
        }
    }
}

impl DecodeDiagnostic {
    /// Turns the diagnostic into a `Decode` error carrying its message.
    ///
    /// # Panics
    ///
    /// Panics on `InvalidTarget`: a bad destination is a defect in the calling
    /// code and must not be reported to the client as a request problem.
    pub fn into_error(self) -> Error {
        if let DecodeDiagnostic::InvalidTarget { detail } = &self {
            panic!("invalid decode destination: {detail}");
        }
        Error::new(ErrorKind::Decode)
            .with_message(self.to_string())
            .with_diagnostic(self)
    }
}

/// Everything known about a failed decode, independent of the parser's error types.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecodeFailure {
    pub syntax: bool,
    /// The stream ended before a complete value was read.
    pub truncated: bool,
    pub type_mismatch: bool,
    /// Some non-whitespace byte was consumed before the failure.
    pub saw_content: bool,
    pub unknown_field: Option<String>,
    pub limit_exceeded: bool,
    pub invalid_target: bool,
    pub field: Option<String>,
    pub offset: u64,
    pub message: String,
}

/// Maps a raw failure to its diagnostic. Earlier checks win.
pub fn classify(failure: &DecodeFailure, limit: u64) -> DecodeDiagnostic {
    if failure.syntax {
        return DecodeDiagnostic::Syntax {
            offset: failure.offset,
        };
    }
    if failure.truncated && failure.saw_content {
        return DecodeDiagnostic::UnexpectedEnd;
    }
    if failure.type_mismatch {
        return DecodeDiagnostic::TypeMismatch {
            field: failure.field.clone(),
            offset: failure.offset,
        };
    }
    if failure.truncated {
        return DecodeDiagnostic::EmptyBody;
    }
    if let Some(name) = &failure.unknown_field {
        return DecodeDiagnostic::UnknownField { name: name.clone() };
    }
    if failure.limit_exceeded {
        return DecodeDiagnostic::TooLarge { limit };
    }
    if failure.invalid_target {
        return DecodeDiagnostic::InvalidTarget {
            detail: failure.message.clone(),
        };
    }
    DecodeDiagnostic::Other {
        message: failure.message.clone(),
    }
}

/// Decodes request bodies under a fixed byte ceiling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JsonCodec {
    max_body_bytes: u64,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl JsonCodec {
    pub fn new(max_body_bytes: u64) -> Self {
        Self { max_body_bytes }
    }

    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    pub fn decode<T, R>(&self, body: R) -> Result<T, Error>
    where
        T: DeserializeOwned,
        R: Read,
    {
        let mut reader = LimitedReader::new(body, self.max_body_bytes).recording();
        let mut de = serde_json::Deserializer::from_reader(&mut reader);
        // The whole value must be well formed before any field is typed.
        let scanned = IgnoredAny::deserialize(&mut de);
        // Anything but trailing whitespace means a second value was sent.
        let single_value = scanned.is_ok() && de.end().is_ok();
        drop(de);

        if let Err(err) = scanned {
            let failure = scan_failure(&err, &reader);
            return Err(classify(&failure, self.max_body_bytes).into_error());
        }

        let value = reader.take_recorded();
        let decoded = decode_strict(&value, self.max_body_bytes)?;
        if !single_value {
            return Err(DecodeDiagnostic::MultipleValues.into_error());
        }
        Ok(decoded)
    }

    pub fn decode_slice<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, Error> {
        self.decode(body)
    }

    /// Buffers a streamed axum body (at most one byte past the ceiling) and decodes it.
    pub async fn read_body<T: DeserializeOwned>(&self, body: Body) -> Result<T, Error> {
        let cap = usize::try_from(self.max_body_bytes.saturating_add(1)).unwrap_or(usize::MAX);
        let mut buffered = Vec::new();
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| {
                DecodeDiagnostic::Other {
                    message: err.to_string(),
                }
                .into_error()
                .with_source(err)
            })?;
            let room = cap - buffered.len();
            buffered.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if buffered.len() >= cap {
                break;
            }
        }
        self.decode(buffered.as_slice())
    }
}

/// Types an already well-formed value, rejecting keys the destination ignores.
fn decode_strict<T: DeserializeOwned>(value: &[u8], limit: u64) -> Result<T, Error> {
    let mut reader = LimitedReader::new(value, u64::MAX);
    let mut unknown_field: Option<String> = None;
    let mut on_ignored = |path: serde_ignored::Path<'_>| {
        if unknown_field.is_none() {
            unknown_field = Some(match path {
                serde_ignored::Path::Map { key, .. } => key,
                other => other.to_string(),
            });
        }
    };

    let mut de = serde_json::Deserializer::from_reader(&mut reader);
    let decoded: Result<T, _> = serde_path_to_error::deserialize(
        serde_ignored::Deserializer::new(&mut de, &mut on_ignored),
    );
    drop(de);

    let failure = match decoded {
        Ok(value) if unknown_field.is_none() => return Ok(value),
        Ok(_) => DecodeFailure {
            saw_content: reader.saw_content,
            unknown_field,
            offset: reader.consumed,
            ..DecodeFailure::default()
        },
        Err(err) => failure_from_json(err, &reader, unknown_field),
    };
    Err(classify(&failure, limit).into_error())
}

fn scan_failure<R>(err: &serde_json::Error, reader: &LimitedReader<R>) -> DecodeFailure {
    let category = err.classify();
    DecodeFailure {
        syntax: category == Category::Syntax,
        truncated: category == Category::Eof,
        saw_content: reader.saw_content,
        limit_exceeded: reader.limit_exceeded,
        offset: reader.consumed,
        message: err.to_string(),
        ..DecodeFailure::default()
    }
}

fn failure_from_json<R>(
    err: serde_path_to_error::Error<serde_json::Error>,
    reader: &LimitedReader<R>,
    unknown_field: Option<String>,
) -> DecodeFailure {
    let path = err.path().to_string();
    let inner = err.into_inner();
    let message = inner.to_string();
    let category = inner.classify();
    let data = category == Category::Data;

    DecodeFailure {
        syntax: category == Category::Syntax,
        truncated: category == Category::Eof,
        type_mismatch: data && is_type_mismatch(&message),
        saw_content: reader.saw_content,
        unknown_field: unknown_field.or_else(|| {
            if data {
                denied_field_name(&message)
            } else {
                None
            }
        }),
        limit_exceeded: reader.limit_exceeded,
        invalid_target: false,
        field: (path != ".").then_some(path),
        offset: reader.consumed,
        message,
    }
}

fn is_type_mismatch(message: &str) -> bool {
    ["invalid type:", "invalid value:", "invalid length"]
        .iter()
        .any(|prefix| message.starts_with(prefix))
}

// Types with `#[serde(deny_unknown_fields)]` fail inside serde with this shape.
fn denied_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split('`').next().map(str::to_string)
}

struct LimitedReader<R> {
    inner: R,
    remaining: u64,
    consumed: u64,
    saw_content: bool,
    limit_exceeded: bool,
    recorded: Option<Vec<u8>>,
}

impl<R> LimitedReader<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            consumed: 0,
            saw_content: false,
            limit_exceeded: false,
            recorded: None,
        }
    }

    /// Keeps a copy of every byte handed out.
    fn recording(mut self) -> Self {
        self.recorded = Some(Vec::new());
        self
    }

    fn take_recorded(&mut self) -> Vec<u8> {
        self.recorded.take().unwrap_or_default()
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut probe = [0u8; 1];
            if self.inner.read(&mut probe)? == 0 {
                return Ok(0);
            }
            self.limit_exceeded = true;
            return Err(io::Error::other("request body too large"));
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        self.consumed += n as u64;
        if let Some(recorded) = &mut self.recorded {
            recorded.extend_from_slice(&buf[..n]);
        }
        if !self.saw_content {
            self.saw_content = buf[..n]
                .iter()
                .any(|byte| !matches!(byte, b' ' | b'\t' | b'\n' | b'\r'));
        }
        Ok(n)
    }
}
