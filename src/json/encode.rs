//! Purpose: Write JSON bodies (plain values or structured errors) into HTTP responses.
//! Exports: `Map`, `StructuredError`, `write_json`, `write_json_error`.
//! Role: Outbound half of the JSON codec; mutates a live `Response` in place.
//! Invariants: Serialization happens before any mutation; a failed encode leaves the response untouched.
//! Invariants: `StructuredError.code` is the status verbatim, never derived from `status`.
//! Notes: Each helper should be called at most once per request.
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// Ad-hoc JSON object for building response bodies.
pub type Map = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StructuredError {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl StructuredError {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            reason: None,
            code: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let status = err.status();
        Self {
            status: status.canonical_reason().unwrap_or("error").to_string(),
            reason: err.message().map(str::to_string),
            code: Some(status.as_u16()),
        }
    }
}

pub fn write_json<T>(
    response: &mut Response,
    status: StatusCode,
    data: &T,
    headers: Option<&HeaderMap>,
) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    let body = encode(data)?;

    if let Some(headers) = headers {
        for name in headers.keys() {
            response.headers_mut().remove(name);
            for value in headers.get_all(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
    }
    finish(response, status, body);
    Ok(())
}

/// Writes `error` with its own `code` as the status (500 when unset).
pub fn write_json_error(response: &mut Response, error: &StructuredError) -> Result<(), Error> {
    let status = match error.code {
        None => StatusCode::INTERNAL_SERVER_ERROR,
        Some(code) => StatusCode::from_u16(code).map_err(|err| {
            Error::new(ErrorKind::Encode)
                .with_message(format!("invalid status code {code}"))
                .with_source(err)
        })?,
    };
    let body = encode(error)?;
    finish(response, status, body);
    Ok(())
}

fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(data).map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message("failed to encode response body")
            .with_source(err)
    })
}

fn finish(response: &mut Response, status: StatusCode, body: Vec<u8>) {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *response.status_mut() = status;
    *response.body_mut() = Body::from(body);
}
