//! Purpose: Define the crate-wide error type and its HTTP status mapping.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Single failure shape for validation, decode, encode and config paths.
//! Invariants: `message` is client-safe text; paths and sources stay in separate fields.
//! Invariants: Kind to status mapping is stable; `TooLarge` decodes are the only 413.
//! Invariants: Kind to process exit code mapping is stable for the `faaskit` binary.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use axum::http::StatusCode;

use crate::json::DecodeDiagnostic;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Validation,
    Decode,
    Encode,
    Config,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    diagnostic: Option<DecodeDiagnostic>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            diagnostic: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The decode classification behind a `Decode` error, if any.
    pub fn diagnostic(&self) -> Option<&DecodeDiagnostic> {
        self.diagnostic.as_ref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: DecodeDiagnostic) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP status a handler should answer with when this error reaches the client.
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Validation => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Decode => match self.diagnostic {
                Some(DecodeDiagnostic::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            },
            ErrorKind::Encode | ErrorKind::Config | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Config => 2,
        ErrorKind::Validation => 3,
        ErrorKind::Decode => 4,
        ErrorKind::Encode => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use crate::json::DecodeDiagnostic;
    use axum::http::StatusCode;

    #[test]
    fn status_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::Validation, StatusCode::METHOD_NOT_ALLOWED),
            (ErrorKind::Decode, StatusCode::BAD_REQUEST),
            (ErrorKind::Encode, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::Config, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (kind, status) in cases {
            assert_eq!(Error::new(kind).status(), status);
        }
    }

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Config, 2),
            (ErrorKind::Validation, 3),
            (ErrorKind::Decode, 4),
            (ErrorKind::Encode, 5),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn oversized_body_maps_to_payload_too_large() {
        let err = Error::new(ErrorKind::Decode)
            .with_diagnostic(DecodeDiagnostic::TooLarge { limit: 16 });
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn display_keeps_path_out_of_message() {
        let err = Error::new(ErrorKind::Config)
            .with_message("failed to read secret")
            .with_path("/var/openfaas/secrets/db");
        assert_eq!(err.message(), Some("failed to read secret"));
        assert_eq!(
            err.to_string(),
            "Config: failed to read secret (path: /var/openfaas/secrets/db)"
        );
    }
}
