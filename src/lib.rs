//! Purpose: Helper layer for HTTP function handlers running behind a FaaS gateway.
//! Exports: `core` (errors), `config`, `json` (strict codec), `validate` (method/CORS),
//! `background`, `secret`, `request`.
//! Role: Library backing the `faaskit` demo server and user handlers.
//! Invariants: Settings live in an immutable `HandlerConfig` snapshot; no hidden global state.
//! Invariants: Client-input failures carry client-safe messages; caller bugs panic instead.
pub mod background;
pub mod config;
pub mod core;
pub mod json;
pub mod request;
pub mod secret;
pub mod validate;

pub use background::background;
pub use config::{HandlerConfig, OriginAllowList};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use json::{
    DecodeDiagnostic, JsonCodec, Map, StructuredError, write_json, write_json_error,
};
pub use request::client_address;
pub use secret::{SecretStore, get_env_or_error, get_secret, get_secret_string};
pub use validate::{CorsOutcome, RequestValidator, validate_method};
