//! Purpose: JSON codec for function handlers: strict inbound decode, outbound encode.
//! Exports: `JsonCodec`, `DecodeDiagnostic`, `DecodeFailure`, `classify`, `StructuredError`,
//! `Map`, `write_json`, `write_json_error`.
//! Role: Only path through which handler payloads cross the HTTP boundary.
//! Invariants: Decode never accepts unknown keys, trailing values, or oversized bodies.

mod decode;
mod encode;

pub use decode::{DecodeDiagnostic, DecodeFailure, JsonCodec, classify};
pub use encode::{Map, StructuredError, write_json, write_json_error};
