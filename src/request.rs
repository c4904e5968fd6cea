//! Purpose: Resolve the caller's address for logging and rate decisions.
//! Exports: `client_address`, `NO_IP_FOUND`.
//! Role: Prefers the connection peer, then `X-Forwarded-For`, then a sentinel.
use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const NO_IP_FOUND: &str = "no-ip-found";

pub fn client_address(remote: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(remote) = remote {
        return remote.to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(NO_IP_FOUND)
        .to_string()
}
