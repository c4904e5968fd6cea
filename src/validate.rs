//! Purpose: Gate inbound requests on method and cross-origin policy.
//! Exports: `RequestValidator`, `CorsOutcome`, `validate_method`.
//! Role: First step of every handler, before any body is read.
//! Invariants: Only `GET` and `POST` pass the method check (exact, case-sensitive).
//! Invariants: Origins match by exact equality; a missing `Origin` header never matches.
//! Invariants: Only a matched `OPTIONS` preflight is terminal (204); nothing else alters status.
//! Notes: A non-matching origin is let through without headers rather than rejected.
//! Notes: A missing `Origin` is not read as `""`; empty allow-list entries are dropped at load.
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;

use crate::config::OriginAllowList;
use crate::core::error::{Error, ErrorKind};

const ALLOWED_METHODS: &str = "GET,POST,OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization";
const PREFLIGHT_MAX_AGE: &str = "300";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CorsOutcome {
    /// A matched preflight was answered; the handler must return the response as is.
    Preflight,
    Continue,
}

pub fn validate_method(method: &Method) -> Result<(), Error> {
    if method == Method::GET || method == Method::POST {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Validation).with_message("method not allowed"))
}

#[derive(Clone, Debug, Default)]
pub struct RequestValidator {
    origins: OriginAllowList,
}

impl RequestValidator {
    pub fn new(origins: OriginAllowList) -> Self {
        Self { origins }
    }

    pub fn origins(&self) -> &OriginAllowList {
        &self.origins
    }

    pub fn validate_cors(
        &self,
        method: &Method,
        headers: &HeaderMap,
        response: &mut Response,
    ) -> CorsOutcome {
        let Some(origin) = self.matched_origin(headers) else {
            return CorsOutcome::Continue;
        };
        let out = response.headers_mut();
        out.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);

        if method != Method::OPTIONS {
            return CorsOutcome::Continue;
        }
        out.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        out.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        *response.status_mut() = StatusCode::NO_CONTENT;
        CorsOutcome::Preflight
    }

    /// CORS first, so a matched preflight short-circuits; then the method check.
    pub fn admit(
        &self,
        method: &Method,
        headers: &HeaderMap,
        response: &mut Response,
    ) -> Result<CorsOutcome, Error> {
        match self.validate_cors(method, headers, response) {
            CorsOutcome::Preflight => Ok(CorsOutcome::Preflight),
            CorsOutcome::Continue => validate_method(method).map(|()| CorsOutcome::Continue),
        }
    }

    fn matched_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        let value = headers.get(ORIGIN)?;
        let origin = value.to_str().ok()?;
        self.origins.find(origin).map(|_| value.clone())
    }
}
