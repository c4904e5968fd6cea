//! Purpose: Hold the process-wide handler settings as an immutable snapshot.
//! Exports: `HandlerConfig`, `OriginAllowList`, `DEFAULT_MAX_BODY_BYTES`.
//! Role: Built once at startup, then handed to `RequestValidator` and `JsonCodec`.
//! Invariants: The allow-list is ordered, exact-match, and never mutated after construction.
//! Invariants: `max_body_bytes` is strictly positive once `validate` passes.
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::json::JsonCodec;
use crate::validate::RequestValidator;

pub const DEFAULT_MAX_BODY_BYTES: u64 = 1_048_576;

pub const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";
pub const MAX_BODY_BYTES_ENV: &str = "MAX_BODY_BYTES";

/// Ordered set of origins that receive CORS headers.
///
/// Entries are compared by exact string equality. Clones share storage, so
/// every request can hold one without copying the list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OriginAllowList {
    origins: Arc<[String]>,
}

impl OriginAllowList {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let origins: Vec<String> = origins
            .into_iter()
            .map(Into::into)
            .filter(|origin| !origin.is_empty())
            .collect();
        Self {
            origins: origins.into(),
        }
    }

    /// Parses a comma-separated list, trimming whitespace around each entry.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(',').map(str::trim))
    }

    /// First entry equal to `origin`, in list order.
    pub fn find(&self, origin: &str) -> Option<&str> {
        self.origins
            .iter()
            .find(|candidate| candidate.as_str() == origin)
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandlerConfig {
    pub origins: OriginAllowList,
    pub max_body_bytes: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            origins: OriginAllowList::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HandlerConfig {
    pub fn with_origins(mut self, origins: OriginAllowList) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Reads `ALLOWED_ORIGINS` and `MAX_BODY_BYTES` from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ALLOWED_ORIGINS_ENV) {
            config.origins = OriginAllowList::parse(&raw);
        }
        if let Some(raw) = lookup(MAX_BODY_BYTES_ENV).filter(|raw| !raw.trim().is_empty()) {
            config.max_body_bytes = raw.trim().parse().map_err(|err| {
                Error::new(ErrorKind::Config)
                    .with_message(format!("{MAX_BODY_BYTES_ENV} must be a byte count"))
                    .with_hint("Use a positive integer like 1048576.")
                    .with_source(err)
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_body_bytes == 0 {
            return Err(Error::new(ErrorKind::Config)
                .with_message("max body bytes must be greater than zero")
                .with_hint("Use a positive value like 1048576."));
        }
        Ok(())
    }

    pub fn validator(&self) -> RequestValidator {
        RequestValidator::new(self.origins.clone())
    }

    pub fn codec(&self) -> JsonCodec {
        JsonCodec::new(self.max_body_bytes)
    }
}
