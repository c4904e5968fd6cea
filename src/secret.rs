//! Purpose: Read mounted function secrets and required environment variables.
//! Exports: `SecretStore`, `SECRET_MOUNT`, `get_secret`, `get_secret_string`, `get_env_or_error`.
//! Role: Startup/operational configuration lookups; failures are `ErrorKind::Config`.
//! Invariants: Secret names are single path components; they cannot escape the mount root.
//! Invariants: String secrets are trimmed; byte secrets are returned as stored.
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

pub const SECRET_MOUNT: &str = "/var/openfaas/secrets";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecretStore {
    root: PathBuf,
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new(SECRET_MOUNT)
    }
}

impl SecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>, Error> {
        let path = self.secret_path(name)?;
        std::fs::read(&path).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message(format!("failed to read secret {name:?}"))
                .with_path(path)
                .with_source(err)
        })
    }

    pub fn get_string(&self, name: &str) -> Result<String, Error> {
        let bytes = self.get(name)?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    fn secret_path(&self, name: &str) -> Result<PathBuf, Error> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::new(ErrorKind::Config)
                .with_message(format!("invalid secret name {name:?}"))
                .with_hint("Secret names must not contain path separators."));
        }
        Ok(self.root.join(name))
    }
}

pub fn get_secret(name: &str) -> Result<Vec<u8>, Error> {
    SecretStore::default().get(name)
}

pub fn get_secret_string(name: &str) -> Result<String, Error> {
    SecretStore::default().get_string(name)
}

pub fn get_env_or_error(name: &str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::new(ErrorKind::Config).with_message("environment variable not set")),
    }
}

#[cfg(test)]
mod tests {
    use super::{SECRET_MOUNT, SecretStore, get_env_or_error};
    use crate::core::error::ErrorKind;

    #[test]
    fn default_store_uses_openfaas_mount() {
        assert_eq!(SecretStore::default().root(), std::path::Path::new(SECRET_MOUNT));
    }

    #[test]
    fn reads_raw_and_trimmed_secrets() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("api-key"), b"  s3cret\n").expect("write secret");
        let store = SecretStore::new(temp.path());

        assert_eq!(store.get("api-key").expect("bytes"), b"  s3cret\n");
        assert_eq!(store.get_string("api-key").expect("string"), "s3cret");
    }

    #[test]
    fn missing_secret_is_config_error_with_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SecretStore::new(temp.path());

        let err = store.get("absent").expect_err("expected lookup failure");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.path(), Some(temp.path().join("absent").as_path()));
        assert!(!err.message().unwrap_or_default().contains('/'));
    }

    #[test]
    fn secret_names_cannot_escape_the_mount() {
        let store = SecretStore::new("/var/openfaas/secrets");
        for name in ["", ".", "..", "../etc/passwd", "nested/key", "win\\key"] {
            let err = store.get(name).expect_err("expected rejection");
            assert_eq!(err.kind(), ErrorKind::Config, "name {name:?}");
        }
    }

    #[test]
    fn unset_environment_variable_is_reported() {
        let err = get_env_or_error("FAASKIT_TEST_SURELY_UNSET_7F3C")
            .expect_err("expected missing variable");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.message(), Some("environment variable not set"));
    }

    #[test]
    fn set_environment_variable_is_returned_verbatim() {
        // Cargo exports this to every test process it runs.
        let value = get_env_or_error("CARGO_PKG_NAME").expect("set by cargo");
        assert_eq!(value, env!("CARGO_PKG_NAME"));
    }
}
