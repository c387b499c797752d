//! # Trust Configuration
//!
//! The issuer and verifier share one master secret. Every platform instance
//! signs with a key derived from it, so the secret itself never travels with
//! a token.
//!
//! ## Resolution order
//! 1. A secret file (trailing newline trimmed).
//! 2. The `CTF_MASTER_SECRET` environment variable.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use zeroize::{ZeroizeOnDrop, Zeroizing};

/// Environment variable carrying the master secret.
pub const MASTER_SECRET_ENV: &str = "CTF_MASTER_SECRET";

/// Errors from trust configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("master secret is empty")]
    EmptySecret,
    #[error("master secret not configured: set {var} or pass a secret file", var = MASTER_SECRET_ENV)]
    MissingSecret,
    #[error("{var} is not valid unicode", var = MASTER_SECRET_ENV)]
    NotUnicode,
}

/// The pre-shared master secret.
///
/// Redacted in `Debug` output and zeroed on drop.
#[derive(Clone)]
pub struct MasterSecret(Zeroizing<Vec<u8>>);

impl MasterSecret {
    /// Wraps a secret value. Empty secrets are rejected.
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self(Zeroizing::new(secret.into_bytes())))
    }

    /// Reads the secret from a file, trimming the trailing line ending.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::new(raw.trim_end_matches(['\r', '\n']))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

// The only field is `Zeroizing`.
impl ZeroizeOnDrop for MasterSecret {}

/// Process-wide, immutable trust parameters.
///
/// Cheap to clone; clones share the same secret allocation.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    master_secret: Arc<MasterSecret>,
}

impl TrustConfig {
    pub fn new(master_secret: MasterSecret) -> Self {
        Self {
            master_secret: Arc::new(master_secret),
        }
    }

    /// Resolves the master secret from the first configured source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSecret` when no source is configured.
    pub fn resolve(secret_file: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = match env::var(MASTER_SECRET_ENV) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => return Err(ConfigError::NotUnicode),
        };
        Self::resolve_from(secret_file, from_env)
    }

    fn resolve_from(
        secret_file: Option<&Path>,
        from_env: Option<String>,
    ) -> Result<Self, ConfigError> {
        let secret = if let Some(path) = secret_file {
            MasterSecret::from_file(path)?
        } else if let Some(value) = from_env {
            MasterSecret::new(value)?
        } else {
            return Err(ConfigError::MissingSecret);
        };
        Ok(Self::new(secret))
    }

    pub fn master_secret(&self) -> &MasterSecret {
        &self.master_secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(MasterSecret::new(""), Err(ConfigError::EmptySecret)));
    }

    #[test]
    fn test_secret_zeroized_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<MasterSecret>();

        let secret = MasterSecret::new("hunter2").unwrap();
        let copy = secret.clone();
        drop(secret);
        assert_eq!(copy.as_bytes(), b"hunter2");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secret = MasterSecret::new("hunter2").unwrap();
        let rendered = format!("{:?}", TrustConfig::new(secret));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_secret_file_trims_line_ending() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let secret = MasterSecret::from_file(file.path()).unwrap();
        assert_eq!(secret.as_bytes(), b"from-file");
    }

    #[test]
    fn test_file_wins_over_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from-file").unwrap();

        let trust = TrustConfig::resolve_from(Some(file.path()), Some("env".into())).unwrap();
        assert_eq!(trust.master_secret().as_bytes(), b"from-file");
    }

    #[test]
    fn test_env_fallback() {
        let trust = TrustConfig::resolve_from(None, Some("env".into())).unwrap();
        assert_eq!(trust.master_secret().as_bytes(), b"env");
    }

    #[test]
    fn test_missing_secret() {
        let err = TrustConfig::resolve_from(None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrustConfig::resolve_from(Some(&dir.path().join("absent")), None).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
