//! Exchange Credentials Domain Types
//!
//! An API key pair plus the providers that hand one out.
//!
//! # Security Model
//!
//! - The private key is held in a zeroizing buffer and wiped on drop
//! - `Debug` never prints the private key and masks the public key
//! - Providers are read once per process; callers keep the returned value

use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroize;

/// Default environment variable holding the public API key.
pub const DEFAULT_KEY_VAR: &str = "KRAKEN_PUB";

/// Default environment variable holding the base64 private key.
pub const DEFAULT_SECRET_VAR: &str = "KRAKEN_SEC";

// =============================================================================
// Credential
// =============================================================================

/// API credential pair (in-memory only, never persisted).
///
/// This struct contains the plaintext secret and should:
/// - Never be logged (use [`Credential::masked_key`] in log fields)
/// - Never be serialized
/// - Be zeroized when dropped
#[derive(Clone)]
pub struct Credential {
    /// Public API key, sent verbatim in the `API-Key` header
    pub public_key: String,
    /// Base64-encoded private key, used only to sign
    pub private_key: zeroize::Zeroizing<String>,
}

impl Credential {
    /// Create a new credential pair.
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: zeroize::Zeroizing::new(private_key.into()),
        }
    }

    /// Public key with everything after the first four characters hidden.
    pub fn masked_key(&self) -> String {
        let visible: String = self.public_key.chars().take(4).collect();
        format!("{}****", visible)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("public_key", &self.masked_key())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl Zeroize for Credential {
    fn zeroize(&mut self) {
        self.public_key.zeroize();
        self.private_key.zeroize();
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Credential-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Provider has nothing to hand out
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    /// Credential source exists but is malformed
    #[error("Invalid credential: {0}")]
    Invalid(String),

    /// Credential file could not be read
    #[error("Failed to read credential file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Providers
// =============================================================================

/// Source of the exchange credential pair.
///
/// Implementations:
/// - `EnvCredentialProvider` - reads two environment variables
/// - `FileCredentialProvider` - reads a JSON secret payload from disk
/// - `StaticCredentialProvider` - fixed pair (tests)
pub trait CredentialProvider: Send + Sync {
    /// Hand out the credential pair.
    fn get_credential(&self) -> Result<Credential, CredentialError>;
}

/// Reads the credential from environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    key_var: String,
    secret_var: String,
}

impl EnvCredentialProvider {
    /// Use custom variable names.
    pub fn new(key_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            key_var: key_var.into(),
            secret_var: secret_var.into(),
        }
    }

    fn read(var: &str) -> Result<String, CredentialError> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            Ok(_) => Err(CredentialError::Unavailable(format!("{} is empty", var))),
            Err(_) => Err(CredentialError::Unavailable(format!("{} is not set", var))),
        }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_VAR, DEFAULT_SECRET_VAR)
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn get_credential(&self) -> Result<Credential, CredentialError> {
        let public_key = Self::read(&self.key_var)?;
        let private_key = Self::read(&self.secret_var)?;
        Ok(Credential::new(public_key, private_key))
    }
}

/// Reads the credential from a JSON document such as a downloaded
/// secret-manager payload: `{"<key_field>": "...", "<secret_field>": "..."}`.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
    key_field: String,
    secret_field: String,
}

impl FileCredentialProvider {
    /// Read `api_key` / `api_secret` fields from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fields(path, "api_key", "api_secret")
    }

    /// Read custom field names from `path`.
    pub fn with_fields(
        path: impl Into<PathBuf>,
        key_field: impl Into<String>,
        secret_field: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            key_field: key_field.into(),
            secret_field: secret_field.into(),
        }
    }

    /// Parse a payload already in memory.
    pub fn parse(&self, payload: &str) -> Result<Credential, CredentialError> {
        let doc: Value = serde_json::from_str(payload)
            .map_err(|e| CredentialError::Invalid(format!("payload is not JSON: {}", e)))?;

        let field = |name: &str| -> Result<String, CredentialError> {
            doc.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| CredentialError::Unavailable(format!("field '{}' missing", name)))
        };

        Ok(Credential::new(field(&self.key_field)?, field(&self.secret_field)?))
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn get_credential(&self) -> Result<Credential, CredentialError> {
        let payload = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CredentialError::Unavailable(format!("{} does not exist", self.path.display()))
            } else {
                CredentialError::Io {
                    path: self.path.display().to_string(),
                    source,
                }
            }
        })?;
        self.parse(&payload)
    }
}

/// Always returns the same pair.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Wrap a fixed credential.
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_credential(&self) -> Result<Credential, CredentialError> {
        Ok(self.credential.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let cred = Credential::new("ABCDEFGHIJ", "c2VjcmV0");
        let printed = format!("{:?}", cred);

        assert!(printed.contains("ABCD****"));
        assert!(!printed.contains("EFGHIJ"));
        assert!(!printed.contains("c2VjcmV0"));
    }

    #[test]
    fn test_masked_key_short_key() {
        let cred = Credential::new("AB", "x");
        assert_eq!(cred.masked_key(), "AB****");
    }

    #[test]
    fn test_credential_zeroize() {
        let mut cred = Credential::new("test_key", "test_secret");
        assert_eq!(*cred.private_key, "test_secret");

        cred.zeroize();

        assert!(cred.public_key.is_empty());
        assert!(cred.private_key.is_empty());
    }

    #[test]
    fn test_env_provider_reads_vars() {
        std::env::set_var("COINPILOT_TEST_PUB_A", "pub-a");
        std::env::set_var("COINPILOT_TEST_SEC_A", "c2VjLWE=");

        let provider = EnvCredentialProvider::new("COINPILOT_TEST_PUB_A", "COINPILOT_TEST_SEC_A");
        let cred = provider.get_credential().unwrap();

        assert_eq!(cred.public_key, "pub-a");
        assert_eq!(*cred.private_key, "c2VjLWE=");
    }

    #[test]
    fn test_env_provider_missing_var() {
        let provider =
            EnvCredentialProvider::new("COINPILOT_TEST_PUB_MISSING", "COINPILOT_TEST_SEC_MISSING");
        let err = provider.get_credential().unwrap_err();

        assert!(matches!(err, CredentialError::Unavailable(ref msg) if msg.contains("COINPILOT_TEST_PUB_MISSING")));
    }

    #[test]
    fn test_env_provider_empty_var() {
        std::env::set_var("COINPILOT_TEST_PUB_EMPTY", "key");
        std::env::set_var("COINPILOT_TEST_SEC_EMPTY", "  ");

        let provider = EnvCredentialProvider::new("COINPILOT_TEST_PUB_EMPTY", "COINPILOT_TEST_SEC_EMPTY");
        assert!(matches!(provider.get_credential(), Err(CredentialError::Unavailable(_))));
    }

    #[test]
    fn test_file_provider_parses_payload() {
        let provider = FileCredentialProvider::with_fields("unused.json", "kraken_pub", "kraken_sec");
        let cred = provider
            .parse(r#"{"kraken_pub": "abc", "kraken_sec": "ZGVm", "other": 1}"#)
            .unwrap();

        assert_eq!(cred.public_key, "abc");
        assert_eq!(*cred.private_key, "ZGVm");
    }

    #[test]
    fn test_file_provider_missing_field() {
        let provider = FileCredentialProvider::new("unused.json");
        let err = provider.parse(r#"{"api_key": "abc"}"#).unwrap_err();

        assert!(matches!(err, CredentialError::Unavailable(ref msg) if msg.contains("api_secret")));
    }

    #[test]
    fn test_file_provider_rejects_non_json() {
        let provider = FileCredentialProvider::new("unused.json");
        assert!(matches!(provider.parse("not json"), Err(CredentialError::Invalid(_))));
    }

    #[test]
    fn test_file_provider_missing_file_is_unavailable() {
        let provider = FileCredentialProvider::new("/nonexistent/coinpilot/creds.json");
        assert!(matches!(provider.get_credential(), Err(CredentialError::Unavailable(_))));
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticCredentialProvider::new(Credential::new("k", "s"));
        assert_eq!(provider.get_credential().unwrap().public_key, "k");
    }
}
