//! TLS settings delivered by the agent over the local channel.

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors raised while parsing a TLS configuration document.
#[derive(Debug, Error)]
pub enum TlsConfigError {
    /// The document was empty or whitespace.
    #[error("TLS configuration document is empty")]
    Empty,
    /// The document was not JSON of the expected shape.
    #[error("malformed TLS configuration: {source}")]
    Malformed {
        /// Parser error, naming the offending field where possible.
        #[source]
        source: serde_json::Error,
    },
}

impl From<TlsConfigError> for io::Error {
    fn from(error: TlsConfigError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

// Keystore fields must be present but may be null, hence `Option::deserialize`
// instead of serde's implicit default for missing options.
#[derive(Deserialize)]
struct RawTlsConfig {
    #[serde(deserialize_with = "Option::deserialize")]
    keystore_file: Option<Utf8PathBuf>,
    #[serde(deserialize_with = "Option::deserialize")]
    keystore_password: Option<String>,
    enable_for_command_channel: bool,
    enable_for_backing_storage: bool,
    disable_hostname_verification: bool,
}

#[derive(Deserialize)]
struct TlsDocument {
    tls_config: RawTlsConfig,
}

/// TLS settings for the command channel and related services.
#[derive(Clone, Default)]
pub struct TlsConfig {
    keystore_file: Option<Utf8PathBuf>,
    keystore_password: Option<Zeroizing<String>>,
    enable_for_command_channel: bool,
    enable_for_backing_storage: bool,
    disable_hostname_verification: bool,
}

impl TlsConfig {
    /// Parses the JSON document sent by the agent.
    ///
    /// # Errors
    ///
    /// Returns [`TlsConfigError::Empty`] for empty input and
    /// [`TlsConfigError::Malformed`] when the document is not valid JSON, the
    /// root or `tls_config` is not an object, or any field is missing or of
    /// the wrong type.
    pub fn parse(bytes: &[u8]) -> Result<Self, TlsConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TlsConfigError::Empty);
        }
        let TlsDocument { tls_config: raw } =
            serde_json::from_slice(bytes).map_err(|source| TlsConfigError::Malformed { source })?;
        Ok(Self {
            keystore_file: raw.keystore_file,
            keystore_password: raw.keystore_password.map(Zeroizing::new),
            enable_for_command_channel: raw.enable_for_command_channel,
            enable_for_backing_storage: raw.enable_for_backing_storage,
            disable_hostname_verification: raw.disable_hostname_verification,
        })
    }

    /// Configuration with TLS enabled for the command channel.
    #[must_use]
    pub fn for_command_channel(keystore_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            keystore_file: Some(keystore_file.into()),
            enable_for_command_channel: true,
            ..Self::default()
        }
    }

    /// Path of the PEM keystore, if configured.
    #[must_use]
    pub fn keystore_file(&self) -> Option<&Utf8Path> {
        self.keystore_file.as_deref()
    }

    /// Keystore password, if configured.
    #[must_use]
    pub fn keystore_password(&self) -> Option<&str> {
        self.keystore_password.as_ref().map(|password| password.as_str())
    }

    /// Whether the command channel listener terminates TLS.
    #[must_use]
    pub const fn enable_for_command_channel(&self) -> bool {
        self.enable_for_command_channel
    }

    /// Whether the backing storage connection uses TLS.
    #[must_use]
    pub const fn enable_for_backing_storage(&self) -> bool {
        self.enable_for_backing_storage
    }

    /// Whether clients skip hostname verification.
    #[must_use]
    pub const fn disable_hostname_verification(&self) -> bool {
        self.disable_hostname_verification
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TlsConfig")
            .field("keystore_file", &self.keystore_file)
            .field(
                "keystore_password",
                &self.keystore_password.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "enable_for_command_channel",
                &self.enable_for_command_channel,
            )
            .field(
                "enable_for_backing_storage",
                &self.enable_for_backing_storage,
            )
            .field(
                "disable_hostname_verification",
                &self.disable_hostname_verification,
            )
            .finish()
    }
}
