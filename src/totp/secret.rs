//! Shared-secret container and its base32 display encoding.

use std::fmt;

use data_encoding::BASE32_NOPAD_NOCASE;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::TotpError;

pub(crate) const MIN_SECRET_LEN: usize = 10;
pub(crate) const MAX_SECRET_LEN: usize = 64;

/// Raw TOTP shared key.
///
/// Construction goes through [`Secret::from_bytes`], generation, or
/// decoding, all of which enforce the length bounds. `Debug` is redacted;
/// the raw bytes must never reach logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wraps raw key bytes.
    ///
    /// # Errors
    /// Returns [`TotpError::MalformedSecret`] for lengths outside
    /// `10..=64` bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TotpError> {
        if bytes.len() < MIN_SECRET_LEN || bytes.len() > MAX_SECRET_LEN {
            return Err(TotpError::MalformedSecret {
                reason: format!(
                    "secret must be {MIN_SECRET_LEN}..={MAX_SECRET_LEN} bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("len", &self.0.len()).finish()
    }
}

/// Generates a fresh secret from the OS random source.
///
/// Fails rather than falling back to a weaker source.
pub(crate) fn generate(len: usize) -> Result<Secret, TotpError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(TotpError::EntropyUnavailable)?;
    Secret::from_bytes(bytes)
}

pub(crate) fn encode(secret: &Secret) -> String {
    BASE32_NOPAD_NOCASE.encode(secret.as_bytes())
}

/// Decodes a displayed secret, tolerating surrounding whitespace and
/// trailing `=` padding. Case-insensitive.
pub(crate) fn decode(encoded: &str) -> Result<Secret, TotpError> {
    let trimmed = encoded.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(TotpError::MalformedSecret {
            reason: "empty secret".to_string(),
        });
    }
    let bytes = BASE32_NOPAD_NOCASE
        .decode(trimmed.as_bytes())
        .map_err(|err| TotpError::MalformedSecret {
            reason: format!("invalid base32: {err}"),
        })?;
    Secret::from_bytes(bytes)
}
