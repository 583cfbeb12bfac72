//! Error taxonomy for the TOTP engine and session store.
//!
//! A session lookup miss is not represented here: `SessionStore::get`
//! returns `None` for missing or expired keys because a miss is a normal
//! outcome the caller handles, not a failure. Signup validation problems
//! live in [`crate::setup::SignupError`] since they are recovered locally
//! by the flow controller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TotpError {
    /// The secure random source could not supply randomness. Fatal for the
    /// operation at hand; there is deliberately no fallback to a weaker
    /// source.
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(#[source] rand::Error),

    /// A displayed secret failed base32 decoding or decoded to an
    /// unreasonable length.
    #[error("malformed secret: {reason}")]
    MalformedSecret { reason: String },

    /// A candidate code is not exactly the configured number of ASCII
    /// digits.
    #[error("malformed code: expected {expected_digits} digits")]
    MalformedCode { expected_digits: u32 },
}
