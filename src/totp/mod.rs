//! Time-based one-time password engine.
//!
//! Flow Overview:
//! 1) `generate_secret` produces a random shared key; `encode_secret` /
//!    `decode_secret` round-trip its base32 display form.
//! 2) `start_setup` creates a pending-setup session holding the secret and
//!    the `otpauth://` enrollment URI.
//! 3) `compute_code` derives the code for a time step; `verify_code` checks
//!    a candidate against a window of adjacent steps.
//!
//! Security boundaries:
//! - Secrets never appear in logs or `Debug` output.
//! - Candidate codes are compared in constant time.
//! - Revealing a valid code to a caller requires the opt-in `demo-codes`
//!   build feature.

mod code;
mod secret;
mod uri;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::TotpError;
use crate::session::{Session, SessionStore, SessionValue};

pub use secret::Secret;

/// Session-bag key under which `start_setup` stores the raw secret.
pub const SESSION_KEY_SECRET: &str = "totp.secret";
/// Session-bag key under which `start_setup` stores the enrollment URI.
pub const SESSION_KEY_URI: &str = "totp.uri";

const DEFAULT_DIGITS: u32 = 6;
const MIN_DIGITS: u32 = 6;
const MAX_DIGITS: u32 = 9;
const DEFAULT_STEP_MILLIS: u64 = 30_000;
const DEFAULT_SECRET_LEN: usize = 20;

/// Algorithm parameters shared with the enrollment URI.
#[derive(Clone, Debug)]
pub struct TotpConfig {
    digits: u32,
    step_millis: u64,
    secret_len: usize,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            step_millis: DEFAULT_STEP_MILLIS,
            secret_len: DEFAULT_SECRET_LEN,
        }
    }
}

impl TotpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Code width, clamped to 6..=9: RFC 4226 requires at least six
    /// digits, and ten or more would overflow the `u32` truncation.
    #[must_use]
    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits.clamp(MIN_DIGITS, MAX_DIGITS);
        self
    }

    #[must_use]
    pub fn with_step_millis(mut self, step_millis: u64) -> Self {
        self.step_millis = step_millis.max(1);
        self
    }

    #[must_use]
    pub fn with_secret_len(mut self, secret_len: usize) -> Self {
        self.secret_len = secret_len.clamp(secret::MIN_SECRET_LEN, secret::MAX_SECRET_LEN);
        self
    }

    #[must_use]
    pub fn digits(&self) -> u32 {
        self.digits
    }

    #[must_use]
    pub fn step_millis(&self) -> u64 {
        self.step_millis
    }

    #[must_use]
    pub fn secret_len(&self) -> usize {
        self.secret_len
    }
}

/// Stateless TOTP engine.
///
/// All operations are pure functions of their inputs; the only coupling to
/// shared state is [`TotpEngine::start_setup`], which delegates session
/// creation to the injected store.
#[derive(Clone, Debug, Default)]
pub struct TotpEngine {
    config: TotpConfig,
}

impl TotpEngine {
    #[must_use]
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    /// Generates a fresh random secret of the configured length.
    ///
    /// # Errors
    /// Returns [`TotpError::EntropyUnavailable`] if the OS random source
    /// cannot supply randomness. There is no fallback.
    pub fn generate_secret(&self) -> Result<Secret, TotpError> {
        secret::generate(self.config.secret_len)
    }

    /// Encodes a secret for display and enrollment (base32, no padding).
    #[must_use]
    pub fn encode_secret(&self, secret: &Secret) -> String {
        secret::encode(secret)
    }

    /// Decodes a displayed secret. Case-insensitive; ignores surrounding
    /// whitespace and trailing padding.
    ///
    /// # Errors
    /// Returns [`TotpError::MalformedSecret`] on invalid characters or an
    /// out-of-range decoded length.
    pub fn decode_secret(&self, encoded: &str) -> Result<Secret, TotpError> {
        secret::decode(encoded)
    }

    /// The time step ("tick") for a given epoch-millisecond timestamp.
    #[must_use]
    pub fn time_step(&self, now_millis: u64) -> u64 {
        now_millis / self.config.step_millis
    }

    /// Computes the code for a secret at an explicit time step.
    ///
    /// Deterministic and idempotent: HMAC-SHA1 over the big-endian 8-byte
    /// step counter, dynamic-offset truncation, modulo `10^digits`.
    #[must_use]
    pub fn compute_code(&self, secret: &Secret, step: u64) -> String {
        code::hotp(secret.as_bytes(), step, self.config.digits)
    }

    /// Verifies a candidate code against every step in
    /// `[now - window, now + window]`, comparing in constant time.
    ///
    /// Returns `Ok(false)` when no step matches.
    ///
    /// # Errors
    /// Returns [`TotpError::MalformedCode`] if the candidate is not exactly
    /// the configured number of ASCII digits.
    pub fn verify_code(
        &self,
        secret: &Secret,
        candidate: &str,
        now_millis: u64,
        window: u64,
    ) -> Result<bool, TotpError> {
        code::verify(
            secret.as_bytes(),
            candidate,
            self.time_step(now_millis),
            window,
            self.config.digits,
        )
    }

    /// Builds the standard enrollment URI for authenticator apps.
    #[must_use]
    pub fn enrollment_uri(&self, secret: &Secret, identity: &str, issuer: &str) -> String {
        uri::enrollment_uri(
            issuer,
            identity,
            &secret::encode(secret),
            self.config.digits,
            self.config.step_millis / 1_000,
        )
    }

    /// Begins enrollment: generates a secret, builds the enrollment URI,
    /// and returns a fresh session populated with both.
    ///
    /// The session is created last, after everything fallible has
    /// succeeded, so the caller either receives a fully populated session
    /// or none at all.
    ///
    /// # Errors
    /// Returns [`TotpError::EntropyUnavailable`] if secret or session-key
    /// generation fails.
    pub fn start_setup(
        &self,
        sessions: &SessionStore,
        identity: &str,
        issuer: &str,
        ttl: Duration,
    ) -> Result<Arc<Session>, TotpError> {
        let secret = self.generate_secret()?;
        let uri = self.enrollment_uri(&secret, identity, issuer);

        let session = sessions.create(ttl)?;
        session.put(SESSION_KEY_SECRET, SessionValue::Bytes(secret.into_bytes()));
        session.put(SESSION_KEY_URI, SessionValue::Text(uri));

        debug!(identity, issuer, "started TOTP setup");
        Ok(session)
    }

    /// Computes the code `delta_steps` away from the current step.
    ///
    /// Demo/test capability only: surfacing a valid code to an end user
    /// defeats the second factor, so this exists solely behind the
    /// `demo-codes` feature.
    #[cfg(feature = "demo-codes")]
    #[must_use]
    pub fn code_at_offset(&self, secret: &Secret, now_millis: u64, delta_steps: i64) -> String {
        let step = self.time_step(now_millis);
        let step = if delta_steps.is_negative() {
            step.saturating_sub(delta_steps.unsigned_abs())
        } else {
            step.saturating_add(delta_steps.unsigned_abs())
        };
        self.compute_code(secret, step)
    }
}

#[cfg(test)]
mod tests {
    use super::{SESSION_KEY_SECRET, SESSION_KEY_URI, TotpConfig, TotpEngine};
    use crate::clock::FixedClock;
    use crate::session::SessionStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> TotpEngine {
        TotpEngine::new(TotpConfig::default())
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = TotpConfig::default();
        assert_eq!(config.digits(), 6);
        assert_eq!(config.step_millis(), 30_000);
        assert_eq!(config.secret_len(), 20);

        let config = TotpConfig::new()
            .with_digits(8)
            .with_step_millis(60_000)
            .with_secret_len(10);
        assert_eq!(config.digits(), 8);
        assert_eq!(config.step_millis(), 60_000);
        assert_eq!(config.secret_len(), 10);
    }

    #[test]
    fn digits_are_clamped_to_a_safe_range() {
        assert_eq!(TotpConfig::new().with_digits(0).digits(), 6);
        assert_eq!(TotpConfig::new().with_digits(9).digits(), 9);
        assert_eq!(TotpConfig::new().with_digits(10).digits(), 9);
        assert_eq!(TotpConfig::new().with_digits(u32::MAX).digits(), 9);
    }

    #[test]
    fn oversized_digit_request_still_computes_codes() {
        let engine = TotpEngine::new(TotpConfig::new().with_digits(10));
        let secret = engine.decode_secret("JBSWY3DPEHPK3PXP").unwrap();
        let code = engine.compute_code(&secret, 1);
        assert_eq!(code.len(), 9);
        assert!(engine.verify_code(&secret, &code, 30_000, 0).unwrap());
    }

    #[test]
    fn time_step_is_floor_division() {
        let engine = engine();
        assert_eq!(engine.time_step(0), 0);
        assert_eq!(engine.time_step(29_999), 0);
        assert_eq!(engine.time_step(30_000), 1);
        assert_eq!(engine.time_step(59_000), 1);
        assert_eq!(engine.time_step(60_000), 2);
    }

    #[test]
    fn start_setup_populates_session() {
        let engine = engine();
        let store = SessionStore::with_clock(Arc::new(FixedClock::new(1_000)));
        let session = engine
            .start_setup(&store, "alice", "Konfirmi", Duration::from_secs(60))
            .unwrap();

        let secret = session.bytes(SESSION_KEY_SECRET).unwrap();
        assert_eq!(secret.len(), 20);

        let uri = session.text(SESSION_KEY_URI).unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("alice"));

        // The same session is reachable through the store by its key.
        let fetched = store.get(Some(session.session_key())).unwrap();
        assert_eq!(fetched.bytes(SESSION_KEY_SECRET).unwrap(), secret);
    }

    #[test]
    fn generated_secret_round_trips_through_display_encoding() {
        let engine = engine();
        let secret = engine.generate_secret().unwrap();
        let encoded = engine.encode_secret(&secret);
        let decoded = engine.decode_secret(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), secret.as_bytes());
    }

    #[cfg(feature = "demo-codes")]
    #[test]
    fn code_at_offset_matches_explicit_step() {
        let engine = engine();
        let secret = engine.decode_secret("JBSWY3DPEHPK3PXP").unwrap();
        let now = 1_700_000_000_000;
        let step = engine.time_step(now);
        assert_eq!(
            engine.code_at_offset(&secret, now, 0),
            engine.compute_code(&secret, step)
        );
        assert_eq!(
            engine.code_at_offset(&secret, now, 6),
            engine.compute_code(&secret, step + 6)
        );
        assert_eq!(
            engine.code_at_offset(&secret, now, -2),
            engine.compute_code(&secret, step - 2)
        );
    }
}
