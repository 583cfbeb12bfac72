//! Signup and TOTP setup flow.
//!
//! Flow Overview:
//! 1) `begin` renders the setup page, resuming an error session when the
//!    client presents an `err` key.
//! 2) `submit` validates the signup form; a rejection is parked in a fresh
//!    session whose key the caller embeds in the redirect.
//! 3) A valid submission starts TOTP setup and returns the page model with
//!    the enrollment URI and displayed secret.
//!
//! HTTP handling, templating, and credential storage live outside this
//! crate; this module only produces the page model and owns the
//! orchestration of [`SessionStore`] and [`TotpEngine`].

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "demo-codes")]
use crate::clock::{Clock, SystemClock};
use crate::error::TotpError;
use crate::session::{Session, SessionStore, SessionValue};
use crate::totp::{Secret, TotpEngine, SESSION_KEY_SECRET, SESSION_KEY_URI};

/// Session-bag key under which a successful submission parks the pending
/// password until setup completes.
pub const SESSION_KEY_PASSWORD: &str = "password";
/// Session-bag key for the user-facing error message of a rejected signup.
pub const SESSION_KEY_ERROR: &str = "error";

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MIN_PASSWORD_CHARS: usize = 8;

/// Username-existence check, owned by the external user storage.
pub trait UserDirectory: Send + Sync {
    fn user_exists(&self, username: &str) -> bool;
}

/// Directory with no users; every username is free.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyDirectory;

impl UserDirectory for EmptyDirectory {
    fn user_exists(&self, _username: &str) -> bool {
        false
    }
}

/// Flow configuration.
#[derive(Clone, Debug)]
pub struct SetupConfig {
    issuer: String,
    session_ttl: Duration,
    min_password_chars: usize,
}

impl SetupConfig {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            session_ttl: DEFAULT_SESSION_TTL,
            min_password_chars: DEFAULT_MIN_PASSWORD_CHARS,
        }
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_min_password_chars(mut self, minimum: usize) -> Self {
        self.min_password_chars = minimum;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn min_password_chars(&self) -> usize {
        self.min_password_chars
    }
}

/// Untrusted signup input, deserializable straight from a posted form body.
#[derive(Deserialize)]
pub struct SignupForm {
    username: String,
    password: SecretString,
    password_confirmation: SecretString,
}

impl SignupForm {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        password_confirmation: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            password_confirmation: SecretString::from(password_confirmation.into()),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Why a signup submission was rejected.
///
/// Passwords get a minimum length and nothing more: composition rules
/// (required digits, forbidden characters, upper length caps) add little
/// entropy in practice, and the second factor carries the weight.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignupError {
    #[error("You need to pick a username.")]
    MissingUsername,
    #[error("That username has been taken.")]
    UsernameTaken,
    #[error("Please choose a password.")]
    MissingPassword,
    #[error("Please repeat your preferred password in the 'confirm password' box.")]
    MissingConfirmation,
    #[error("The passwords in both password boxes did not match.")]
    PasswordMismatch,
    #[error("Passwords need to be at least {minimum} characters long.")]
    PasswordTooShort { minimum: usize },
}

/// Codes surfaced on the page for demonstration only.
///
/// Offsets mirror the demo this flow descends from: the current code, the
/// code six steps out (three minutes at a 30-second step), and the code a
/// hundred and twenty steps out (one hour).
#[cfg(feature = "demo-codes")]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DemoCodes {
    pub current: String,
    pub three_minutes_out: String,
    pub hour_out: String,
}

/// Renderable model of the setup page. Never carries raw secret bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SetupPage {
    /// `otpauth://` URI for the authenticator app.
    pub enrollment_uri: Option<String>,
    /// Key the client holds to reference the pending setup.
    pub session_key: Option<String>,
    /// Displayed base32 form of the pending secret.
    pub secret: Option<String>,
    /// User-facing error from a rejected submission, if any.
    pub error: Option<String>,
    #[cfg(feature = "demo-codes")]
    pub demo_codes: Option<DemoCodes>,
}

impl SetupPage {
    /// The blank first-visit form.
    #[must_use]
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Result of a signup submission.
#[derive(Debug)]
pub enum SignupOutcome {
    /// Validation passed; setup started and the page is ready to render.
    Enrolled(SetupPage),
    /// Validation failed. The message is parked in a session under
    /// `redirect_key` so the caller can redirect with `?err={key}`.
    Invalid {
        reason: SignupError,
        redirect_key: String,
    },
}

/// Controller for the signup + TOTP setup flow.
pub struct SetupFlow {
    engine: TotpEngine,
    sessions: Arc<SessionStore>,
    users: Arc<dyn UserDirectory>,
    /// Only demo-code rendering needs a notion of "now".
    #[cfg(feature = "demo-codes")]
    clock: Arc<dyn Clock>,
    config: SetupConfig,
}

impl SetupFlow {
    #[must_use]
    pub fn new(
        engine: TotpEngine,
        sessions: Arc<SessionStore>,
        users: Arc<dyn UserDirectory>,
        config: SetupConfig,
    ) -> Self {
        Self {
            engine,
            sessions,
            users,
            #[cfg(feature = "demo-codes")]
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Pins the clock used for demo-code rendering.
    #[cfg(feature = "demo-codes")]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    /// Renders the setup page for a fresh visit or an error redirect.
    ///
    /// An unknown or expired `err` key is a normal outcome: the visitor
    /// simply gets a blank form again.
    #[must_use]
    pub fn begin(&self, err_key: Option<&str>) -> SetupPage {
        match self.sessions.get(err_key) {
            Some(session) => self.render(&session),
            None => SetupPage::blank(),
        }
    }

    /// Handles a signup submission.
    ///
    /// Validation failures are recovered locally: the message is parked in
    /// a session and returned as [`SignupOutcome::Invalid`]. No secret is
    /// generated on a rejected submission.
    ///
    /// # Errors
    /// Returns [`TotpError::EntropyUnavailable`] if secret or session-key
    /// generation fails; setup cannot proceed without secure randomness.
    pub fn submit(&self, form: &SignupForm) -> Result<SignupOutcome, TotpError> {
        if let Err(reason) = self.validate(form) {
            debug!(username = form.username.as_str(), %reason, "signup rejected");
            let session = self.sessions.create(self.config.session_ttl)?;
            session.put(SESSION_KEY_ERROR, SessionValue::Text(reason.to_string()));
            return Ok(SignupOutcome::Invalid {
                reason,
                redirect_key: session.session_key().to_string(),
            });
        }

        let session = self.engine.start_setup(
            &self.sessions,
            &form.username,
            &self.config.issuer,
            self.config.session_ttl,
        )?;
        session.put(
            SESSION_KEY_PASSWORD,
            SessionValue::Text(form.password.expose_secret().to_string()),
        );

        debug!(username = form.username.as_str(), "signup accepted");
        Ok(SignupOutcome::Enrolled(self.render(&session)))
    }

    fn validate(&self, form: &SignupForm) -> Result<(), SignupError> {
        if form.username.is_empty() {
            return Err(SignupError::MissingUsername);
        }
        if self.users.user_exists(&form.username) {
            return Err(SignupError::UsernameTaken);
        }

        let password = form.password.expose_secret();
        let confirmation = form.password_confirmation.expose_secret();
        if password.is_empty() {
            return Err(SignupError::MissingPassword);
        }
        if confirmation.is_empty() {
            return Err(SignupError::MissingConfirmation);
        }
        if password != confirmation {
            return Err(SignupError::PasswordMismatch);
        }
        if password.chars().count() < self.config.min_password_chars {
            return Err(SignupError::PasswordTooShort {
                minimum: self.config.min_password_chars,
            });
        }
        Ok(())
    }

    fn render(&self, session: &Session) -> SetupPage {
        let secret = session
            .bytes(SESSION_KEY_SECRET)
            .and_then(|bytes| Secret::from_bytes(bytes).ok());
        let error = session.text(SESSION_KEY_ERROR).filter(|msg| !msg.is_empty());

        #[cfg(feature = "demo-codes")]
        let demo_codes = secret.as_ref().map(|secret| {
            let now = self.clock.now_millis();
            DemoCodes {
                current: self.engine.code_at_offset(secret, now, 0),
                three_minutes_out: self.engine.code_at_offset(secret, now, 6),
                hour_out: self.engine.code_at_offset(secret, now, 120),
            }
        });

        SetupPage {
            enrollment_uri: session.text(SESSION_KEY_URI),
            session_key: Some(session.session_key().to_string()),
            secret: secret.as_ref().map(|secret| self.engine.encode_secret(secret)),
            error,
            #[cfg(feature = "demo-codes")]
            demo_codes,
        }
    }
}
