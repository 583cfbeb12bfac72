//! # Konfirmi (TOTP second-factor core)
//!
//! `konfirmi` issues and verifies Time-based One-Time Password (TOTP) codes
//! and manages the short-lived server-side sessions that carry setup state
//! between requests during enrollment.
//!
//! ## Components
//!
//! - [`totp::TotpEngine`] — the pure algorithm: secret generation, base32
//!   display encoding, RFC 6238 code computation, and verification against a
//!   window of adjacent time steps.
//! - [`session::SessionStore`] — a thread-safe, TTL'd map of pending-setup
//!   sessions keyed by unguessable tokens. Explicitly constructed and
//!   injected; there is no process-global store.
//! - [`setup::SetupFlow`] — the controller that validates signup input and
//!   orchestrates the engine and the store, producing a renderable page
//!   model. HTTP handling, templating, and user storage stay outside this
//!   crate.
//!
//! ## Security boundaries
//!
//! - Raw secrets never appear in logs; `Debug` on secret-bearing types is
//!   redacted.
//! - Code verification uses constant-time comparison.
//! - Session keys are 256-bit random tokens; expired sessions are
//!   unreachable through the store.
//! - Valid codes are never surfaced to callers unless the crate is built
//!   with the opt-in `demo-codes` feature.

pub mod clock;
pub mod error;
pub mod session;
pub mod setup;
pub mod totp;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::TotpError;
pub use session::{Session, SessionStore, SessionValue};
pub use setup::{SetupConfig, SetupFlow, SetupPage, SignupError, SignupForm, SignupOutcome};
pub use totp::{Secret, TotpConfig, TotpEngine};
