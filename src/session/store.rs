//! In-memory, TTL'd session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::TotpError;
use crate::session::Session;

/// 256 bits of randomness per key; unguessable within any practical TTL.
const SESSION_KEY_BYTES: usize = 32;

/// Process-wide map from session key to live session.
///
/// Explicitly constructed and passed to its consumers; lives from process
/// start to teardown. Crash-loss of pending setups is acceptable because
/// setup is resumable. `create` and `get` are safe under concurrent
/// invocation; the interior mutex guards the only shared mutable state.
pub struct SessionStore {
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session expiring `ttl` from now, under a fresh unguessable
    /// key. Stale entries are purged opportunistically on the way in.
    ///
    /// # Errors
    /// Returns [`TotpError::EntropyUnavailable`] if key generation fails.
    pub fn create(&self, ttl: Duration) -> Result<Arc<Session>, TotpError> {
        let now = self.clock.now_millis();
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = now.saturating_add(ttl_millis);

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, session| !session.is_expired(now));

        let mut key = generate_session_key()?;
        // 256-bit keys do not collide in practice; the loop keeps the
        // uniqueness invariant unconditional anyway.
        while sessions.contains_key(&key) {
            key = generate_session_key()?;
        }

        let session = Arc::new(Session::new(key.clone(), expires_at));
        sessions.insert(key, Arc::clone(&session));
        debug!(ttl_millis, live = sessions.len(), "created session");
        Ok(session)
    }

    /// Looks up a live session.
    ///
    /// Returns `None` for a missing, empty, unknown, or expired key; a miss
    /// is a normal outcome, never an error. An expired entry found here is
    /// removed on the spot.
    #[must_use]
    pub fn get(&self, key: Option<&str>) -> Option<Arc<Session>> {
        let key = key?.trim();
        if key.is_empty() {
            return None;
        }

        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(key) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(key);
                debug!("dropped expired session on lookup");
                None
            }
            Some(session) => Some(Arc::clone(session)),
            None => None,
        }
    }

    /// Drops every expired entry; returns how many were removed.
    ///
    /// `get` never returns an expired session regardless of whether this
    /// sweep runs; it only reclaims memory earlier.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    /// Number of entries currently held, expired stragglers included.
    #[must_use]
    pub fn len(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate_session_key() -> Result<String, TotpError> {
    let mut bytes = [0u8; SESSION_KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(TotpError::EntropyUnavailable)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
