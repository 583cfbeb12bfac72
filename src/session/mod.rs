//! Server-side pending-setup sessions.
//!
//! A [`Session`] is a string-keyed bag of values owned by whoever holds its
//! unguessable key. The [`SessionStore`] is the single point of concurrency
//! control: it hands out `Arc<Session>` references and stops returning a
//! session once its expiry has passed. References already held keep working
//! as an after-expiry snapshot.

mod store;

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

pub use store::SessionStore;

/// A value stored in a session bag.
///
/// A closed set of kinds instead of dynamic typing: mismatched access
/// returns `None` through the typed accessors rather than coercing.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Debug for SessionValue {
    // Bags hold pending secrets and passwords; show kind and size only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "Text(len={})", text.len()),
            Self::Bytes(bytes) => write!(f, "Bytes(len={})", bytes.len()),
        }
    }
}

/// One pending setup, identified by an unguessable key.
///
/// Contents are set only by callers; the store never invents values. The
/// expiry is fixed at creation and never extended.
pub struct Session {
    key: String,
    expires_at_millis: u64,
    values: Mutex<HashMap<String, SessionValue>>,
}

impl Session {
    pub(crate) fn new(key: String, expires_at_millis: u64) -> Self {
        Self {
            key,
            expires_at_millis,
            values: Mutex::new(HashMap::new()),
        }
    }

    /// The opaque key the client holds to reference this session.
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn expires_at_millis(&self) -> u64 {
        self.expires_at_millis
    }

    #[must_use]
    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at_millis
    }

    /// Stores a value. Last write wins.
    pub fn put(&self, key: &str, value: SessionValue) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<SessionValue> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    /// The stored value, or `default` when the key is absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: SessionValue) -> SessionValue {
        self.get(key).unwrap_or(default)
    }

    /// The text stored under `key`, if present and textual.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(SessionValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The bytes stored under `key`, if present and binary.
    #[must_use]
    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.get(key) {
            Some(SessionValue::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("expires_at_millis", &self.expires_at_millis)
            .field("values", &self.len())
            .finish_non_exhaustive()
    }
}
