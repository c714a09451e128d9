use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Number of random bytes per token. 32 bytes = 256 bits of entropy, enough
/// that brute-force guessing within the TTL window is infeasible.
const TOKEN_BYTES: usize = 32;

/// In-memory session store with TTL expiry.
///
/// Sessions never survive a process restart: the map is purely in-memory by
/// design. Expired entries are removed opportunistically on `issue` and on
/// `validate`, so the store stays bounded without a background sweep.
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh high-entropy session token.
    pub fn issue(&self) -> String {
        self.issue_at(Instant::now())
    }

    /// Returns true only if a matching, non-expired entry exists.
    /// A found-but-expired entry is deleted as a side effect.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Instant::now())
    }

    /// Clear all sessions (explicit reset).
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Clock-injected variants so tests can use a fixed reference clock.

    pub(crate) fn issue_at(&self, now: Instant) -> String {
        let token = new_token();
        let mut sessions = self.lock();
        sessions.retain(|_, created_at| now.duration_since(*created_at) <= self.ttl);
        sessions.insert(token.clone(), now);
        token
    }

    pub(crate) fn validate_at(&self, token: &str, now: Instant) -> bool {
        let mut sessions = self.lock();
        match sessions.get(token) {
            Some(created_at) if now.duration_since(*created_at) <= self.ttl => true,
            Some(_) => {
                sessions.remove(token);
                false
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the map itself is still a valid token set.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let mut token = String::with_capacity(TOKEN_BYTES * 2);
    for byte in bytes {
        // write! into a String cannot fail
        let _ = write!(token, "{:02x}", byte);
    }
    token
}
