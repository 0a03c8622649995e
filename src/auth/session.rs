use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A logged-in admin session.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub expires_at: Instant,
}

/// In-memory session table. Sessions do not survive a restart.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(hours: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl: Duration::from_secs(hours.saturating_mul(3600)),
        }
    }

    /// Create a new session for a user. Returns the session token.
    pub fn create(&mut self, username: &str) -> String {
        self.clear_stale();

        let token = generate_token();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::debug!("Created session for {}", username);
        token
    }

    /// Username behind a live token.
    pub fn lookup(&mut self, token: &str) -> Option<String> {
        let session = self.sessions.get(token)?;
        if Instant::now() >= session.expires_at {
            self.sessions.remove(token);
            return None;
        }
        Some(session.username.clone())
    }

    /// Delete a session by token.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every session of `username` except `keep`.
    pub fn revoke_all_except(&mut self, username: &str, keep: &str) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|token, s| token == keep || s.username != username);
        before - self.sessions.len()
    }

    pub fn clear_stale(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, s| s.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn created_session_resolves_to_user() {
        let mut store = SessionStore::new(1);
        let token = store.create("admin");
        assert_eq!(store.lookup(&token).as_deref(), Some("admin"));
        assert_eq!(store.lookup("nope"), None);
    }

    #[test]
    fn revoked_session_is_gone() {
        let mut store = SessionStore::new(1);
        let token = store.create("admin");
        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert_eq!(store.lookup(&token), None);
    }

    #[test]
    fn expired_session_is_rejected_and_dropped() {
        let mut store = SessionStore::new(0);
        let token = store.create("admin");
        assert_eq!(store.lookup(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn revoke_all_except_keeps_current_and_other_users() {
        let mut store = SessionStore::new(1);
        let keep = store.create("admin");
        let stale = store.create("admin");
        let other = store.create("someone");

        assert_eq!(store.revoke_all_except("admin", &keep), 1);
        assert!(store.lookup(&keep).is_some());
        assert!(store.lookup(&stale).is_none());
        assert!(store.lookup(&other).is_some());
    }
}
