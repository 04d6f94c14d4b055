//! Anti-CSRF state for the authorization redirect.
//!
//! A state value is minted when the user is sent to Slack and bound to the
//! browser session (and local user) that asked for it. The callback must
//! present the same value from the same session; a match consumes it.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::RngCore,
    tracing::debug,
};

/// Abandoned redirects expire after this long.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random state parameter.
pub fn generate_state() -> String {
    random_token()
}

/// Generate an opaque browser session id.
pub fn generate_session_id() -> String {
    random_token()
}

#[derive(Debug, Clone)]
struct Pending {
    state: String,
    user_id: String,
    created: Instant,
}

/// Outcome of checking a callback's `state` against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCheck {
    /// Matched and consumed. Carries the user the flow was started for.
    Valid { user_id: String },
    /// Nothing pending for this session (never started, expired, or used).
    Missing,
    /// A flow is pending but the value differs, or it belongs to another user.
    Mismatch,
}

/// In-process store of pending authorizations, keyed by session id.
#[derive(Debug)]
pub struct StateStore {
    pending: Mutex<HashMap<String, Pending>>,
    ttl: Duration,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STATE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a fresh state for `session_id`, replacing any earlier one.
    pub fn mint(&self, session_id: &str, user_id: &str) -> String {
        let state = generate_state();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_locked(&mut pending);
        pending.insert(session_id.to_string(), Pending {
            state: state.clone(),
            user_id: user_id.to_string(),
            created: Instant::now(),
        });
        debug!(user_id, "minted OAuth state");
        state
    }

    /// The local user a session's pending flow was started for.
    pub fn pending_user(&self, session_id: &str) -> Option<String> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending
            .get(session_id)
            .filter(|p| p.created.elapsed() < self.ttl)
            .map(|p| p.user_id.clone())
    }

    /// Check `state` for `session_id` and `user_id`. Only a full match
    /// consumes the entry, so a forged callback cannot cancel a real flow.
    pub fn verify(&self, session_id: &str, state: &str, user_id: &str) -> StateCheck {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_locked(&mut pending);

        let Some(entry) = pending.get(session_id) else {
            return StateCheck::Missing;
        };
        if entry.state != state || entry.user_id != user_id {
            return StateCheck::Mismatch;
        }
        match pending.remove(session_id) {
            Some(entry) => StateCheck::Valid {
                user_id: entry.user_id,
            },
            None => StateCheck::Missing,
        }
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_locked(&self, pending: &mut HashMap<String, Pending>) {
        let ttl = self.ttl;
        pending.retain(|_, p| p.created.elapsed() < ttl);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_url_safe_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn matching_state_is_consumed() {
        let store = StateStore::new();
        let state = store.mint("sess", "42");
        assert_eq!(store.pending_user("sess").as_deref(), Some("42"));
        assert_eq!(store.verify("sess", &state, "42"), StateCheck::Valid {
            user_id: "42".into()
        });
        assert_eq!(store.verify("sess", &state, "42"), StateCheck::Missing);
        assert!(store.is_empty());
    }

    #[test]
    fn mismatch_keeps_pending_flow() {
        let store = StateStore::new();
        let state = store.mint("sess", "42");
        assert_eq!(store.verify("sess", "forged", "42"), StateCheck::Mismatch);
        assert_eq!(store.verify("sess", &state, "7"), StateCheck::Mismatch);
        assert_eq!(store.verify("other", &state, "42"), StateCheck::Missing);
        assert_eq!(store.verify("sess", &state, "42"), StateCheck::Valid {
            user_id: "42".into()
        });
    }

    #[test]
    fn reminting_replaces_previous_state() {
        let store = StateStore::new();
        let first = store.mint("sess", "42");
        let second = store.mint("sess", "42");
        assert_eq!(store.verify("sess", &first, "42"), StateCheck::Mismatch);
        assert!(matches!(
            store.verify("sess", &second, "42"),
            StateCheck::Valid { .. }
        ));
    }

    #[test]
    fn expired_state_is_missing() {
        let store = StateStore::with_ttl(Duration::ZERO);
        let state = store.mint("sess", "42");
        assert_eq!(store.verify("sess", &state, "42"), StateCheck::Missing);
        assert!(store.pending_user("sess").is_none());
    }
}
