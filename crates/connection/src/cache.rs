use std::collections::HashMap;

/// Per-request memo of connection validity, keyed by user id.
///
/// Create one per inbound request and pass it down; it is never shared
/// between requests.
#[derive(Debug, Default, Clone)]
pub struct ValidationCache {
    results: HashMap<String, bool>,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<bool> {
        self.results.get(user_id).copied()
    }

    pub fn record(&mut self, user_id: &str, valid: bool) {
        self.results.insert(user_id.to_string(), valid);
    }
}
