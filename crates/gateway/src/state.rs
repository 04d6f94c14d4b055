use std::sync::Arc;

use {
    secrecy::Secret,
    slackbridge_connection::{ConnectionManager, MessageProcessor},
};

/// Shared state behind every route.
pub struct GatewayState {
    pub manager: Arc<ConnectionManager>,
    pub processor: MessageProcessor,
    /// Host API key. `None` locks `/api/*` and connect links.
    pub api_key: Option<Secret<String>>,
    pub version: String,
}

impl GatewayState {
    pub fn new(manager: Arc<ConnectionManager>, api_key: Option<Secret<String>>) -> Arc<Self> {
        Arc::new(Self {
            processor: MessageProcessor::new(Arc::clone(&manager)),
            manager,
            api_key,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Mark cookies `Secure` when the service is reached over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.manager.site().public_url.starts_with("https://")
    }

    /// Absolute URL of the gateway's browser-facing `path`.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}{path}",
            self.manager.site().public_url.trim_end_matches('/')
        )
    }
}
