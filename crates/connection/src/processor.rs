use std::sync::Arc;

use {
    serde::Deserialize,
    tracing::{debug, error},
};

use crate::{
    cache::ValidationCache,
    manager::{ConnectionManager, DeliveryOutcome},
};

/// Auth method of accounts that may not log in; they never get messages.
pub const AUTH_NOLOGIN: &str = "nologin";

/// The host's view of who a message is for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Recipient {
    pub id: String,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub auth: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    fn is_reachable(&self) -> bool {
        !self.suspended && !self.deleted && self.auth.as_deref() != Some(AUTH_NOLOGIN)
    }
}

/// A notification handed over by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingMessage {
    pub recipient: Recipient,
    #[serde(default)]
    pub subject: Option<String>,
    /// Plain-text body. This is what gets sent.
    pub full_message: String,
    #[serde(default)]
    pub full_message_html: Option<String>,
}

/// Boundary between the host and the bridge. Nothing it does fails loudly:
/// every outcome collapses to a bool and errors end up in the log.
pub struct MessageProcessor {
    manager: Arc<ConnectionManager>,
}

impl MessageProcessor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub async fn send(&self, message: &OutgoingMessage) -> bool {
        let recipient = &message.recipient;
        if !recipient.is_reachable() {
            debug!(user_id = %recipient.id, "recipient cannot receive messages, skipping");
            return true;
        }
        if self.manager.site().suppress_delivery {
            debug!(user_id = %recipient.id, "delivery suppressed by configuration");
            return true;
        }

        match self
            .manager
            .send_message(&message.full_message, &recipient.id)
            .await
        {
            Ok(DeliveryOutcome::Skipped) => {
                debug!(user_id = %recipient.id, "recipient has no slack connection");
                true
            },
            Ok(_) => true,
            Err(e) => {
                error!(user_id = %recipient.id, error = %e, "slack delivery failed");
                false
            },
        }
    }

    pub fn is_system_configured(&self) -> bool {
        self.manager.is_system_configured()
    }

    pub async fn is_user_configured(&self, cache: &mut ValidationCache, user_id: &str) -> bool {
        self.manager.validate_connection(cache, user_id, false).await
    }
}
