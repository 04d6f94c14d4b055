use crate::messages;

/// Failures of the credential store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an OAuth callback could not be turned into a stored credential.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The callback `state` is unknown, expired, or belongs to someone else.
    #[error("unexpected state variable")]
    InvalidState,

    #[error("no client id or client secret is configured")]
    MissingCredentials,

    /// `oauth.access` answered `ok: false` or left out the webhook.
    #[error("slack rejected the authorization: {reason}")]
    ProviderRejected { reason: String },

    /// The user already has a credential for a different Slack account.
    #[error("slack user {received} does not match connected user {stored}")]
    UserMismatch { stored: String, received: String },

    #[error("token exchange failed: {0}")]
    Transport(#[source] slackbridge_oauth::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    #[must_use]
    pub fn provider_rejected(reason: impl std::fmt::Display) -> Self {
        Self::ProviderRejected {
            reason: reason.to_string(),
        }
    }

    /// Text shown to the person who clicked the button.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidState => messages::INVALID_STATE,
            Self::MissingCredentials => messages::NOT_CONFIGURED,
            Self::ProviderRejected { .. } => messages::PROVIDER_REJECTED,
            Self::UserMismatch { .. } => messages::USER_MISMATCH,
            Self::Transport(_) => messages::TRANSPORT_FAILED,
            Self::Store(_) => messages::STORE_FAILED,
        }
    }
}

/// A webhook delivery that never reached Slack.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// The recipient's connection could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_auth_error_has_distinct_user_message() {
        let errors = [
            AuthError::InvalidState,
            AuthError::MissingCredentials,
            AuthError::provider_rejected("invalid_code"),
            AuthError::UserMismatch {
                stored: "U1".into(),
                received: "U2".into(),
            },
            AuthError::Transport(slackbridge_oauth::Error::message("timeout")),
            AuthError::Store(StoreError::Io(std::io::Error::other("disk"))),
        ];
        let mut seen: Vec<&str> = errors.iter().map(AuthError::user_message).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), errors.len());
    }
}
