//! Slack connection lifecycle: OAuth token issuance, credential storage,
//! validation and webhook delivery.

pub mod cache;
pub mod credential;
pub mod error;
pub mod manager;
pub mod messages;
pub mod payload;
pub mod processor;
pub mod store;

pub use {
    cache::ValidationCache,
    credential::{DirectPreference, Preferences, UserConnection, UserCredential, keys},
    error::{AuthError, SendError, StoreError},
    manager::{
        AuthorizationLink, ConnectionManager, ConnectionStatus, DeliveryOutcome, REVOKED_SENTINEL,
    },
    payload::WebhookPayload,
    processor::{AUTH_NOLOGIN, MessageProcessor, OutgoingMessage, Recipient},
    store::{CredentialStore, FileCredentialStore, MemoryCredentialStore},
};
