//! Slack "Add to Slack" OAuth plumbing: anti-CSRF state, the authorization
//! redirect, the `oauth.access` code exchange and `auth.test`.

pub mod callback_server;
pub mod error;
pub mod flow;
pub mod state;
pub mod types;

pub use {
    callback_server::CallbackServer,
    error::{Error, Result},
    flow::{OAuthFlow, WEBHOOK_SCOPE, auth_test},
    state::{StateCheck, StateStore, generate_session_id, generate_state},
    types::{
        AuthTestResponse, IncomingWebhook, OAuthAccessResponse, OAuthConfig, TokenGrant,
        serialize_secret,
    },
};
