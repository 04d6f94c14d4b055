//! JSON API the host application calls. Every route sits behind
//! [`require_api_key`](crate::auth::require_api_key).

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    slackbridge_connection::{
        AuthError, AuthorizationLink, OutgoingMessage, Recipient, ValidationCache,
    },
    tracing::{debug, warn},
};

use crate::{
    auth::{CONNECT_TOKEN_TTL, sign_connect_token, unix_now},
    connect_routes::CONNECT_PATH,
    state::GatewayState,
};

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub user_id: String,
    /// Plain-text body.
    pub message: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message_html: Option<String>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub auth: Option<String>,
}

impl From<NotifyRequest> for OutgoingMessage {
    fn from(req: NotifyRequest) -> Self {
        Self {
            recipient: Recipient {
                id: req.user_id,
                suspended: req.suspended,
                deleted: req.deleted,
                auth: req.auth,
            },
            subject: req.subject,
            full_message: req.message,
            full_message_html: req.message_html,
        }
    }
}

/// `POST /api/notify`
pub async fn notify_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<NotifyRequest>,
) -> impl IntoResponse {
    let ok = state.processor.send(&body.into()).await;
    Json(serde_json::json!({ "ok": ok }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    force: bool,
}

/// `GET /api/users/{user}/status`
pub async fn status_handler(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let mut cache = ValidationCache::new();
    let configured = state.manager.is_user_configured(&user_id).await;
    let valid = state
        .manager
        .validate_connection(&mut cache, &user_id, query.force)
        .await;
    Json(serde_json::json!({
        "configured": configured,
        "valid": valid,
    }))
}

/// `POST /api/users/{user}/connect-link`
///
/// Link for the user's preferences screen: Slack's configuration page when
/// connected, otherwise a short-lived gateway URL that starts the "Add to
/// Slack" flow for this user only.
pub async fn connect_link_handler(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
) -> Response {
    let link = match connect_link(&state, &user_id).await {
        Ok(link) => link,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "could not build slack connect link");
            let status = match e {
                AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::CONFLICT,
            };
            return (
                status,
                Json(serde_json::json!({ "error": e.user_message() })),
            )
                .into_response();
        },
    };
    Json(serde_json::json!({ "link": link, "label": link.label() })).into_response()
}

async fn connect_link(
    state: &GatewayState,
    user_id: &str,
) -> Result<AuthorizationLink, AuthError> {
    if !state.manager.is_using_button_flow() || !state.manager.is_system_configured() {
        return Err(AuthError::MissingCredentials);
    }
    if let Some(link) = state.manager.manage_link(user_id).await? {
        return Ok(link);
    }
    let expires_at = unix_now() + CONNECT_TOKEN_TTL.as_secs();
    let token = state
        .api_key
        .as_ref()
        .and_then(|key| sign_connect_token(key, user_id, expires_at))
        .ok_or(AuthError::MissingCredentials)?;
    debug!(user_id, "issued slack connect link");
    Ok(AuthorizationLink::Connect {
        url: format!("{}?token={token}", state.public_url(CONNECT_PATH)),
    })
}

/// `DELETE /api/users/{user}/connection`
pub async fn disconnect_handler(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
) -> StatusCode {
    state.manager.clear_connection(&user_id).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

/// `PUT /api/users/{user}/username`
pub async fn username_handler(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    Json(body): Json<UsernameRequest>,
) -> Response {
    if state.manager.is_using_button_flow() {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "usernames are only used when the slack button is disabled"
            })),
        )
            .into_response();
    }
    match state.manager.save_username(&user_id, &body.username).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "failed to save slack username");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        },
    }
}
