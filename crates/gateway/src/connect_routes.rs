//! Browser-facing half of the "Add to Slack" flow.

use std::sync::Arc;

use {
    axum::{
        extract::{Query, State},
        http::{HeaderMap, StatusCode, header},
        response::{Html, IntoResponse, Redirect, Response},
    },
    serde::Deserialize,
    slackbridge_connection::{AuthError, ValidationCache, messages},
    slackbridge_oauth::generate_session_id,
    tracing::{info, warn},
};

use crate::{
    auth::{unix_now, verify_connect_token},
    state::GatewayState,
};

/// Browser entry point of the connect flow.
pub const CONNECT_PATH: &str = "/connect";

/// Cookie tying the callback to the browser that started the flow.
pub const SESSION_COOKIE: &str = "slackbridge_session";

/// Extract a cookie value from a `Cookie` header.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
            && !value.is_empty()
        {
            return Some(value);
        }
    }
    None
}

fn session_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_cookie(v, SESSION_COOKIE))
        .map(str::to_string)
}

/// `Lax` so the cookie survives the top-level redirect back from Slack.
fn session_cookie(session_id: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={session_id}; HttpOnly; SameSite=Lax; Path=/; Max-Age=600{secure}")
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// `GET /connect?token=`
///
/// Entry point for the browser. The token is minted by the host through
/// `POST /api/users/{user}/connect-link` and names the only user this
/// session may authorize.
pub async fn connect_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let Some(ref api_key) = state.api_key else {
        warn!("connect link refused: no api key configured");
        return error_page(StatusCode::SERVICE_UNAVAILABLE, messages::NOT_CONFIGURED);
    };
    let Some(user_id) = params
        .token
        .as_deref()
        .and_then(|token| verify_connect_token(api_key, token, unix_now()))
    else {
        warn!("connect link with an invalid or expired token");
        return error_page(StatusCode::FORBIDDEN, messages::CONNECT_LINK_INVALID);
    };

    let session_id = generate_session_id();
    match state
        .manager
        .build_authorization_link(&user_id, &session_id)
        .await
    {
        Ok(link) => {
            let cookie = session_cookie(&session_id, state.secure_cookies());
            (
                [(header::SET_COOKIE, cookie)],
                Redirect::to(link.url()),
            )
                .into_response()
        },
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "could not start slack authorization");
            auth_error_page(&e)
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /slackconnect`
pub async fn callback_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = session_from(&headers) else {
        warn!("slack callback without a session cookie");
        return auth_error_page(&AuthError::InvalidState);
    };
    let Some(user_id) = state.manager.pending_user(&session_id) else {
        warn!("slack callback for a session with no pending authorization");
        return auth_error_page(&AuthError::InvalidState);
    };
    if let Some(error) = params.error {
        warn!(user_id = %user_id, error = %error, "slack authorization denied");
        return auth_error_page(&AuthError::provider_rejected(error));
    }
    let Some(oauth_state) = params.state else {
        return auth_error_page(&AuthError::InvalidState);
    };
    let Some(code) = params.code else {
        return auth_error_page(&AuthError::provider_rejected("missing code"));
    };

    let mut cache = ValidationCache::new();
    match state
        .manager
        .issue_token(&mut cache, &session_id, &code, &oauth_state, &user_id)
        .await
    {
        Ok(()) => {
            info!(user_id = %user_id, "slack account connected");
            match state.manager.site().preferences_url() {
                Some(url) => Redirect::to(url).into_response(),
                None => Html(
                    "<!doctype html><title>Slack connected</title>\
                     <h1>Slack connected</h1><p>You can close this window.</p>",
                )
                .into_response(),
            }
        },
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "slack callback failed");
            auth_error_page(&e)
        },
    }
}

fn auth_error_page(error: &AuthError) -> Response {
    error_page(StatusCode::BAD_REQUEST, error.user_message())
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!doctype html><title>Slack connection failed</title>\
         <h1>Slack connection failed</h1><p>{message}</p>"
    );
    (status, Html(body)).into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_cookie() {
        let header = "theme=dark; slackbridge_session=abc123; other=1";
        assert_eq!(parse_cookie(header, SESSION_COOKIE), Some("abc123"));
        assert_eq!(parse_cookie("slackbridge_session=", SESSION_COOKIE), None);
        assert_eq!(parse_cookie("theme=dark", SESSION_COOKIE), None);
    }

    #[test]
    fn cookie_is_lax_and_http_only() {
        let cookie = session_cookie("s1", false);
        assert!(cookie.starts_with("slackbridge_session=s1;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie("s1", true).ends_with("; Secure"));
    }
}
