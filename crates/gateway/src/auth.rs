//! Host authentication: the bearer API key on `/api/*`, and the signed,
//! short-lived tokens that let a browser start the connect flow for the one
//! user the host issued them for.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    axum::{
        extract::{Request, State},
        http::{StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Json, Response},
    },
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    hmac::{Hmac, Mac},
    secrecy::{ExposeSecret, Secret},
    sha2::{Digest, Sha256},
    tracing::{debug, warn},
};

use crate::state::GatewayState;

type HmacSha256 = Hmac<Sha256>;

/// How long a connect link stays usable.
pub const CONNECT_TOKEN_TTL: Duration = Duration::from_secs(600);

/// Middleware that requires `Authorization: Bearer <api_key>`.
///
/// Without a configured key every request is refused with 503.
pub async fn require_api_key(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ref api_key) = state.api_key else {
        warn!(path = %request.uri().path(), "api request refused: no api key configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "api key not configured"})),
        )
            .into_response();
    };

    if let Some(key) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        && keys_match(key, api_key.expose_secret())
    {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "api request without a valid key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "not authenticated"})),
    )
        .into_response()
}

/// Constant-time comparison over SHA-256 digests.
fn keys_match(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given
        .iter()
        .zip(expected.iter())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn mac(key: &Secret<String>, payload: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes()).ok()?;
    mac.update(b"connect:");
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Sign a connect token for `user_id`, valid until `expires_at` (unix
/// seconds). Format: `base64url(user_id).expires_at.base64url(hmac)`.
pub fn sign_connect_token(
    key: &Secret<String>,
    user_id: &str,
    expires_at: u64,
) -> Option<String> {
    let payload = format!("{}.{expires_at}", URL_SAFE_NO_PAD.encode(user_id));
    let signature = URL_SAFE_NO_PAD.encode(mac(key, &payload)?.finalize().into_bytes());
    Some(format!("{payload}.{signature}"))
}

/// The user a connect token was issued for, when its signature holds and
/// `now` is before its expiry.
pub fn verify_connect_token(key: &Secret<String>, token: &str, now: u64) -> Option<String> {
    let (payload, signature) = token.rsplit_once('.')?;
    let (user, expires_at) = payload.split_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    mac(key, payload)?.verify_slice(&signature).ok()?;

    let expires_at: u64 = expires_at.parse().ok()?;
    if now >= expires_at {
        return None;
    }
    String::from_utf8(URL_SAFE_NO_PAD.decode(user).ok()?).ok()
}
