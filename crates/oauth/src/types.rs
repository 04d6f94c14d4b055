use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Slack app settings needed to run the "Add to Slack" flow.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// `https://<provider>/oauth/authorize`
    pub auth_url: String,
    /// Web API `oauth.access` endpoint.
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// The `incoming_webhook` object of an `oauth.access` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingWebhook {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub configuration_url: String,
    #[serde(default)]
    pub url: String,
}

impl IncomingWebhook {
    fn is_complete(&self) -> bool {
        [
            &self.channel,
            &self.channel_id,
            &self.configuration_url,
            &self.url,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

/// Raw `oauth.access` response. Every field is optional because Slack only
/// fills them in when `ok` is true.
#[derive(Deserialize)]
pub struct OAuthAccessResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub incoming_webhook: Option<IncomingWebhook>,
}

impl std::fmt::Debug for OAuthAccessResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAccessResponse")
            .field("ok", &self.ok)
            .field("error", &self.error)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .field("team_name", &self.team_name)
            .field("team_id", &self.team_id)
            .field(
                "incoming_webhook",
                &self.incoming_webhook.as_ref().map(|w| &w.channel),
            )
            .finish()
    }
}

/// A successful, complete token exchange.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: Secret<String>,
    pub user_id: String,
    pub team_name: Option<String>,
    pub team_id: Option<String>,
    pub incoming_webhook: IncomingWebhook,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("team_name", &self.team_name)
            .field("team_id", &self.team_id)
            .field("channel", &self.incoming_webhook.channel)
            .finish()
    }
}

impl OAuthAccessResponse {
    /// Turn the raw response into a grant. `Err` carries the reason the
    /// provider (or an incomplete payload) rejected the exchange.
    pub fn into_grant(self) -> Result<TokenGrant, String> {
        if !self.ok {
            return Err(self.error.unwrap_or_else(|| "unknown_error".into()));
        }
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or("missing access_token")?;
        let user_id = self
            .user_id
            .filter(|u| !u.is_empty())
            .ok_or("missing user_id")?;
        let incoming_webhook = self
            .incoming_webhook
            .filter(IncomingWebhook::is_complete)
            .ok_or("missing or incomplete incoming_webhook")?;

        Ok(TokenGrant {
            access_token: Secret::new(access_token),
            user_id,
            team_name: self.team_name,
            team_id: self.team_id,
            incoming_webhook,
        })
    }
}

/// `auth.test` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

/// Errors Slack uses to say a token will never work again.
pub const REVOKED_AUTH_ERRORS: &[&str] = &["token_revoked", "invalid_auth"];

impl AuthTestResponse {
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        !self.ok
            && self
                .error
                .as_deref()
                .is_some_and(|e| REVOKED_AUTH_ERRORS.contains(&e))
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

/// Serialize a `Secret<String>` by exposing its inner value.
/// Use only for fields that must round-trip through storage.
pub fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn full_response() -> serde_json::Value {
        serde_json::json!({
            "ok": true,
            "access_token": "xoxp-1",
            "scope": "identify,incoming-webhook",
            "user_id": "U4Z1CT99S",
            "team_name": "POET",
            "team_id": "T4XQSUB5F",
            "incoming_webhook": {
                "channel": "@someone",
                "channel_id": "D4ZLL6F2B",
                "configuration_url": "https://poetdev.slack.com/services/B506QFUEN",
                "url": "https://hooks.slack.com/services/T4XQSUB5F/B506QFUEN/abc"
            }
        })
    }

    #[test]
    fn complete_response_becomes_grant() {
        let resp: OAuthAccessResponse = serde_json::from_value(full_response()).unwrap();
        let grant = resp.into_grant().unwrap();
        assert_eq!(grant.user_id, "U4Z1CT99S");
        assert_eq!(grant.incoming_webhook.channel_id, "D4ZLL6F2B");
        assert_eq!(grant.access_token.expose_secret(), "xoxp-1");
    }

    #[test]
    fn not_ok_carries_provider_error() {
        let resp: OAuthAccessResponse =
            serde_json::from_value(serde_json::json!({"ok": false, "error": "invalid_code"}))
                .unwrap();
        assert_eq!(resp.into_grant().unwrap_err(), "invalid_code");
    }

    #[test]
    fn missing_webhook_is_rejected() {
        let mut value = full_response();
        value["incoming_webhook"]["url"] = serde_json::json!("");
        let resp: OAuthAccessResponse = serde_json::from_value(value).unwrap();
        assert!(resp.into_grant().unwrap_err().contains("incoming_webhook"));
    }

    #[test]
    fn revoked_errors_detected() {
        let revoked = AuthTestResponse {
            ok: false,
            error: Some("token_revoked".into()),
            user_id: None,
            team: None,
        };
        assert!(revoked.is_revoked());

        let other = AuthTestResponse {
            error: Some("ratelimited".into()),
            ..revoked.clone()
        };
        assert!(!other.is_revoked());
    }

    #[test]
    fn debug_hides_token() {
        let resp: OAuthAccessResponse = serde_json::from_value(full_response()).unwrap();
        assert!(!format!("{resp:?}").contains("xoxp-1"));
    }
}
