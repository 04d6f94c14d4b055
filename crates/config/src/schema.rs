/// Config schema types (Slack site settings, HTTP server, credential storage).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default Slack Web API base. Overridable so tests can point at a mock.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Host that serves `/oauth/authorize` when no team URL is configured.
pub const DEFAULT_AUTHORIZE_HOST: &str = "https://slack.com";

/// Path of the OAuth callback endpoint, appended to `public_url`.
pub const CALLBACK_PATH: &str = "/slackconnect";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub slack: SiteConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// Site-level Slack settings. Loaded once, never mutated while serving.
///
/// Field names follow the plugin setting keys (`clientid`, `webhookurl`, ...)
/// so existing installations can copy their values verbatim.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Workspace URL, e.g. `https://myteam.slack.com`. When set, the
    /// authorization redirect goes to this host instead of `slack.com`.
    pub teamurl: Option<String>,

    /// App client id (button mode).
    pub clientid: Option<String>,

    /// App client secret (button mode).
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub clientsecret: Option<Secret<String>>,

    /// Shared incoming webhook (direct mode).
    pub webhookurl: Option<String>,

    /// Username the integration posts as (direct mode only).
    pub botname: Option<String>,

    /// Users connect through the "Add to Slack" button.
    pub useslackbutton: bool,

    /// Externally reachable base URL of this service. The OAuth callback is
    /// `{public_url}/slackconnect`.
    pub public_url: String,

    /// Where the browser lands after a successful connection.
    pub preferences_url: Option<String>,

    pub api_base_url: String,

    /// Timeout applied to every outbound call (token exchange, webhook,
    /// auth test).
    pub http_timeout_secs: u64,

    /// Drop every outgoing message without contacting Slack. Meant for
    /// development copies of a production site.
    pub suppress_delivery: bool,
}

impl std::fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteConfig")
            .field("teamurl", &self.teamurl)
            .field("clientid", &self.clientid)
            .field(
                "clientsecret",
                &self.clientsecret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("webhookurl", &self.webhookurl.as_ref().map(|_| "[REDACTED]"))
            .field("botname", &self.botname)
            .field("useslackbutton", &self.useslackbutton)
            .field("public_url", &self.public_url)
            .field("preferences_url", &self.preferences_url)
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("suppress_delivery", &self.suppress_delivery)
            .finish()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            teamurl: None,
            clientid: None,
            clientsecret: None,
            webhookurl: None,
            botname: None,
            useslackbutton: true,
            public_url: "http://127.0.0.1:8787".into(),
            preferences_url: None,
            api_base_url: DEFAULT_API_BASE_URL.into(),
            http_timeout_secs: 10,
            suppress_delivery: false,
        }
    }
}

/// Delivery mode selected by `useslackbutton`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Per-user webhooks issued through OAuth.
    Button,
    /// One shared webhook, per-user channel name.
    Direct,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Button => write!(f, "button"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl SiteConfig {
    #[must_use]
    pub fn is_using_button_flow(&self) -> bool {
        self.useslackbutton
    }

    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        if self.useslackbutton {
            DeliveryMode::Button
        } else {
            DeliveryMode::Direct
        }
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        non_empty(self.clientid.as_deref())
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&Secret<String>> {
        self.clientsecret
            .as_ref()
            .filter(|s| !s.expose_secret().trim().is_empty())
    }

    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        non_empty(self.webhookurl.as_deref())
    }

    #[must_use]
    pub fn bot_name(&self) -> Option<&str> {
        non_empty(self.botname.as_deref())
    }

    #[must_use]
    pub fn team_url(&self) -> Option<&str> {
        non_empty(self.teamurl.as_deref())
    }

    #[must_use]
    pub fn preferences_url(&self) -> Option<&str> {
        non_empty(self.preferences_url.as_deref())
    }

    /// True when the fields required by the active mode are present.
    #[must_use]
    pub fn is_system_configured(&self) -> bool {
        match self.mode() {
            DeliveryMode::Button => self.client_id().is_some() && self.client_secret().is_some(),
            DeliveryMode::Direct => self.webhook_url().is_some(),
        }
    }

    /// The OAuth callback URL handed to Slack.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.public_url.trim_end_matches('/'))
    }

    /// `https://<provider>/oauth/authorize`.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        let host = self.team_url().unwrap_or(DEFAULT_AUTHORIZE_HOST);
        format!("{}/oauth/authorize", host.trim_end_matches('/'))
    }

    #[must_use]
    pub fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,

    /// Shared secret the host presents as `Authorization: Bearer <key>` on
    /// `/api/*`. Also signs the browser connect links. Without it the API
    /// refuses every request.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
            api_key: None,
        }
    }
}

impl ServerConfig {
    /// The API key, ignoring blank values.
    #[must_use]
    pub fn api_key(&self) -> Option<&Secret<String>> {
        self.api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
    }
}

/// Where per-user credentials are persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding per-user credentials. Defaults to
    /// `<data dir>/credentials.json`.
    pub credentials_path: Option<PathBuf>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Serialize an `Option<Secret<String>>` by exposing its inner value.
/// Only used when writing the config back to disk.
fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn button_config() -> SiteConfig {
        SiteConfig {
            clientid: Some("123.456".into()),
            clientsecret: Some(Secret::new("s3cret".into())),
            public_url: "https://bridge.example.com/".into(),
            ..SiteConfig::default()
        }
    }

    #[test]
    fn blank_api_key_is_unset() {
        let mut server = ServerConfig::default();
        assert!(server.api_key().is_none());
        server.api_key = Some(Secret::new(" ".into()));
        assert!(server.api_key().is_none());
        server.api_key = Some(Secret::new("k".repeat(32)));
        assert!(server.api_key().is_some());
    }

    #[test]
    fn button_mode_requires_client_credentials() {
        let mut cfg = button_config();
        assert!(cfg.is_system_configured());
        cfg.clientsecret = Some(Secret::new("  ".into()));
        assert!(!cfg.is_system_configured());
    }

    #[test]
    fn direct_mode_requires_webhook() {
        let mut cfg = SiteConfig {
            useslackbutton: false,
            ..SiteConfig::default()
        };
        assert!(!cfg.is_system_configured());
        cfg.webhookurl = Some("https://hooks.slack.com/services/T/B/X".into());
        assert!(cfg.is_system_configured());
        assert_eq!(cfg.mode(), DeliveryMode::Direct);
    }

    #[test]
    fn redirect_uri_trims_trailing_slash() {
        assert_eq!(
            button_config().redirect_uri(),
            "https://bridge.example.com/slackconnect"
        );
    }

    #[test]
    fn authorize_url_prefers_team_url() {
        let mut cfg = button_config();
        assert_eq!(cfg.authorize_url(), "https://slack.com/oauth/authorize");
        cfg.teamurl = Some("https://myteam.slack.com/".into());
        assert_eq!(
            cfg.authorize_url(),
            "https://myteam.slack.com/oauth/authorize"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", button_config());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn deserializes_plugin_keys() {
        let cfg: BridgeConfig = toml::from_str(
            r#"
            [slack]
            useslackbutton = false
            webhookurl = "https://hooks.slack.com/services/T/B/X"
            botname = "Moodle"
            "#,
        )
        .unwrap();
        assert!(!cfg.slack.is_using_button_flow());
        assert_eq!(cfg.slack.bot_name(), Some("Moodle"));
        assert_eq!(cfg.slack.http_timeout_secs, 10);
        assert_eq!(cfg.server.port, 8787);
    }
}
