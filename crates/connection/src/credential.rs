//! Per-user connection records and their flat key/value form.

use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    slackbridge_config::DeliveryMode,
    slackbridge_oauth::{TokenGrant, serialize_secret},
};

/// A user's stored preferences, as persisted by a [`crate::CredentialStore`].
pub type Preferences = HashMap<String, String>;

/// Preference keys.
pub mod keys {
    pub const USER_ID: &str = "slack_user_id";
    pub const ACCESS_TOKEN: &str = "slack_access_token";
    pub const CHANNEL: &str = "slack_channel";
    pub const CHANNEL_ID: &str = "slack_channel_id";
    pub const CONFIGURATION_URL: &str = "slack_configuration_url";
    pub const URL: &str = "slack_url";
    pub const SLACK_USERNAME: &str = "slack_slackusername";

    /// Everything a button-mode credential is made of.
    pub const CREDENTIAL: &[&str] = &[
        USER_ID,
        ACCESS_TOKEN,
        CHANNEL,
        CHANNEL_ID,
        CONFIGURATION_URL,
        URL,
    ];
}

/// Button-mode credential issued by `oauth.access`. Stored and removed as a
/// whole.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub slack_user_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub slack_access_token: Secret<String>,
    pub slack_channel: String,
    pub slack_channel_id: String,
    pub slack_configuration_url: String,
    /// The user's incoming webhook.
    pub slack_url: String,
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("slack_user_id", &self.slack_user_id)
            .field("slack_access_token", &"[REDACTED]")
            .field("slack_channel", &self.slack_channel)
            .field("slack_channel_id", &self.slack_channel_id)
            .field("slack_configuration_url", &self.slack_configuration_url)
            .field("slack_url", &"[REDACTED]")
            .finish()
    }
}

impl From<TokenGrant> for UserCredential {
    fn from(grant: TokenGrant) -> Self {
        let hook = grant.incoming_webhook;
        Self {
            slack_user_id: grant.user_id,
            slack_access_token: grant.access_token,
            slack_channel: hook.channel,
            slack_channel_id: hook.channel_id,
            slack_configuration_url: hook.configuration_url,
            slack_url: hook.url,
        }
    }
}

impl UserCredential {
    /// `None` unless all six fields are present and non-empty.
    pub fn from_preferences(prefs: &Preferences) -> Option<Self> {
        let get = |key: &str| {
            prefs
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };
        Some(Self {
            slack_user_id: get(keys::USER_ID)?,
            slack_access_token: Secret::new(get(keys::ACCESS_TOKEN)?),
            slack_channel: get(keys::CHANNEL)?,
            slack_channel_id: get(keys::CHANNEL_ID)?,
            slack_configuration_url: get(keys::CONFIGURATION_URL)?,
            slack_url: get(keys::URL)?,
        })
    }

    pub fn to_preferences(&self) -> Preferences {
        [
            (keys::USER_ID, self.slack_user_id.clone()),
            (
                keys::ACCESS_TOKEN,
                self.slack_access_token.expose_secret().clone(),
            ),
            (keys::CHANNEL, self.slack_channel.clone()),
            (keys::CHANNEL_ID, self.slack_channel_id.clone()),
            (
                keys::CONFIGURATION_URL,
                self.slack_configuration_url.clone(),
            ),
            (keys::URL, self.slack_url.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Direct-mode preference: the channel (usually `@username`) the shared
/// webhook posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectPreference {
    pub slack_slackusername: String,
}

impl DirectPreference {
    /// Normalize to a leading `@`. Blank names yield `None`.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches('@').trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            slack_slackusername: format!("@{name}"),
        })
    }

    pub fn channel(&self) -> &str {
        &self.slack_slackusername
    }
}

/// The connection shape for the installation's delivery mode.
#[derive(Debug, Clone)]
pub enum UserConnection {
    Button(UserCredential),
    Direct(DirectPreference),
}

impl UserConnection {
    /// Read the shape `mode` selects. Partial records load as `None`.
    pub fn from_preferences(mode: DeliveryMode, prefs: &Preferences) -> Option<Self> {
        match mode {
            DeliveryMode::Button => UserCredential::from_preferences(prefs).map(Self::Button),
            DeliveryMode::Direct => prefs
                .get(keys::SLACK_USERNAME)
                .and_then(|name| DirectPreference::new(name))
                .map(Self::Direct),
        }
    }

    pub fn to_preferences(&self) -> Preferences {
        match self {
            Self::Button(credential) => credential.to_preferences(),
            Self::Direct(pref) => Preferences::from([(
                keys::SLACK_USERNAME.to_string(),
                pref.slack_slackusername.clone(),
            )]),
        }
    }

    /// Keys owned by `mode`.
    pub fn keys_for(mode: DeliveryMode) -> &'static [&'static str] {
        match mode {
            DeliveryMode::Button => keys::CREDENTIAL,
            DeliveryMode::Direct => &[keys::SLACK_USERNAME],
        }
    }
}
