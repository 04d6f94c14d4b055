use {
    secrecy::{ExposeSecret, Secret},
    slackbridge_config::SiteConfig,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    Error, Result,
    types::{AuthTestResponse, OAuthAccessResponse, OAuthConfig},
};

/// Scope requested by the button: a single incoming webhook.
pub const WEBHOOK_SCOPE: &str = "incoming-webhook";

impl OAuthConfig {
    /// Build the flow settings from the site configuration. `None` when the
    /// client id or secret is missing.
    pub fn from_site(site: &SiteConfig) -> Option<Self> {
        let client_id = site.client_id()?.to_string();
        let client_secret = site.client_secret()?.clone();
        Some(Self {
            client_id,
            client_secret,
            auth_url: site.authorize_url(),
            token_url: site.api_url("oauth.access"),
            redirect_uri: site.redirect_uri(),
            scopes: vec![WEBHOOK_SCOPE.into()],
        })
    }
}

/// The "Add to Slack" authorization code flow.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Authorization URL carrying `scope`, `client_id`, `redirect_uri` and
    /// the caller-minted `state`.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url).map_err(|source| {
            Error::external(format!("invalid auth_url {}", self.config.auth_url), source)
        })?;
        url.query_pairs_mut()
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    /// Exchange an authorization code at `oauth.access`.
    ///
    /// Returns the raw response; `ok: false` is not an error at this level.
    pub async fn exchange(&self, code: &str) -> Result<OAuthAccessResponse> {
        debug!(token_url = %self.config.token_url, "exchanging authorization code");
        let query = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let resp = self
            .client
            .get(&self.config.token_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<OAuthAccessResponse>()
            .await?;

        if !resp.ok {
            warn!(error = ?resp.error, "oauth.access rejected the code");
        }
        Ok(resp)
    }
}

/// Call `auth.test` for `token`.
pub async fn auth_test(
    client: &reqwest::Client,
    url: &str,
    token: &Secret<String>,
) -> Result<AuthTestResponse> {
    let resp = client
        .get(url)
        .query(&[("token", token.expose_secret().as_str())])
        .send()
        .await?
        .error_for_status()?
        .json::<AuthTestResponse>()
        .await?;
    Ok(resp)
}
