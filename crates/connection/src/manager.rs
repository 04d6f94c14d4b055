//! Credential lifecycle and webhook delivery.
//!
//! Per user: `Unconfigured -> PendingAuthorization -> Connected`, and back to
//! `Unconfigured` when Slack reports the webhook or token revoked or the user
//! disconnects. Read-decide-write sequences on one user's record run under
//! that user's async lock.

use std::sync::Arc;

use {
    dashmap::DashMap,
    secrecy::ExposeSecret,
    serde::Serialize,
    slackbridge_config::{DeliveryMode, SiteConfig},
    slackbridge_oauth::{OAuthConfig, OAuthFlow, StateCheck, StateStore, auth_test},
    slackbridge_slackify::Transcoder,
    tokio::sync::{Mutex, OwnedMutexGuard},
    tracing::{debug, info, warn},
};

use crate::{
    cache::ValidationCache,
    credential::{DirectPreference, UserConnection, UserCredential, keys},
    error::{AuthError, SendError, StoreError},
    messages,
    payload::WebhookPayload,
    store::CredentialStore,
};

/// Body a webhook answers with once its installation has been removed.
pub const REVOKED_SENTINEL: &str = "No service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// No usable target for the user; nothing was sent.
    Skipped,
    Delivered,
    /// Slack answered with the revocation sentinel.
    Revoked,
}

/// Result of asking Slack whether a stored token still works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    NotConnected,
    Valid,
    /// Token revoked; the credential has been cleared.
    Revoked,
    /// Slack could not confirm either way (network error, rate limit, ...).
    Unknown,
}

impl ConnectionStatus {
    /// `Unknown` counts as usable so a Slack outage does not disconnect
    /// anyone.
    #[must_use]
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Valid | Self::Unknown)
    }
}

/// What the preferences screen should link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationLink {
    /// Start the "Add to Slack" flow.
    Connect { url: String },
    /// Already connected: the webhook's configuration page on Slack.
    Manage { url: String },
}

impl AuthorizationLink {
    pub fn url(&self) -> &str {
        match self {
            Self::Connect { url } | Self::Manage { url } => url,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Connect { .. } => messages::CONNECT_SLACK_ACCOUNT,
            Self::Manage { .. } => messages::MANAGE_SLACK_ACCOUNT,
        }
    }
}

struct Target {
    webhook_url: String,
    channel: Option<String>,
}

/// One user's lock. Dropping it releases the lock and forgets the map entry
/// once no other task holds or waits on it.
struct UserLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct ConnectionManager {
    site: Arc<SiteConfig>,
    store: Arc<dyn CredentialStore>,
    client: reqwest::Client,
    states: StateStore,
    transcoder: Transcoder,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConnectionManager {
    /// Build a manager with its own HTTP client, bounded by the site's
    /// `http_timeout_secs`.
    pub fn new(
        site: Arc<SiteConfig>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(site.http_timeout())
            .build()?;
        Ok(Self::with_client(site, store, client))
    }

    pub fn with_client(
        site: Arc<SiteConfig>,
        store: Arc<dyn CredentialStore>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            site,
            store,
            client,
            states: StateStore::new(),
            transcoder: Transcoder::for_payload(),
            user_locks: DashMap::new(),
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn is_using_button_flow(&self) -> bool {
        self.site.is_using_button_flow()
    }

    pub fn is_system_configured(&self) -> bool {
        self.site.is_system_configured()
    }

    /// The user's connection for the active mode. Partial records are `None`.
    pub async fn connection(&self, user_id: &str) -> Result<Option<UserConnection>, StoreError> {
        let prefs = self.store.load(user_id).await?;
        Ok(UserConnection::from_preferences(self.site.mode(), &prefs))
    }

    pub async fn is_user_configured(&self, user_id: &str) -> bool {
        match self.connection(user_id).await {
            Ok(connection) => connection.is_some(),
            Err(e) => {
                warn!(user_id, error = %e, "failed to load slack connection");
                false
            },
        }
    }

    /// Local user the session's pending authorization was started for.
    pub fn pending_user(&self, session_id: &str) -> Option<String> {
        self.states.pending_user(session_id)
    }

    /// The Slack configuration page of a connected button-mode user.
    pub async fn manage_link(
        &self,
        user_id: &str,
    ) -> Result<Option<AuthorizationLink>, StoreError> {
        Ok(match self.connection(user_id).await? {
            Some(UserConnection::Button(credential)) => Some(AuthorizationLink::Manage {
                url: credential.slack_configuration_url,
            }),
            _ => None,
        })
    }

    /// Link for the user's preferences screen: the configuration page when
    /// already connected, otherwise a fresh authorization URL whose `state`
    /// is bound to `session_id`. Refused with `MissingCredentials` when the
    /// button is disabled.
    pub async fn build_authorization_link(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<AuthorizationLink, AuthError> {
        if !self.is_using_button_flow() {
            return Err(AuthError::MissingCredentials);
        }
        if let Some(link) = self.manage_link(user_id).await? {
            return Ok(link);
        }

        let config = self.oauth_config()?;
        let state = self.states.mint(session_id, user_id);
        let url = OAuthFlow::new(config, self.client.clone())
            .authorization_url(&state)
            .map_err(AuthError::Transport)?;
        debug!(user_id, "built slack authorization link");
        Ok(AuthorizationLink::Connect { url })
    }

    /// Complete the OAuth round trip: verify `state`, exchange `code`, and
    /// store the credential.
    pub async fn issue_token(
        &self,
        cache: &mut ValidationCache,
        session_id: &str,
        code: &str,
        state: &str,
        user_id: &str,
    ) -> Result<(), AuthError> {
        match self.states.verify(session_id, state, user_id) {
            StateCheck::Valid { .. } => {},
            check => {
                warn!(user_id, ?check, "oauth callback with unexpected state");
                return Err(AuthError::InvalidState);
            },
        }

        let config = self.oauth_config()?;
        let response = OAuthFlow::new(config, self.client.clone())
            .exchange(code)
            .await
            .map_err(AuthError::Transport)?;
        let grant = response.into_grant().map_err(|reason| {
            warn!(user_id, reason = %reason, "slack rejected the token exchange");
            AuthError::provider_rejected(reason)
        })?;

        let _guard = self.lock_user(user_id).await;

        let existing = self.store.load(user_id).await?;
        if let Some(stored) = existing.get(keys::USER_ID).filter(|v| !v.is_empty())
            && *stored != grant.user_id
        {
            warn!(
                user_id,
                stored = %stored,
                received = %grant.user_id,
                "slack user does not match the stored connection"
            );
            return Err(AuthError::UserMismatch {
                stored: stored.clone(),
                received: grant.user_id,
            });
        }

        let credential = UserCredential::from(grant);
        self.store
            .save(user_id, credential.to_preferences())
            .await?;
        cache.record(user_id, true);
        info!(
            user_id,
            slack_user_id = %credential.slack_user_id,
            channel = %credential.slack_channel,
            "slack connection stored"
        );
        Ok(())
    }

    /// Deliver `message` to the user's Slack target.
    pub async fn send_message(
        &self,
        message: &str,
        user_id: &str,
    ) -> Result<DeliveryOutcome, SendError> {
        let Some(target) = self.resolve_target(user_id).await? else {
            debug!(user_id, "no slack target, skipping message");
            return Ok(DeliveryOutcome::Skipped);
        };

        let text = self.transcoder.transcode(message);
        let payload = match &target.channel {
            Some(channel) => WebhookPayload::direct(channel, self.site.bot_name(), text),
            None => WebhookPayload::text(text),
        };

        let resp = self
            .client
            .post(&target.webhook_url)
            .form(&[("payload", payload.to_json()?)])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if body.trim() == REVOKED_SENTINEL {
            match self.site.mode() {
                DeliveryMode::Button => {
                    info!(user_id, "slack webhook revoked, clearing connection");
                    self.revoke_if_current(user_id, keys::URL, &target.webhook_url)
                        .await;
                },
                DeliveryMode::Direct => {
                    warn!(user_id, "shared slack webhook answered '{REVOKED_SENTINEL}'");
                },
            }
            return Ok(DeliveryOutcome::Revoked);
        }

        if !status.is_success() {
            warn!(user_id, status = %status, body = %body, "slack webhook returned an error");
        }
        debug!(user_id, status = %status, "slack message delivered");
        Ok(DeliveryOutcome::Delivered)
    }

    /// Ask Slack whether the stored token still works. A revoked token
    /// clears the credential.
    pub async fn check_connection(&self, user_id: &str) -> ConnectionStatus {
        let credential = match self.connection(user_id).await {
            Ok(Some(UserConnection::Button(credential))) => credential,
            Ok(Some(UserConnection::Direct(_))) => return ConnectionStatus::Valid,
            Ok(None) => return ConnectionStatus::NotConnected,
            Err(e) => {
                warn!(user_id, error = %e, "failed to load slack connection");
                return ConnectionStatus::NotConnected;
            },
        };

        let url = self.site.api_url("auth.test");
        match auth_test(&self.client, &url, &credential.slack_access_token).await {
            Ok(resp) if resp.ok => ConnectionStatus::Valid,
            Ok(resp) if resp.is_revoked() => {
                info!(user_id, error = ?resp.error, "slack token revoked, clearing connection");
                self.revoke_if_current(
                    user_id,
                    keys::ACCESS_TOKEN,
                    credential.slack_access_token.expose_secret(),
                )
                .await;
                ConnectionStatus::Revoked
            },
            Ok(resp) => {
                warn!(
                    user_id,
                    error = ?resp.error,
                    "auth.test failed without revocation, keeping connection"
                );
                ConnectionStatus::Unknown
            },
            Err(e) => {
                warn!(
                    user_id,
                    error = %e,
                    transient = e.is_transient(),
                    "auth.test request failed, keeping connection"
                );
                ConnectionStatus::Unknown
            },
        }
    }

    /// `check_connection` folded to a bool and memoized in `cache` unless
    /// `force` is set.
    pub async fn validate_connection(
        &self,
        cache: &mut ValidationCache,
        user_id: &str,
        force: bool,
    ) -> bool {
        if !force && let Some(valid) = cache.get(user_id) {
            return valid;
        }
        let valid = self.check_connection(user_id).await.is_usable();
        cache.record(user_id, valid);
        valid
    }

    /// Remove the user's connection for the active mode. Storage failures
    /// are logged, never returned.
    pub async fn clear_connection(&self, user_id: &str) {
        let _guard = self.lock_user(user_id).await;
        self.remove_connection(user_id).await;
    }

    /// Store the direct-mode channel name. A blank name clears it.
    pub async fn save_username(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        let _guard = self.lock_user(user_id).await;
        match DirectPreference::new(name) {
            Some(pref) => {
                self.store
                    .save(user_id, UserConnection::Direct(pref).to_preferences())
                    .await?;
                debug!(user_id, "slack username saved");
            },
            None => {
                self.store.remove(user_id, &[keys::SLACK_USERNAME]).await?;
                debug!(user_id, "slack username cleared");
            },
        }
        Ok(())
    }

    fn oauth_config(&self) -> Result<OAuthConfig, AuthError> {
        OAuthConfig::from_site(&self.site).ok_or(AuthError::MissingCredentials)
    }

    async fn resolve_target(&self, user_id: &str) -> Result<Option<Target>, StoreError> {
        let target = match self.connection(user_id).await? {
            Some(UserConnection::Button(credential)) => Some(Target {
                webhook_url: credential.slack_url,
                channel: None,
            }),
            Some(UserConnection::Direct(pref)) => self.site.webhook_url().map(|url| Target {
                webhook_url: url.to_string(),
                channel: Some(pref.slack_slackusername),
            }),
            None => None,
        };
        Ok(target)
    }

    async fn lock_user(&self, user_id: &str) -> UserLockGuard<'_> {
        let lock = self.user_locks.entry(user_id.to_string()).or_default().clone();
        UserLockGuard {
            locks: &self.user_locks,
            user_id: user_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Clear the credential only if `key` still holds `expected`, so a
    /// connection issued while the failing call was in flight survives.
    async fn revoke_if_current(&self, user_id: &str, key: &str, expected: &str) {
        let _guard = self.lock_user(user_id).await;
        match self.store.load(user_id).await {
            Ok(prefs) if prefs.get(key).map(String::as_str) == Some(expected) => {
                self.remove_connection(user_id).await;
            },
            Ok(_) => debug!(user_id, "credential changed since the failing call, keeping it"),
            Err(e) => warn!(user_id, error = %e, "failed to load credential for revocation"),
        }
    }

    async fn remove_connection(&self, user_id: &str) {
        let keys = UserConnection::keys_for(self.site.mode());
        match self.store.remove(user_id, keys).await {
            Ok(()) => info!(user_id, "slack connection cleared"),
            Err(e) => warn!(user_id, error = %e, "failed to clear slack connection"),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    fn direct_manager() -> ConnectionManager {
        let site = SiteConfig {
            useslackbutton: false,
            webhookurl: Some("http://127.0.0.1:9/shared".into()),
            ..SiteConfig::default()
        };
        ConnectionManager::with_client(
            Arc::new(site),
            Arc::new(MemoryCredentialStore::new()),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn user_locks_are_dropped_after_use() {
        let manager = direct_manager();
        for i in 0..50 {
            let user = format!("user-{i}");
            manager.save_username(&user, "mike").await.unwrap();
            manager.clear_connection(&user).await;
        }
        assert!(manager.user_locks.is_empty());
    }

    #[tokio::test]
    async fn user_lock_survives_while_contended() {
        let manager = Arc::new(direct_manager());
        let held = manager.lock_user("7").await;

        let waiter = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.save_username("7", "mike").await })
        };
        tokio::task::yield_now().await;
        assert_eq!(manager.user_locks.len(), 1);

        drop(held);
        waiter.await.unwrap().unwrap();
        assert!(manager.user_locks.is_empty());
        assert!(manager.is_user_configured("7").await);
    }
}
