//! Per-user operations run directly against the credential store, without a
//! gateway.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    slackbridge_config::{BridgeConfig, credentials_path},
    slackbridge_connection::{
        AuthorizationLink, ConnectionManager, ConnectionStatus, FileCredentialStore,
        MessageProcessor, OutgoingMessage, Recipient, ValidationCache,
    },
    slackbridge_oauth::{CallbackServer, generate_session_id},
    tracing::debug,
};

/// How long `link` waits for the browser to come back.
const LINK_TIMEOUT: Duration = Duration::from_secs(300);

fn manager(config: &BridgeConfig) -> Result<Arc<ConnectionManager>> {
    let path = credentials_path(config);
    debug!(path = %path.display(), "using credential store");
    let store = Arc::new(FileCredentialStore::new(path));
    let manager = ConnectionManager::new(Arc::new(config.slack.clone()), store)
        .context("failed to build HTTP client")?;
    Ok(Arc::new(manager))
}

pub async fn send(config: &BridgeConfig, user_id: &str, message: &str) -> Result<()> {
    let processor = MessageProcessor::new(manager(config)?);
    if !processor.is_system_configured() {
        eprintln!("{}", slackbridge_connection::messages::NOT_CONFIGURED);
    }
    let sent = processor
        .send(&OutgoingMessage {
            recipient: Recipient::new(user_id),
            subject: None,
            full_message: message.to_string(),
            full_message_html: None,
        })
        .await;
    if !sent {
        bail!("delivery to {user_id} failed; see the log for details");
    }
    println!("ok");
    Ok(())
}

/// Run the button flow with a one-shot callback listener on
/// `127.0.0.1:{port}`. The Slack app must accept that redirect URI.
pub async fn link(config: &BridgeConfig, user_id: &str, port: u16) -> Result<()> {
    let mut config = config.clone();
    config.slack.public_url = format!("http://127.0.0.1:{port}");
    let manager = manager(&config)?;
    if !manager.is_using_button_flow() {
        bail!("the slack button is disabled; use set-username instead");
    }

    let session_id = generate_session_id();
    let url = match manager
        .build_authorization_link(user_id, &session_id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?
    {
        AuthorizationLink::Connect { url } => url,
        AuthorizationLink::Manage { url } => {
            println!("{user_id} is already connected. Manage the connection at:\n{url}");
            return Ok(());
        },
    };
    let state = url::Url::parse(&url)?
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .context("authorization URL has no state")?;

    println!("Opening browser to connect Slack...");
    if open::that(&url).is_err() {
        println!("Could not open browser. Please visit:\n{url}");
    }
    println!("Waiting for callback on {} ...", config.slack.redirect_uri());
    let code = CallbackServer::wait_for_code(port, state.clone(), LINK_TIMEOUT).await?;

    let mut cache = ValidationCache::new();
    manager
        .issue_token(&mut cache, &session_id, &code, &state, user_id)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;
    println!("Connected Slack for {user_id}");
    Ok(())
}

pub async fn validate(config: &BridgeConfig, user_id: &str) -> Result<()> {
    let status = manager(config)?.check_connection(user_id).await;
    let label = match status {
        ConnectionStatus::NotConnected => "not connected",
        ConnectionStatus::Valid => "valid",
        ConnectionStatus::Revoked => "revoked (connection cleared)",
        ConnectionStatus::Unknown => "unknown (slack could not confirm; kept)",
    };
    println!("{user_id}: {label}");
    Ok(())
}

pub async fn disconnect(config: &BridgeConfig, user_id: &str) -> Result<()> {
    manager(config)?.clear_connection(user_id).await;
    println!("Disconnected {user_id}");
    Ok(())
}

pub async fn set_username(config: &BridgeConfig, user_id: &str, name: &str) -> Result<()> {
    let manager = manager(config)?;
    if manager.is_using_button_flow() {
        bail!("usernames are only used when the slack button is disabled");
    }
    manager.save_username(user_id, name).await?;
    if manager.is_user_configured(user_id).await {
        println!("Saved Slack username for {user_id}");
    } else {
        println!("Cleared Slack username for {user_id}");
    }
    Ok(())
}
