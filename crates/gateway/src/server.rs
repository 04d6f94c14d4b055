use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        middleware,
        response::{IntoResponse, Json},
        routing::{delete, get, post, put},
    },
    slackbridge_config::{BridgeConfig, CALLBACK_PATH, credentials_path},
    slackbridge_connection::{ConnectionManager, FileCredentialStore},
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{
    api_routes::{
        connect_link_handler, disconnect_handler, notify_handler, status_handler,
        username_handler,
    },
    auth::require_api_key,
    connect_routes::{CONNECT_PATH, callback_handler, connect_handler},
    state::GatewayState,
};

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let api = Router::new()
        .route("/notify", post(notify_handler))
        .route("/users/{user}/connect-link", post(connect_link_handler))
        .route("/users/{user}/status", get(status_handler))
        .route("/users/{user}/connection", delete(disconnect_handler))
        .route("/users/{user}/username", put(username_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route(CONNECT_PATH, get(connect_handler))
        .route(CALLBACK_PATH, get(callback_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway with a file-backed credential store.
pub async fn start_gateway(config: BridgeConfig) -> anyhow::Result<()> {
    let store_path = credentials_path(&config);
    let store = Arc::new(FileCredentialStore::new(store_path.clone()));
    let site = Arc::new(config.slack);

    if !site.is_system_configured() {
        warn!(mode = %site.mode(), "slack is not configured; messages will be skipped");
    }

    let api_key = config.server.api_key().cloned();
    if api_key.is_none() {
        warn!("server.api_key is not set; /api and connect links refuse every request");
    }

    let manager = Arc::new(ConnectionManager::new(Arc::clone(&site), store)?);
    let app = build_gateway_app(GatewayState::new(manager, api_key));

    let listener =
        tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(
        %addr,
        mode = %site.mode(),
        credentials = %store_path.display(),
        callback = %site.redirect_uri(),
        "slackbridge gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("slackbridge gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "mode": state.manager.site().mode(),
        "configured": state.manager.is_system_configured(),
    }))
}
