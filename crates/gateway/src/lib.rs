//! HTTP surface: the `/slackconnect` OAuth callback, the browser connect
//! entry point, and the host-facing JSON API behind a bearer API key.

pub mod api_routes;
pub mod auth;
pub mod connect_routes;
pub mod server;
pub mod state;

pub use {
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
