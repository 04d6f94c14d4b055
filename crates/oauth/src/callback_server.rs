use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    axum::{Router, extract::Query, response::Html, routing::get},
    slackbridge_config::CALLBACK_PATH,
    tokio::sync::oneshot,
};

use crate::{Error, Result};

/// One-shot local listener for the OAuth callback, used when connecting a
/// user from the command line without a running gateway.
pub struct CallbackServer;

impl CallbackServer {
    /// Listen on `127.0.0.1:{port}` for a GET `/slackconnect` carrying `code`
    /// and `state`. The state must equal `expected_state`. Returns the code.
    pub async fn wait_for_code(
        port: u16,
        expected_state: String,
        timeout: Duration,
    ) -> Result<String> {
        let (tx, rx) = oneshot::channel::<std::result::Result<String, String>>();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let app = Router::new().route(
            CALLBACK_PATH,
            get(move |Query(params): Query<HashMap<String, String>>| {
                let tx = tx.lock().unwrap_or_else(|e| e.into_inner()).take();
                async move {
                    let result = check_params(&params, &expected_state);
                    let page = match &result {
                        Ok(_) => "<h1>Slack connected</h1><p>You can close this window.</p>"
                            .to_string(),
                        Err(e) => format!("<h1>Slack connection failed</h1><p>{e}</p>"),
                    };
                    if let Some(tx) = tx {
                        let _ = tx.send(result);
                    }
                    Html(page)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let server = axum::serve(listener, app);

        tokio::select! {
            result = rx => {
                let result = result.map_err(|_| Error::message("callback channel closed"))?;
                result.map_err(Error::Message)
            }
            _ = server.into_future() => {
                Err(Error::message("callback server exited unexpectedly"))
            }
            _ = tokio::time::sleep(timeout) => {
                Err(Error::message(format!(
                    "OAuth callback timed out after {} seconds",
                    timeout.as_secs()
                )))
            }
        }
    }
}

fn check_params(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> std::result::Result<String, String> {
    if let Some(error) = params.get("error") {
        return Err(format!("authorization denied: {error}"));
    }
    let state = params.get("state").ok_or("missing state")?;
    if state != expected_state {
        return Err("unexpected state variable".into());
    }
    let code = params.get("code").ok_or("missing code")?;
    Ok(code.clone())
}
