#![allow(clippy::unwrap_used, clippy::expect_used)]
use {
    secrecy::{ExposeSecret, Secret},
    slackbridge_config::SiteConfig,
    slackbridge_oauth::{OAuthConfig, OAuthFlow, auth_test},
};

fn site(api_base: &str) -> SiteConfig {
    SiteConfig {
        clientid: Some("167842963185.169586326049".into()),
        clientsecret: Some(Secret::new("app-secret".into())),
        public_url: "https://bridge.example.com".into(),
        api_base_url: api_base.into(),
        ..SiteConfig::default()
    }
}

#[test]
fn oauth_config_requires_client_credentials() {
    let mut cfg = site("https://slack.com/api");
    assert!(OAuthConfig::from_site(&cfg).is_some());
    cfg.clientsecret = None;
    assert!(OAuthConfig::from_site(&cfg).is_none());
}

#[test]
fn authorization_url_has_required_params() {
    let config = OAuthConfig::from_site(&site("https://slack.com/api")).unwrap();
    let flow = OAuthFlow::new(config, reqwest::Client::new());
    let url = flow.authorization_url("state-123").unwrap();

    let url = url::Url::parse(&url).expect("should be valid URL");
    assert_eq!(url.scheme(), "https");
    assert_eq!(url.host_str(), Some("slack.com"));
    assert_eq!(url.path(), "/oauth/authorize");

    let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
    assert_eq!(
        params.get("scope").map(|v| v.as_ref()),
        Some("incoming-webhook")
    );
    assert_eq!(
        params.get("client_id").map(|v| v.as_ref()),
        Some("167842963185.169586326049")
    );
    assert_eq!(
        params.get("redirect_uri").map(|v| v.as_ref()),
        Some("https://bridge.example.com/slackconnect")
    );
    assert_eq!(params.get("state").map(|v| v.as_ref()), Some("state-123"));
    assert!(!params.contains_key("client_secret"));
}

#[tokio::test]
async fn exchange_sends_code_and_parses_grant() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/oauth.access")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("client_id".into(), "167842963185.169586326049".into()),
            mockito::Matcher::UrlEncoded("client_secret".into(), "app-secret".into()),
            mockito::Matcher::UrlEncoded("code".into(), "the-code".into()),
            mockito::Matcher::UrlEncoded(
                "redirect_uri".into(),
                "https://bridge.example.com/slackconnect".into(),
            ),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "ok": true,
                "access_token": "xoxp-abc",
                "user_id": "U1",
                "team_name": "Team",
                "team_id": "T1",
                "incoming_webhook": {
                    "channel": "@me",
                    "channel_id": "D1",
                    "configuration_url": "https://team.slack.com/services/B1",
                    "url": "https://hooks.slack.com/services/T1/B1/x"
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let config = OAuthConfig::from_site(&site(&server.url())).unwrap();
    let flow = OAuthFlow::new(config, reqwest::Client::new());
    let grant = flow.exchange("the-code").await.unwrap().into_grant().unwrap();

    assert_eq!(grant.user_id, "U1");
    assert_eq!(grant.access_token.expose_secret(), "xoxp-abc");
    assert_eq!(grant.incoming_webhook.channel, "@me");
    mock.assert_async().await;
}

#[tokio::test]
async fn exchange_http_error_is_err() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/oauth.access")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let config = OAuthConfig::from_site(&site(&server.url())).unwrap();
    let flow = OAuthFlow::new(config, reqwest::Client::new());
    assert!(flow.exchange("x").await.is_err());
}

#[tokio::test]
async fn auth_test_reports_revocation() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/auth.test")
        .match_query(mockito::Matcher::UrlEncoded(
            "token".into(),
            "xoxp-old".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": false, "error": "token_revoked"}"#)
        .create_async()
        .await;

    let resp = auth_test(
        &reqwest::Client::new(),
        &format!("{}/auth.test", server.url()),
        &Secret::new("xoxp-old".into()),
    )
    .await
    .unwrap();
    assert!(resp.is_revoked());
    mock.assert_async().await;
}
