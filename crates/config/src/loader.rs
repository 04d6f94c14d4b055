use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::BridgeConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "slackbridge.toml",
    "slackbridge.yaml",
    "slackbridge.yml",
    "slackbridge.json",
];

/// Prefix for environment overrides (`SLACKBRIDGE_CLIENT_ID`, ...).
const ENV_PREFIX: &str = "SLACKBRIDGE_";

/// Load config from the given path (any supported format), then apply
/// environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;
    Ok(apply_env_overrides(config))
}

/// Load and parse the config file into a generic value (used by validation).
pub fn load_config_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config_value(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./slackbridge.{toml,yaml,yml,json}`
/// 2. `~/.config/slackbridge/slackbridge.{toml,yaml,yml,json}`
///
/// Falls back to defaults (plus env overrides) when nothing is found or the
/// file fails to parse.
pub fn discover_and_load() -> BridgeConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    apply_env_overrides(BridgeConfig::default())
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/slackbridge/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "slackbridge").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory, where credentials live by default.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "slackbridge").map(|d| d.data_dir().to_path_buf())
}

/// Resolve the credentials file: explicit setting, else the data dir.
pub fn credentials_path(config: &BridgeConfig) -> PathBuf {
    config.storage.credentials_path.clone().unwrap_or_else(|| {
        data_dir()
            .unwrap_or_else(|| PathBuf::from(".slackbridge"))
            .join("credentials.json")
    })
}

/// Overlay `SLACKBRIDGE_*` environment variables onto a loaded config.
pub fn apply_env_overrides(config: BridgeConfig) -> BridgeConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Testable form of [`apply_env_overrides`].
fn apply_env_overrides_with(
    mut config: BridgeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> BridgeConfig {
    let var = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

    if let Some(v) = var("CLIENT_ID") {
        config.slack.clientid = Some(v);
    }
    if let Some(v) = var("CLIENT_SECRET") {
        config.slack.clientsecret = Some(Secret::new(v));
    }
    if let Some(v) = var("WEBHOOK_URL") {
        config.slack.webhookurl = Some(v);
    }
    if let Some(v) = var("TEAM_URL") {
        config.slack.teamurl = Some(v);
    }
    if let Some(v) = var("PUBLIC_URL") {
        config.slack.public_url = v;
    }
    if let Some(v) = var("USE_SLACK_BUTTON") {
        match parse_bool(&v) {
            Some(b) => config.slack.useslackbutton = b,
            None => warn!(value = %v, "ignoring invalid SLACKBRIDGE_USE_SLACK_BUTTON"),
        }
    }
    if let Some(v) = var("BIND") {
        config.server.bind = v;
    }
    if let Some(v) = var("PORT") {
        match v.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %v, error = %e, "ignoring invalid SLACKBRIDGE_PORT"),
        }
    }
    if let Some(v) = var("API_KEY") {
        config.server.api_key = Some(Secret::new(v));
    }
    if let Some(v) = var("CREDENTIALS_PATH") {
        config.storage.credentials_path = Some(PathBuf::from(v));
    }

    config
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serialize `config` to TOML and write it to `path`.
pub fn save_config(config: &BridgeConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BridgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slackbridge.toml");
        std::fs::write(
            &path,
            r#"
            [slack]
            clientid = "1.2"
            clientsecret = "abc"
            public_url = "https://bridge.example.com"

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.slack.client_id(), Some("1.2"));
        assert_eq!(
            cfg.slack.client_secret().map(|s| s.expose_secret().as_str()),
            Some("abc")
        );
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("slackbridge.yaml");
        std::fs::write(&yaml, "slack:\n  useslackbutton: false\n  webhookurl: https://h\n")
            .unwrap();
        let cfg = load_config(&yaml).unwrap();
        assert!(!cfg.slack.useslackbutton);

        let json = dir.path().join("slackbridge.json");
        std::fs::write(&json, r#"{"slack": {"botname": "bot"}}"#).unwrap();
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.slack.bot_name(), Some("bot"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slackbridge.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn env_overrides_apply() {
        let lookup = |name: &str| match name {
            "SLACKBRIDGE_CLIENT_ID" => Some("env-id".to_string()),
            "SLACKBRIDGE_USE_SLACK_BUTTON" => Some("off".to_string()),
            "SLACKBRIDGE_PORT" => Some("not-a-port".to_string()),
            "SLACKBRIDGE_API_KEY" => Some("host-secret".to_string()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(BridgeConfig::default(), lookup);
        assert_eq!(cfg.slack.client_id(), Some("env-id"));
        assert!(!cfg.slack.useslackbutton);
        assert_eq!(cfg.server.port, 8787);
        assert!(cfg.server.api_key().is_some());
    }

    #[test]
    fn credentials_path_prefers_explicit_setting() {
        let mut cfg = BridgeConfig::default();
        cfg.storage.credentials_path = Some(PathBuf::from("/tmp/creds.json"));
        assert_eq!(credentials_path(&cfg), PathBuf::from("/tmp/creds.json"));
    }

    #[test]
    fn save_then_load_preserves_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        let mut cfg = BridgeConfig::default();
        cfg.slack.useslackbutton = false;
        cfg.slack.webhookurl = Some("https://hooks.example.com/x".into());
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert!(!loaded.slack.useslackbutton);
        assert_eq!(
            loaded.slack.webhook_url(),
            Some("https://hooks.example.com/x")
        );
    }
}
