//! Configuration validation.
//!
//! Flags unknown/misspelled keys, type errors, fields missing for the active
//! delivery mode, and a few security smells (plain-http webhooks, a missing
//! or short API key).

use std::path::Path;

use secrecy::ExposeSecret;

use crate::schema::{BridgeConfig, DeliveryMode};

/// Shortest API key accepted without a warning.
const MIN_API_KEY_LEN: usize = 16;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "unused-field", "type-error",
    /// "missing-field", "security", "delivery", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "slack.clientid"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

const SLACK_KEYS: &[&str] = &[
    "teamurl",
    "clientid",
    "clientsecret",
    "webhookurl",
    "botname",
    "useslackbutton",
    "public_url",
    "preferences_url",
    "api_base_url",
    "http_timeout_secs",
    "suppress_delivery",
];
const SERVER_KEYS: &[&str] = &["bind", "port", "api_key"];
const STORAGE_KEYS: &[&str] = &["credentials_path"];
const SECTIONS: &[&str] = &["slack", "server", "storage"];

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Validate a config file at the given path, or the discovered one.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut result = validate_config(&crate::loader::apply_env_overrides(
            BridgeConfig::default(),
        ));
        result.diagnostics.insert(
            0,
            Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            ),
        );
        return result;
    };

    let value = match crate::loader::load_config_value(&actual_path) {
        Ok(v) => v,
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    e.to_string(),
                )],
                config_path: Some(actual_path),
            };
        },
    };

    let mut result = validate_value(&value);
    result.config_path = Some(actual_path);
    result
}

/// Validate an already-parsed config tree.
#[must_use]
pub fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_unknown_fields(value, &mut diagnostics);

    match serde_json::from_value::<BridgeConfig>(value.clone()) {
        Ok(config) => {
            let config = crate::loader::apply_env_overrides(config);
            diagnostics.extend(validate_config(&config).diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on a typed config.
#[must_use]
pub fn validate_config(config: &BridgeConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let slack = &config.slack;

    match slack.mode() {
        DeliveryMode::Button => {
            if slack.client_id().is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "missing-field",
                    "slack.clientid",
                    "button mode needs the app client id",
                ));
            }
            if slack.client_secret().is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "missing-field",
                    "slack.clientsecret",
                    "button mode needs the app client secret",
                ));
            }
            if slack.webhook_url().is_some() {
                diagnostics.push(Diagnostic::new(
                    Severity::Info,
                    "unused-field",
                    "slack.webhookurl",
                    "ignored in button mode",
                ));
            }
            if url::Url::parse(&slack.public_url).is_err() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "type-error",
                    "slack.public_url",
                    format!("not a valid URL: {}", slack.public_url),
                ));
            }
        },
        DeliveryMode::Direct => match slack.webhook_url() {
            None => diagnostics.push(Diagnostic::new(
                Severity::Error,
                "missing-field",
                "slack.webhookurl",
                "direct mode needs a webhook URL",
            )),
            Some(url) if url.starts_with("http://") => diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "security",
                "slack.webhookurl",
                "webhook URL is not https; messages travel in clear text",
            )),
            Some(_) => {},
        },
    }

    if let Some(team) = slack.team_url()
        && url::Url::parse(team).is_err()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "slack.teamurl",
            format!("not a valid URL: {team}"),
        ));
    }

    match config.server.api_key() {
        None => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "security",
            "server.api_key",
            "no API key: the gateway refuses every /api request",
        )),
        Some(key) if key.expose_secret().len() < MIN_API_KEY_LEN => {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "security",
                "server.api_key",
                format!("API key is shorter than {MIN_API_KEY_LEN} characters"),
            ));
        },
        Some(_) => {},
    }

    if slack.suppress_delivery {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "delivery",
            "slack.suppress_delivery",
            "all messages are dropped",
        ));
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &serde_json::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = value.as_object() else {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            "config root must be a table",
        ));
        return;
    };

    for (section, body) in root {
        let known = match section.as_str() {
            "slack" => SLACK_KEYS,
            "server" => SERVER_KEYS,
            "storage" => STORAGE_KEYS,
            _ => {
                diagnostics.push(unknown(section.clone(), section, SECTIONS, true));
                continue;
            },
        };
        let Some(table) = body.as_object() else {
            continue;
        };
        for key in table.keys() {
            if !known.contains(&key.as_str()) {
                diagnostics.push(unknown(format!("{section}.{key}"), key, known, false));
            }
        }
    }
}

fn unknown(path: String, key: &str, known: &[&str], top_level: bool) -> Diagnostic {
    let level = if top_level {
        " at top level"
    } else {
        ""
    };
    let message = match suggest(key, known, 3) {
        Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
        None => format!("unknown field{level}"),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn value(toml_src: &str) -> serde_json::Value {
        let v: toml::Value = toml::from_str(toml_src).unwrap();
        serde_json::to_value(v).unwrap()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("clientid", "clientid"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("clientdi", "clientid"), 2);
    }

    #[test]
    fn misspelled_key_gets_suggestion() {
        let result = validate_value(&value(
            "[slack]\nclientid = \"a\"\nclientsecret = \"b\"\nwebhokurl = \"x\"\n",
        ));
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .unwrap();
        assert_eq!(d.path, "slack.webhokurl");
        assert!(d.message.contains("webhookurl"));
    }

    #[test]
    fn unknown_section_is_flagged() {
        let result = validate_value(&value("[slak]\nx = 1\n"));
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.path == "slak" && d.message.contains("\"slack\""))
        );
    }

    #[test]
    fn button_mode_missing_credentials_are_errors() {
        let result = validate_config(&BridgeConfig::default());
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Error), 2);
    }

    #[test]
    fn direct_mode_plain_http_warns() {
        let mut cfg = BridgeConfig::default();
        cfg.slack.useslackbutton = false;
        cfg.slack.webhookurl = Some("http://hooks.internal/x".into());
        let result = validate_config(&cfg);
        assert!(!result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "security")
        );
    }

    #[test]
    fn api_key_missing_or_short_warns() {
        let mut cfg = BridgeConfig::default();
        let has_key_warning = |cfg: &BridgeConfig| {
            validate_config(cfg)
                .diagnostics
                .iter()
                .any(|d| d.path == "server.api_key" && d.severity == Severity::Warning)
        };
        assert!(has_key_warning(&cfg));
        cfg.server.api_key = Some(secrecy::Secret::new("short".into()));
        assert!(has_key_warning(&cfg));
        cfg.server.api_key = Some(secrecy::Secret::new("a-long-enough-host-secret".into()));
        assert!(!has_key_warning(&cfg));
    }

    #[test]
    fn type_errors_reported() {
        let result = validate_value(&value("[server]\nport = \"eighty\"\n"));
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }
}
