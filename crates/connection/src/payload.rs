use serde::Serialize;

/// Incoming-webhook message body, sent as the `payload` form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub text: String,
}

impl WebhookPayload {
    /// Button mode: the webhook already targets the user's channel.
    pub fn text(text: String) -> Self {
        Self {
            channel: None,
            username: None,
            text,
        }
    }

    /// Direct mode: shared webhook, explicit channel and optional bot name.
    pub fn direct(channel: &str, username: Option<&str>, text: String) -> Self {
        Self {
            channel: Some(channel.to_string()),
            username: username.map(str::to_string),
            text,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_payload_is_text_only() {
        let json = WebhookPayload::text("hi".into()).to_json().unwrap();
        assert_eq!(json, r#"{"text":"hi"}"#);
    }

    #[test]
    fn direct_payload_keeps_field_order() {
        let json = WebhookPayload::direct("@mike", Some("Moodle"), "say \"hi\"".into())
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"channel":"@mike","username":"Moodle","text":"say \"hi\""}"#
        );

        let json = WebhookPayload::direct("@mike", None, "x".into())
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"channel":"@mike","text":"x"}"#);
    }
}
