/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable variables are left untouched so the error surfaces later as
/// an obviously wrong value instead of an empty one.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            },
            // `${}` or an unclosed placeholder is copied literally.
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SLACK_SECRET" => Some("xyz".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("clientsecret = \"${SLACK_SECRET}\"", lookup),
            "clientsecret = \"xyz\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${SLACKBRIDGE_MISSING_XYZ}", lookup),
            "${SLACKBRIDGE_MISSING_XYZ}"
        );
    }

    #[test]
    fn unclosed_and_empty_placeholders_are_literal() {
        assert_eq!(substitute_env_with("a ${SLACK_SECRET", lookup), "a ${SLACK_SECRET");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
