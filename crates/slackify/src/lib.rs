//! Rich-text to Slack message markup.
//!
//! Host messages arrive as loosely formed HTML. Slack wants plain text with
//! `<url|label>` links and literal line breaks, so [`slackify`] rewrites
//! anchors, turns block-level tags into newlines, escapes quotes and drops
//! every other tag.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Marks the start of a rewritten link. Private-use code points never reach
/// Slack and cannot be confused with markup by the tag stripper.
const LINK_OPEN: char = '\u{E000}';
const LINK_CLOSE: char = '\u{E001}';

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href="([^"]*)"[^>]*>(.*?)</a\s*>"#).expect("anchor pattern is valid")
});

#[allow(clippy::expect_used)]
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(?:p|div)(?:\s[^>]*)?>").expect("line break pattern is valid")
});

/// Which quote characters get a backslash prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuoteEscape {
    /// Leave quotes alone. Used when the caller serializes the text with a
    /// real JSON encoder.
    None,
    /// Escape `"` only.
    #[default]
    Double,
    /// Escape both `"` and `'`.
    DoubleAndSingle,
}

/// Configurable transcoder. [`slackify`] is `Transcoder::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transcoder {
    quotes: QuoteEscape,
}

impl Transcoder {
    #[must_use]
    pub const fn new(quotes: QuoteEscape) -> Self {
        Self { quotes }
    }

    /// Text destined for a structured JSON payload: no quote escaping.
    #[must_use]
    pub const fn for_payload() -> Self {
        Self::new(QuoteEscape::None)
    }

    /// Run the full pipeline. The order of the passes matters: links are
    /// protected first so the tag stripper cannot eat them, and placeholders
    /// are resolved last.
    #[must_use]
    pub fn transcode(&self, input: &str) -> String {
        let input: String = input
            .chars()
            .filter(|c| *c != LINK_OPEN && *c != LINK_CLOSE)
            .collect();
        let text = protect_links(&input);
        let text = break_lines(&text);
        let text = escape_quotes(&text, self.quotes);
        let text = strip_tags(&text);
        resolve_links(&text)
    }
}

/// Convert host markup into Slack-safe text, escaping double quotes.
#[must_use]
pub fn slackify(input: &str) -> String {
    Transcoder::default().transcode(input)
}

fn protect_links(text: &str) -> String {
    ANCHOR
        .replace_all(text, |caps: &Captures<'_>| {
            format!("{LINK_OPEN}{}|{}{LINK_CLOSE}", &caps[1], &caps[2])
        })
        .into_owned()
}

fn break_lines(text: &str) -> String {
    LINE_BREAK
        .replace_all(text, |caps: &Captures<'_>| {
            // Closing </p> and </div> vanish; everything else is a break.
            if caps[0].starts_with("</") {
                String::new()
            } else {
                "\n".to_string()
            }
        })
        .into_owned()
}

fn escape_quotes(text: &str, quotes: QuoteEscape) -> String {
    let escape_single = match quotes {
        QuoteEscape::None => return text.to_string(),
        QuoteEscape::Double => false,
        QuoteEscape::DoubleAndSingle => true,
    };
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if ch == '"' || (escape_single && ch == '\'') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Remove anything that looks like a tag. A `<` only opens a tag when the
/// next character could start one; `a < b` survives. Unterminated tags run
/// to the end of the input, comments run to `-->`.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let opens_tag = tail[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        if !opens_tag {
            out.push('<');
            rest = &tail[1..];
            continue;
        }
        let end = if tail.starts_with("<!--") {
            tail.find("-->").map(|i| i + 3)
        } else {
            tail.find('>').map(|i| i + 1)
        };
        match end {
            Some(end) => rest = &tail[end..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}

fn resolve_links(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            LINK_OPEN => '<',
            LINK_CLOSE => '>',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("plain text", "plain text")]
    #[case("A<br>B<p>C</p>", "A\nB\nC")]
    #[case("<span>X</span><b>Y</b>", "XY")]
    #[case(r#"say "hi""#, r#"say \"hi\""#)]
    #[case(r#"<a href="U">T</a>"#, "<U|T>")]
    #[case("a < b", "a < b")]
    #[case("x <unterminated", "x ")]
    #[case("before<!-- a > b -->after", "beforeafter")]
    fn slackify_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slackify(input), expected);
    }

    #[test]
    fn rewrites_links_and_drops_other_attributes() {
        let input = r#"Test link - <a href="http://somelink.com/somelink.html" attr="otherattr">Some link text</a>"#;
        assert_eq!(
            slackify(input),
            "Test link - <http://somelink.com/somelink.html|Some link text>"
        );
    }

    #[test]
    fn block_tags_become_line_breaks() {
        let input = "First line<br>Second line<br /><p>Third line</p><div>Fourth line</div>";
        assert_eq!(
            slackify(input),
            "First line\nSecond line\n\nThird line\nFourth line"
        );
    }

    #[test]
    fn paragraph_with_attributes_breaks() {
        assert_eq!(slackify(r#"a<p class="x">b</p>"#), "a\nb");
        assert_eq!(slackify("a<DIV>b</DIV>"), "a\nb");
    }

    #[test]
    fn other_p_prefixed_tags_are_stripped_not_broken() {
        assert_eq!(slackify("a<pre>b</pre>"), "ab");
    }

    #[test]
    fn single_quotes_kept_by_default() {
        let input = "Single quote - '. Double quote - \".";
        assert_eq!(slackify(input), "Single quote - '. Double quote - \\\".");
    }

    #[test]
    fn strict_mode_escapes_single_quotes() {
        let t = Transcoder::new(QuoteEscape::DoubleAndSingle);
        assert_eq!(t.transcode("it's \"x\""), "it\\'s \\\"x\\\"");
    }

    #[test]
    fn payload_mode_leaves_quotes() {
        let t = Transcoder::for_payload();
        assert_eq!(t.transcode(r#"<b>"q"</b>"#), r#""q""#);
    }

    #[test]
    fn quotes_inside_links_are_escaped_once() {
        assert_eq!(
            slackify(r#"<a href="http://x.test">say "hi"</a>"#),
            r#"<http://x.test|say \"hi\">"#
        );
    }

    #[test]
    fn tags_inside_link_text_are_stripped() {
        assert_eq!(
            slackify(r#"<a href="http://x.test"><b>bold</b></a>"#),
            "<http://x.test|bold>"
        );
    }

    #[test]
    fn anchors_do_not_span_lines() {
        let input = "<a href=\"http://x.test\">one\ntwo</a>";
        assert_eq!(slackify(input), "one\ntwo");
    }

    #[test]
    fn placeholder_characters_in_input_are_dropped() {
        let input = format!("a{LINK_OPEN}b{LINK_CLOSE}c");
        assert_eq!(slackify(&input), "abc");
    }

    #[test]
    fn composition_over_balanced_fragments() {
        let parts = [
            r#"Test link - <a href="http://somelink.com/somelink.html" attr="otherattr">Some link text</a>"#,
            "First line<br>Second line<br /><p>Third line</p><div>Fourth line</div>",
            "Single quote - '. Double quote - \".",
            "<span>Some text</span>. Some <b>other</b> text.",
        ];
        let joined: String = parts.concat();
        let piecewise: String = parts.iter().map(|p| slackify(p)).collect();
        assert_eq!(slackify(&joined), piecewise);
    }
}
