//! Percent-encoding helpers for wiki titles, URLs and section anchors.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::LazyLock;

/// Bytes MediaWiki escapes when building page URLs and section anchors.
const TITLE_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b'/')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b',')
    .remove(b';')
    .remove(b'~');

static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("static regex"));

static ESCAPE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:%[0-9A-Fa-f]{2})+").expect("static regex"));

/// Decode percent-escapes without ever failing.
///
/// Runs of well-formed `%XX` escapes are decoded as UTF-8. Bytes of a run that
/// do not form valid UTF-8 keep their original escaped spelling, and anything
/// that is not a well-formed escape is copied through untouched. Decoding an
/// already-decoded string is a no-op unless it still contains escapes.
pub fn partial_decode(input: &str) -> String {
    ESCAPE_RUN
        .replace_all(input, |captures: &regex::Captures| {
            let original = &captures[0];
            let run: Vec<u8> = percent_decode_str(original).collect();
            let mut out = String::with_capacity(original.len());
            push_decoded_run(&mut out, &run, original);
            out
        })
        .into_owned()
}

/// Append a decoded run of escapes, re-emitting invalid UTF-8 in its original form.
fn push_decoded_run(out: &mut String, mut run: &[u8], mut original: &str) {
    loop {
        match std::str::from_utf8(run) {
            Ok(valid) => {
                out.push_str(valid);
                return;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                // Slicing is safe: every decoded byte came from a three byte escape.
                out.push_str(std::str::from_utf8(&run[..valid_up_to]).unwrap_or_default());
                let invalid_len = err.error_len().unwrap_or(run.len() - valid_up_to);
                let skip = valid_up_to + invalid_len;
                out.push_str(&original[valid_up_to * 3..skip * 3]);
                run = &run[skip..];
                original = &original[skip * 3..];
            }
        }
    }
}

/// Strict decode of a URL path segment. Returns `None` for malformed escapes or
/// escapes that do not decode to UTF-8.
pub fn strict_decode(input: &str) -> Option<String> {
    if input.matches('%').count() != ESCAPE.find_iter(input).count() {
        return None;
    }
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Encode a page title for use in a URL path, MediaWiki style.
pub fn encode_title(title: &str, space_replacement: &str) -> String {
    utf8_percent_encode(&title.replace(' ', space_replacement), TITLE_ESCAPES).to_string()
}

/// Encode a section name for use as a URL fragment.
pub fn to_section(fragment: &str, space_replacement: &str) -> String {
    utf8_percent_encode(&fragment.trim().replace(' ', space_replacement), TITLE_ESCAPES).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_decode_plain_escapes() {
        assert_eq!(partial_decode("Some%20Page"), "Some Page");
        assert_eq!(partial_decode("%C3%A9t%C3%A9"), "été");
    }

    #[test]
    fn test_partial_decode_leaves_malformed_input() {
        assert_eq!(partial_decode("100%"), "100%");
        assert_eq!(partial_decode("50%zz off"), "50%zz off");
        assert_eq!(partial_decode("%"), "%");
        assert_eq!(partial_decode("%4"), "%4");
    }

    #[test]
    fn test_partial_decode_keeps_invalid_utf8_escaped() {
        assert_eq!(partial_decode("a%FFb"), "a%FFb");
        assert_eq!(partial_decode("%C3%A9%FF%41"), "é%FFA");
        // Truncated multi-byte sequence at the end of a run
        assert_eq!(partial_decode("x%C3"), "x%C3");
    }

    #[test]
    fn test_partial_decode_is_idempotent_on_decoded_text() {
        let decoded = partial_decode("Main%20Page%20100%");
        assert_eq!(decoded, "Main Page 100%");
        assert_eq!(partial_decode(&decoded), decoded);
    }

    #[test]
    fn test_strict_decode() {
        assert_eq!(strict_decode("Some_Page").as_deref(), Some("Some_Page"));
        assert_eq!(strict_decode("A%2FB").as_deref(), Some("A/B"));
        assert_eq!(strict_decode("100%"), None);
        assert_eq!(strict_decode("%FF"), None);
        assert_eq!(strict_decode("%zz%41"), None);
        assert_eq!(strict_decode("%c3%a9t%C3%A9").as_deref(), Some("été"));
    }

    #[test]
    fn test_encode_title() {
        assert_eq!(encode_title("Main Page", "_"), "Main_Page");
        assert_eq!(encode_title("User:Foo/Bar", "_"), "User:Foo/Bar");
        assert_eq!(encode_title("A&B?", "_"), "A%26B%3F");
        assert_eq!(encode_title("Été", "_"), "%C3%89t%C3%A9");
    }

    #[test]
    fn test_to_section() {
        assert_eq!(to_section(" Early life ", "_"), "Early_life");
        assert_eq!(to_section("1.2 Notes", "_"), "1.2_Notes");
        assert_eq!(to_section("Q&A", "_"), "Q%26A");
    }
}
