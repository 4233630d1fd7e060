//! Text cleaning applied to payload values right before they are written.
//!
//! The rules follow the host platform's plain-text field cleaner so that a
//! journal line never carries markup, control whitespace or percent-encoded
//! octets, whatever the caller handed in.

use crate::record::Payload;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Keys whose values are stored verbatim (as strings) instead of cleaned.
pub const VERBATIM_KEYS: [&str; 2] = ["ip", "ip_hash"];

/// Clean every value of `payload`. Keys are kept as-is.
pub fn sanitize_payload(payload: &Payload) -> Payload {
    payload
        .iter()
        .map(|(key, value)| {
            let clean = if VERBATIM_KEYS.contains(&key.as_str()) {
                Value::String(verbatim_string(value))
            } else {
                sanitize_value(value)
            };
            (key.clone(), clean)
        })
        .collect()
}

/// Strings are cleaned, containers are cleaned element-wise, other
/// scalars pass through unchanged.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn verbatim_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Runs of line breaks, tabs and spaces.
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n\t ]+").unwrap_or_else(|_| unreachable!()));

static SCRIPT_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</script").unwrap_or_else(|_| unreachable!()));

static STYLE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</style").unwrap_or_else(|_| unreachable!()));

/// Clean a single line of user-supplied text.
///
/// Tags are removed (together with the body of `script`/`style`
/// elements), an unclosed `<` becomes `&lt;`, runs of CR/LF/tab/space
/// collapse to one space, `%XX` octets are removed until none are left,
/// and the result is trimmed. Runs in time linear in the input length.
pub fn sanitize_text(input: &str) -> String {
    let stripped = if input.contains('<') {
        strip_tags(input)
    } else {
        input.to_string()
    };

    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
    let filtered = collapsed.trim();

    match remove_octets(filtered) {
        Some(without) => WHITESPACE_RUN.replace_all(&without, " ").trim().to_string(),
        None => filtered.to_string(),
    }
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        // A tag ends at the first '>' unless another '<' comes first.
        let close = after
            .find(|c: char| c == '<' || c == '>')
            .filter(|&at| after.as_bytes()[at] == b'>');
        let Some(close) = close else {
            out.push_str("&lt;");
            rest = after;
            continue;
        };

        let tag = &after[..close];
        rest = &after[close + 1..];
        if tag.starts_with('/') {
            continue;
        }

        let closing = match tag_name(tag).as_str() {
            "script" => Some(&*SCRIPT_CLOSE),
            "style" => Some(&*STYLE_CLOSE),
            _ => None,
        };
        if let Some(closing) = closing {
            rest = match closing.find(rest) {
                Some(found) => {
                    let tail = &rest[found.end()..];
                    tail.find('>').map_or("", |gt| &tail[gt + 1..])
                }
                None => "",
            };
        }
    }

    out.push_str(rest);
    out
}

fn tag_name(tag: &str) -> String {
    tag.chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Remove `%XX` octets, including ones that only appear once an inner
/// octet is gone (`%%4141`). Returns `None` when there was nothing to
/// remove.
///
/// Two octets never overlap, so removing them as they complete on a stack
/// reaches the same result as repeated left-to-right removal in one pass.
fn remove_octets(input: &str) -> Option<String> {
    if !input.contains('%') {
        return None;
    }

    let mut out: Vec<u8> = Vec::with_capacity(input.len());
    let mut found = false;
    for &byte in input.as_bytes() {
        out.push(byte);
        let len = out.len();
        if len >= 3
            && out[len - 3] == b'%'
            && out[len - 2].is_ascii_hexdigit()
            && out[len - 1].is_ascii_hexdigit()
        {
            out.truncate(len - 3);
            found = true;
        }
    }

    if !found {
        return None;
    }
    // Only ASCII bytes were removed, so `out` is still valid UTF-8.
    let cleaned = String::from_utf8(out)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
    Some(cleaned)
}
