//! # URL Builder
//!
//! Resolves a path template such as `http://api.com/users/:userId/posts/:id?`
//! against a [`ResourceId`] and a query map.
//!
//! - The protocol and domain (`http://host:port`) are copied verbatim.
//! - `:name` is replaced with the segment-encoded id part. A missing part drops
//!   the segment together with its leading slash.
//! - A `?` right after a parameter marks it optional when it is followed by `/`
//!   or ends the template; otherwise it starts the query string.
//! - Inside the query string `key=:name` takes the query-encoded part, or
//!   nothing when the part is missing.
//! - Trailing slashes are stripped, then each `query` entry overwrites an
//!   existing `key=` parameter or is appended.

use crate::key::ResourceId;
use serde_json::{Map, Value};

pub fn build_fetch_url(template: &str, id: Option<&ResourceId>, query: &Map<String, Value>) -> String {
    let (origin, path) = split_origin(template);
    let mut url = replace_url_params(path, id);
    for (key, value) in query {
        url = replace_query_param(&url, key, &query_value(value));
    }
    format!("{origin}{url}")
}

/// Splits `^https?://[^/]*` off the template.
fn split_origin(template: &str) -> (&str, &str) {
    let scheme_len = if starts_with_ignore_case(template, "https://") {
        "https://".len()
    } else if starts_with_ignore_case(template, "http://") {
        "http://".len()
    } else {
        return ("", template);
    };
    let end = template[scheme_len..]
        .find('/')
        .map_or(template.len(), |i| scheme_len + i);
    template.split_at(end)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn replace_url_params(path: &str, id: Option<&ResourceId>) -> String {
    let chars: Vec<char> = path.chars().collect();
    let mut out = String::with_capacity(path.len());
    let mut in_query = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let escaped = i > 0 && chars[i - 1] == '\\';
        if c == ':' && !escaped {
            let name_end = chars[i + 1..]
                .iter()
                .position(|c| !is_word(*c))
                .map_or(chars.len(), |n| i + 1 + n);
            let name: String = chars[i + 1..name_end].iter().collect();
            if !name.is_empty() && !name.chars().all(|c| c.is_ascii_digit()) {
                let mut next = name_end;
                if !in_query
                    && chars.get(next) == Some(&'?')
                    && matches!(chars.get(next + 1), None | Some('/'))
                {
                    next += 1;
                }
                let value = id
                    .and_then(|id| id.get(&name))
                    .filter(|value| !value.is_empty());
                match (value, in_query) {
                    (Some(value), true) => out.push_str(&encode_uri_query(value)),
                    (Some(value), false) => out.push_str(&encode_uri_segment(value)),
                    (None, true) => {}
                    (None, false) => {
                        if out.ends_with('/') {
                            out.pop();
                        }
                    }
                }
                i = next;
                continue;
            }
        }
        if c == '?' {
            in_query = true;
        }
        out.push(c);
        i += 1;
    }

    let trimmed = out.trim_end_matches('/').len();
    out.truncate(trimmed);
    out
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Overwrites `key=...` in the query string, or appends `key=value`.
fn replace_query_param(url: &str, key: &str, value: &str) -> String {
    let pattern = format!("{}=", key.to_ascii_lowercase());
    let lower = url.to_ascii_lowercase();
    let existing = lower.match_indices(&pattern).map(|(i, _)| i).find(|&i| {
        i > 0 && matches!(url.as_bytes()[i - 1], b'?' | b'&')
    });

    match existing {
        Some(start) => {
            let value_start = start + pattern.len();
            let value_end = url[value_start..]
                .find('&')
                .map_or(url.len(), |n| value_start + n);
            format!("{}{key}={value}{}", &url[..start], &url[value_end..])
        }
        None => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}{key}={value}")
        }
    }
}

/// Percent-encodes like `encodeURIComponent`, keeping `@ : $ ,` readable.
pub fn encode_uri_query(value: &str) -> String {
    percent_encode(value, |c| matches!(c, '@' | ':' | '$' | ','))
}

/// Like [`encode_uri_query`], additionally keeping `& = +` for path segments.
pub fn encode_uri_segment(value: &str) -> String {
    percent_encode(value, |c| matches!(c, '@' | ':' | '$' | ',' | '&' | '=' | '+'))
}

fn percent_encode(value: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let unreserved = c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')');
        if unreserved || keep(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}
