use crate::error::MalformedUrl;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Characters left unescaped by URI component encoding: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Normalizes user input into the URL form stored on a link record.
///
/// Surrounding whitespace is trimmed and `https://` is assumed when no scheme
/// is given. The result must parse as an `http` or `https` URL with a host.
/// The returned string keeps the user's spelling (no trailing slash is added),
/// since preview records are keyed by it.
pub fn normalize_url(raw: &str) -> Result<String, MalformedUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MalformedUrl::new(raw, "url cannot be empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = ::url::Url::parse(&candidate)
        .map_err(|e| MalformedUrl::new(raw, e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(MalformedUrl::new(
                raw,
                format!("scheme must be http or https, got '{other}'"),
            ))
        }
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(candidate),
        _ => Err(MalformedUrl::new(raw, "url has no host")),
    }
}

/// The document id under which a preview is stored in the remote store.
///
/// Derived by URI-component encoding the trimmed URL and then replacing every
/// character outside `[A-Za-z0-9]` with `_`. Previously stored documents use
/// exactly this derivation, so it must not change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn from_url(url: &str) -> Self {
        let encoded = utf8_percent_encode(url.trim(), URI_COMPONENT).to_string();
        let sanitized = encoded
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
