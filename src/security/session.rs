//! Session resolution from request credentials.
//!
//! Credentials come from an `Authorization: Bearer` header or from the
//! auth provider's browser cookie `sb-<project>-auth-token`. Large cookies
//! are split into `sb-<project>-auth-token.0`, `.1`, ... and joined back in
//! index order. The value is JSON, optionally written as `base64-<base64url>`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use base64::Engine;
use thiserror::Error;

use crate::security::access_control::{Profile, Session};

const COOKIE_PREFIX: &str = "sb-";
const COOKIE_SUFFIX: &str = "-auth-token";
const BASE64_PREFIX: &str = "base64-";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth provider request failed: {0}")]
    Transport(String),

    #[error("auth provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed session cookie: {0}")]
    Malformed(String),
}

/// The external authentication provider, as seen by the gate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an access token. `Ok(None)` means the token is not valid.
    async fn session_from_token(&self, access_token: &str) -> Result<Option<Session>, AuthError>;

    /// Fetch the profile row for a resolved session.
    async fn profile(&self, session: &Session) -> Result<Option<Profile>, AuthError>;
}

/// Find the caller's access token, preferring an explicit bearer header.
pub fn access_token_from_headers(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(token) = bearer_token(headers) {
        return Ok(Some(token));
    }
    match session_cookie_value(headers) {
        Some(raw) => access_token_from_cookie(&raw).map(Some),
        None => Ok(None),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(Default)]
struct CookieParts {
    whole: Option<String>,
    chunks: BTreeMap<u32, String>,
}

/// Reassemble the auth cookie, chunked or not.
fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    let mut groups: BTreeMap<String, CookieParts> = BTreeMap::new();

    let pairs = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='));

    for (name, value) in pairs {
        if !name.starts_with(COOKIE_PREFIX) {
            continue;
        }
        if let Some(base) = name.strip_suffix(COOKIE_SUFFIX) {
            groups.entry(base.to_string()).or_default().whole = Some(value.to_string());
        } else if let Some((base, index)) = name.rsplit_once('.') {
            let Some(base) = base.strip_suffix(COOKIE_SUFFIX) else {
                continue;
            };
            if let Ok(index) = index.parse::<u32>() {
                groups
                    .entry(base.to_string())
                    .or_default()
                    .chunks
                    .insert(index, value.to_string());
            }
        }
    }

    groups.into_values().find_map(|parts| {
        if let Some(whole) = parts.whole {
            return Some(whole);
        }
        // chunks must be contiguous from zero
        let contiguous = parts.chunks.keys().copied().eq(0..parts.chunks.len() as u32);
        (contiguous && !parts.chunks.is_empty()).then(|| parts.chunks.into_values().collect())
    })
}

/// Extract the access token from a reassembled cookie value.
pub fn access_token_from_cookie(raw: &str) -> Result<String, AuthError> {
    let decoded = percent_decode(raw);

    let json = match decoded.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|e| AuthError::Malformed(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| AuthError::Malformed(e.to_string()))?
        }
        None => decoded,
    };

    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| AuthError::Malformed(e.to_string()))?;

    let token = match &value {
        serde_json::Value::Object(map) => map.get("access_token").and_then(|t| t.as_str()),
        serde_json::Value::Array(items) => items.first().and_then(|t| t.as_str()),
        _ => None,
    };

    token
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::Malformed("no access_token in session cookie".to_string()))
}

fn percent_decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    url::form_urlencoded::parse(format!("v={}", raw.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}
