// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response decoding shared by the provider clients.

use omnidesk_core::OmniError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

const DETAIL_LIMIT: usize = 512;

/// Build a reqwest client with the given per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, OmniError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OmniError::Channel {
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Map a transport failure (connect, timeout, TLS) to a channel error.
pub(crate) fn transport_err(what: &str, e: reqwest::Error) -> OmniError {
    OmniError::Channel {
        message: format!("{what} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Read a provider response, failing on non-2xx, and decode the JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    what: &str,
    response: reqwest::Response,
) -> Result<T, OmniError> {
    let status = response.status();
    debug!(status = %status, what, "provider response received");

    let body = response.text().await.map_err(|e| OmniError::Channel {
        message: format!("failed to read {what} response: {e}"),
        source: Some(Box::new(e)),
    })?;

    if !status.is_success() {
        return Err(OmniError::channel(format!(
            "{what} returned {status}: {}",
            error_detail(&body)
        )));
    }

    serde_json::from_str(&body).map_err(|e| OmniError::Channel {
        message: format!("failed to parse {what} response: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Extract the human-readable part of a provider error body.
///
/// Graph and Gmail use `{"error":{"message":..}}`, the OAuth endpoint uses
/// `{"error":..,"error_description":..}`.
pub(crate) fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error_description"))
            .or_else(|| v.get("error").filter(|e| e.is_string()))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.chars().take(DETAIL_LIMIT).collect())
}

/// Gmail encodes 64-bit ids as JSON strings; accept either form.
pub(crate) fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_provider_message() {
        let graph = r#"{"error":{"message":"Invalid OAuth access token.","code":190}}"#;
        assert_eq!(error_detail(graph), "Invalid OAuth access token.");

        let oauth = r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#;
        assert_eq!(error_detail(oauth), "Token has been revoked.");

        assert_eq!(error_detail("upstream down"), "upstream down");
        assert_eq!(error_detail(&"x".repeat(2000)).len(), DETAIL_LIMIT);
    }

    #[test]
    fn history_id_accepts_string_or_number() {
        #[derive(Deserialize)]
        struct IdField {
            #[serde(deserialize_with = "u64_from_string_or_number")]
            id: u64,
        }
        let a: IdField = serde_json::from_str(r#"{"id":"98765"}"#).unwrap();
        let b: IdField = serde_json::from_str(r#"{"id":98765}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert!(serde_json::from_str::<IdField>(r#"{"id":"abc"}"#).is_err());
    }
}
