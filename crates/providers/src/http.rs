//! Transport helpers shared by every adapter: client construction, error
//! classification and status mapping.

use capstan_core::{ProtocolViolation, ProviderError};
use serde::de::DeserializeOwned;
use tracing::warn;

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map non-200 statuses to errors, then decode the body as `T`.
///
/// A body that doesn't decode is a malformed payload, not a transport failure.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{provider}: invalid API key or insufficient permissions"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_reqwest_error(&e))?;

    if status != 200 {
        warn!(provider, status, body = %body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: body,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::Protocol(ProtocolViolation::Malformed(format!(
            "{provider} response did not decode: {e}"
        )))
    })
}

/// Decode a JSON-encoded argument string into an object.
///
/// Blank strings and `null` become `{}`; anything else that isn't an object
/// is malformed.
pub(crate) fn decode_arguments(
    tool_name: &str,
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        ProtocolViolation::Malformed(format!("undecodable arguments for '{tool_name}': {e}"))
    })?;
    object_arguments(tool_name, value)
}

/// Accept a structured argument value, tolerating `null` as `{}`.
pub(crate) fn object_arguments(
    tool_name: &str,
    value: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, ProviderError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        other => Err(ProtocolViolation::Malformed(format!(
            "arguments for '{tool_name}' must be an object, got {other}"
        ))
        .into()),
    }
}
