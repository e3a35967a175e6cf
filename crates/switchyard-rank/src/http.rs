//! HTTP plumbing shared by the hosted backends.

use std::time::Duration;

use switchyard_types::{RankError, ToolDescriptor};

use crate::prompt::{parse_ranked_names, select_by_names};

/// Per-request deadline for ranking calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(backend: &str) -> Result<reqwest::Client, RankError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RankError::Config {
            backend: backend.to_string(),
            message: e.to_string(),
        })
}

/// Send `request` and decode a successful JSON reply into `T`.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    backend: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, RankError> {
    let response = request.send().await.map_err(|e| RankError::Network {
        backend: backend.to_string(),
        message: if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        },
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error(backend, status.as_u16(), &body));
    }

    response.json::<T>().await.map_err(|e| RankError::BadReply {
        backend: backend.to_string(),
        message: format!("Unexpected response body: {e}"),
    })
}

/// Turn the model's text into an ordered subset of `candidates`.
pub(crate) fn finish(
    backend: &str,
    text: &str,
    candidates: &[ToolDescriptor],
    max_tools: usize,
) -> Result<Vec<ToolDescriptor>, RankError> {
    let names = parse_ranked_names(text).map_err(|e| RankError::BadReply {
        backend: backend.to_string(),
        message: e.to_string(),
    })?;
    let selected = select_by_names(&names, candidates, max_tools);
    tracing::debug!(
        "{backend} ranked {} names, {} matched the catalog",
        names.len(),
        selected.len()
    );
    Ok(selected)
}

/// Classify an HTTP error response.
///
/// Both hosted APIs report failures as `{"error":{"message":...}}`.
fn classify_error(backend: &str, status: u16, body: &str) -> RankError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    RankError::Http {
        backend: backend.to_string(),
        status,
        message,
    }
}
