use anyhow::anyhow;
use reqwest::StatusCode;
use serde::Deserialize;
use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_has(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has(err, ErrorKind::TimedOut, "timed out")
}

/// Maps a transport failure into a message that names the setting to check.
pub(crate) fn service_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return anyhow!(
            "Request to '{}' timed out after {}s. \
             Increase MODEL_TIMEOUT_SECS or check service responsiveness.",
            api_url,
            timeout_secs
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by completion service at '{}'. \
                 Check that MODEL_BASE_URL is correct.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to completion service at '{}'. \
             Check MODEL_BASE_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call completion service at '{}': {}", api_url, err)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Maps a non-success HTTP status into an error carrying the service's own
/// message when the body has one.
pub(crate) fn service_status_error(status: StatusCode, body: &str) -> anyhow::Error {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| {
            let message = envelope.error.message.filter(|msg| !msg.trim().is_empty())?;
            Some(match envelope.error.code {
                Some(code) if !code.is_empty() => format!("{message} ({code})"),
                _ => message,
            })
        })
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::UNAUTHORIZED {
        return anyhow!(
            "Completion service rejected the API key (status {}): {}. Check API_KEY_FILE.",
            status,
            detail
        );
    }

    anyhow!("Completion service returned status {}: {}", status, detail)
}
