/// Outbound HTTP plumbing shared by the vendor clients
///
/// Every vendor client (Stripe, Anthropic, ElevenLabs, Supabase storage) reports
/// failures through [`ClientError`] so the API layer can map them uniformly.

use std::time::Duration;

/// Default timeout for calls to third-party APIs
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Error returned by vendor API clients
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Request never produced a response (DNS, TLS, timeout...)
    #[error("{service} request failed: {message}")]
    Network { service: &'static str, message: String },

    /// Vendor answered with a non-success status
    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("{service} response could not be parsed: {message}")]
    Parse { service: &'static str, message: String },

    /// Caller input rejected before any request was sent
    #[error("invalid {service} request: {message}")]
    InvalidInput { service: &'static str, message: String },
}

impl ClientError {
    /// Name of the vendor that failed
    pub fn service(&self) -> &'static str {
        match self {
            ClientError::Network { service, .. }
            | ClientError::Api { service, .. }
            | ClientError::Parse { service, .. }
            | ClientError::InvalidInput { service, .. } => service,
        }
    }

    /// HTTP status returned by the vendor, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn network(service: &'static str, err: reqwest::Error) -> Self {
        ClientError::Network {
            service,
            message: err.to_string(),
        }
    }
}

/// Builds a `reqwest::Client` with the shared timeout
pub fn build_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ClientError::network("http", e))
}

/// Turns a non-success response into [`ClientError::Api`], passing successes through
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), "Vendor API returned an error");

    Err(ClientError::Api {
        service,
        status: status.as_u16(),
        message,
    })
}
