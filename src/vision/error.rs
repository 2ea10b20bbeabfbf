//! Error types for the face-detection capability.

use thiserror::Error;

/// Errors reported by a face-detection backend.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The service answered with a non-success status.
    #[error("Upstream error ({status})")]
    Upstream {
        /// HTTP status code reported by the service.
        status: u16,
        /// Error body as reported by the service, verbatim.
        body: serde_json::Value,
    },

    /// HTTP request failed before a response arrived.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned an unparseable response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl VisionError {
    /// JSON payload forwarded to the client on the delegated-error path.
    ///
    /// Upstream errors pass the service's own body through unchanged;
    /// everything else renders as a standard err object.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Upstream { body, .. } => body.clone(),
            other => serde_json::json!({
                "status": "err",
                "message": other.to_string(),
            }),
        }
    }
}
