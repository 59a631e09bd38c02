use serde::Deserialize;
use thiserror::Error;

// Helper structs to parse the JSON error response from ORS
#[derive(Deserialize, Debug)]
pub struct OrsErrorDetail {
    pub code: u32,
    pub message: String,
}
#[derive(Deserialize, Debug)]
pub struct OrsErrorPayload {
    pub error: OrsErrorDetail,
}

/// Coarse classification used by the pipeline to decide between surfacing an
/// error and falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Network,
    Provider,
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No match found for \"{query}\"")]
    NotFound { query: String },

    #[error("Request could not complete: {0}")]
    Network(String),

    // This variant holds the structured error from the API
    #[error("API Error (Code {code}): {message}")]
    ApiError { code: u32, message: String },

    // A fallback for when we get an error that isn't in the expected JSON format
    #[error("Unstructured API Error (HTTP {status}): {body}")]
    RawApiError { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Could not resolve route endpoints: {}", unresolved_summary(.start, .end))]
    EndpointsUnresolved {
        start: Option<Box<RoutingError>>,
        end: Option<Box<RoutingError>>,
    },
}

impl RoutingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoutingError::InvalidInput(_) => ErrorKind::InvalidInput,
            RoutingError::NotFound { .. } => ErrorKind::NotFound,
            RoutingError::Network(_) => ErrorKind::Network,
            RoutingError::ApiError { .. }
            | RoutingError::RawApiError { .. }
            | RoutingError::MalformedResponse(_)
            | RoutingError::ParseError(_) => ErrorKind::Provider,
            // Input problems win over lookups, lookups over transport.
            RoutingError::EndpointsUnresolved { start, end } => [start, end]
                .into_iter()
                .flatten()
                .map(|e| e.kind())
                .min_by_key(|k| match k {
                    ErrorKind::InvalidInput => 0,
                    ErrorKind::NotFound => 1,
                    ErrorKind::Network => 2,
                    ErrorKind::Provider => 3,
                })
                .unwrap_or(ErrorKind::Provider),
        }
    }
}

fn unresolved_summary(start: &Option<Box<RoutingError>>, end: &Option<Box<RoutingError>>) -> String {
    let parts: Vec<String> = [("start", start), ("end", end)]
        .into_iter()
        .filter_map(|(role, err)| err.as_ref().map(|e| format!("{role}: {e}")))
        .collect();
    if parts.is_empty() {
        "unknown cause".to_string()
    } else {
        parts.join("; ")
    }
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RoutingError::MalformedResponse(err.to_string())
        } else if let (true, Some(status)) = (err.is_status(), err.status()) {
            RoutingError::RawApiError {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            if err.is_timeout() {
                log::warn!("Request timed out: {}", err);
            }
            RoutingError::Network(err.to_string())
        }
    }
}
