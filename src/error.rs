//! Error types for tin operations.

use thiserror::Error;

/// Errors that can occur while building or calling an API.
#[derive(Debug, Error)]
pub enum TinError {
    /// Configuration, endpoint or model definitions are malformed or incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path token required by the method's path template was not supplied.
    #[error("{method} called with missing token argument '{token}' for path {path}")]
    InvalidArguments {
        method: String,
        token: String,
        path: String,
    },

    /// The remote API answered 404.
    #[error("object not found at {url}: {body}")]
    ObjectNotFound { url: String, body: String },

    /// The remote API answered with a status outside the method's accepted set.
    #[error("unexpected status {status} at {url} (expected {}): {body}", format_expected(.expected))]
    UnexpectedStatus {
        url: String,
        status: u16,
        expected: Vec<u16>,
        body: String,
    },

    /// The response body was not JSON.
    #[error("failed to decode JSON response from {url}; raw response: {raw}")]
    ResponseDecode { url: String, raw: String },

    /// A model is missing a required attribute or was used in an invalid state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Navigation to a node or method that does not exist.
    #[error("no such endpoint: {0}")]
    UnknownEndpoint(String),

    /// The header carrying the header-count pagination total was not an integer.
    #[error("pagination header '{header}' is not an integer: {value}")]
    InvalidPaginationHeader { header: String, value: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Reading a config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_expected(expected: &[u16]) -> String {
    expected
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl TinError {
    /// Returns true for the distinguished 404 case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

/// Result type alias for tin operations.
pub type Result<T> = core::result::Result<T, TinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_lists_expected_codes() {
        let err = TinError::UnexpectedStatus {
            url: "http://localhost/things".to_string(),
            status: 500,
            expected: vec![200, 201],
            body: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("200,201"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_invalid_arguments_names_method_and_token() {
        let err = TinError::InvalidArguments {
            method: "svc.users.get".to_string(),
            token: "id".to_string(),
            path: "/users/:id".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("svc.users.get"));
        assert!(msg.contains("'id'"));
    }
}
