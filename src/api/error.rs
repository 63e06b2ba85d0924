use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether the error should be shown next to a login or admin form rather than as a banner.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_))
    }
}

#[derive(Deserialize)]
struct FieldError {
    msg: String,
}

/// Error bodies are either `{"error": "..."}` or, for validation failures,
/// `{"errors": [{"msg": "..."}, ...]}`.
#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

pub fn error_from_response(status: u16, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let mut messages: Vec<String> = parsed.errors.into_iter().map(|e| e.msg).collect();
    if let Some(error) = parsed.error {
        messages.push(error);
    }
    let message = if messages.is_empty() {
        body.trim().to_string()
    } else {
        messages.join(", ")
    };

    match status {
        400 => ApiError::Validation(if messages.is_empty() {
            vec![message]
        } else {
            messages
        }),
        401 => ApiError::Unauthorized(message),
        403 => ApiError::Forbidden(message),
        _ => ApiError::UnexpectedStatus { status, message },
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_validation_messages_are_collected() {
        let body = r#"{"errors": [{"msg": "Title is required", "param": "title"},
                                  {"msg": "Valid latitude is required", "param": "latitude"}]}"#;
        match error_from_response(400, body) {
            ApiError::Validation(messages) => assert_eq!(
                vec!["Title is required", "Valid latitude is required"],
                messages
            ),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[rstest]
    #[case(401, r#"{"error": "Unauthorized"}"#, "Unauthorized: Unauthorized")]
    #[case(403, r#"{"error": "Admins only"}"#, "Forbidden: Admins only")]
    #[case(403, r#"{"error": "Invalid token"}"#, "Forbidden: Invalid token")]
    #[case(500, "Internal server error", "Unexpected status 500: Internal server error")]
    #[case(400, r#"{"error": "Invalid data"}"#, "Validation failed: Invalid data")]
    fn test_error_from_response(#[case] status: u16, #[case] body: &str, #[case] expected: &str) {
        assert_eq!(expected, error_from_response(status, body).to_string());
    }

    #[test]
    fn test_auth_failures() {
        assert!(error_from_response(401, "").is_auth_failure());
        assert!(error_from_response(403, "").is_auth_failure());
        assert!(!error_from_response(400, "").is_auth_failure());
    }
}
