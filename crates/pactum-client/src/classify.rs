//! Maps HTTP statuses and transport failures onto [`BulkError`].

use pactum_api_models::ProblemDetails;
use pactum_bulk_core::BulkError;
use reqwest::{Response, StatusCode};

/// Classify a non-success response, reading its body for a reason.
pub async fn classify_response(response: Response) -> BulkError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();
    let message = problem.as_ref().map_or_else(
        || {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                format!("request failed with status {status}")
            } else {
                text
            }
        },
        |problem| problem.message().to_string(),
    );

    classify_status(status, message)
}

/// Classify a status code with an already extracted message.
#[must_use]
pub fn classify_status(status: StatusCode, message: String) -> BulkError {
    let code = status.as_u16();
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            BulkError::ValidationFailure {
                status: code,
                message,
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BulkError::PermissionDenied {
            status: code,
            message,
        },
        StatusCode::NOT_FOUND => BulkError::NotFound { message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            BulkError::transient(Some(code), message)
        }
        _ if status.is_server_error() => BulkError::transient(Some(code), message),
        _ if status.is_client_error() => BulkError::ValidationFailure {
            status: code,
            message,
        },
        _ => BulkError::malformed("http", format!("unexpected status {status}: {message}")),
    }
}

/// Classify a failure that happened before a usable response arrived.
#[must_use]
pub fn classify_transport(err: &reqwest::Error) -> BulkError {
    if err.is_timeout() {
        BulkError::transient(None, "request timed out")
    } else if err.is_connect() {
        BulkError::transient(None, format!("connection failed: {err}"))
    } else if err.is_builder() {
        BulkError::malformed("request", err.to_string())
    } else {
        BulkError::transient(None, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_error_taxonomy() {
        let classify = |code: u16| {
            classify_status(
                StatusCode::from_u16(code).expect("valid status"),
                "reason".into(),
            )
        };

        assert!(matches!(classify(400), BulkError::ValidationFailure { status: 400, .. }));
        assert!(matches!(classify(409), BulkError::ValidationFailure { status: 409, .. }));
        assert!(matches!(classify(422), BulkError::ValidationFailure { status: 422, .. }));
        assert!(matches!(classify(401), BulkError::PermissionDenied { status: 401, .. }));
        assert!(matches!(classify(403), BulkError::PermissionDenied { status: 403, .. }));
        assert!(matches!(classify(404), BulkError::NotFound { .. }));
        assert!(classify(408).is_transient());
        assert!(classify(429).is_transient());
        assert!(classify(500).is_transient());
        assert!(classify(503).is_transient());
        assert!(!classify(413).is_transient());
    }
}
