use docflow_types::{ActivityFailure, ClassifiedError, ErrorKind};
use thiserror::Error;

/// Failures raised by the content store client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("invalid {field} '{url}': {reason}")]
    InvalidUrl { field: &'static str, url: String, reason: String },

    #[error("invalid auth token: {reason}")]
    InvalidToken { reason: String },

    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{method} {url} returned {status}: {body}")]
    Status { method: String, url: String, status: u16, body: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn transport(url: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: error.to_string(),
        }
    }

    pub fn decode(url: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.into(),
            message: error.to_string(),
        }
    }

    /// Map the error onto the activity failure envelope.
    ///
    /// Statuses with a taxonomy counterpart become classified failures; transport and server
    /// errors stay unclassified so the retry policy gets a chance at them.
    pub fn into_failure(self) -> ActivityFailure {
        match &self {
            ApiError::InvalidUrl { field, reason, .. } => {
                ClassifiedError::new(ErrorKind::ActivityParamInvalid, self.to_string())
                    .with_field("param", *field)
                    .with_field("reason", reason.as_str())
                    .into()
            }
            ApiError::InvalidToken { reason } => ClassifiedError::new(ErrorKind::ActivityParamInvalid, self.to_string())
                .with_field("param", "auth_token")
                .with_field("reason", reason.as_str())
                .into(),
            ApiError::Status { status, url, .. } => match classify_status(*status, self.to_string()) {
                Some(error) => error.with_field("status", *status).with_field("url", url.as_str()).into(),
                None => ActivityFailure::unclassified(&self),
            },
            ApiError::Client(_) | ApiError::Transport { .. } | ApiError::Decode { .. } => ActivityFailure::unclassified(&self),
        }
    }
}

impl From<ApiError> for ActivityFailure {
    fn from(error: ApiError) -> Self {
        error.into_failure()
    }
}

/// Classify an HTTP status returned by the content store.
///
/// - 401/403: credential rejected
/// - 404: target entity absent
/// - 429: upstream rate limit
///
/// Any other status yields `None`.
pub fn classify_status(status: u16, message: impl Into<String>) -> Option<ClassifiedError> {
    let kind = match status {
        401 | 403 => ErrorKind::TokenExpired,
        404 => ErrorKind::DocumentNotFound,
        429 => ErrorKind::ResourceExhausted,
        _ => return None,
    };
    Some(ClassifiedError::new(kind, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            method: "GET".into(),
            url: "https://store.example.com/api/v1/objects/abc".into(),
            status,
            body: "nope".into(),
        }
    }

    #[test]
    fn auth_statuses_map_to_token_expired() {
        for status in [401, 403] {
            assert_eq!(status_error(status).into_failure().kind(), Some(ErrorKind::TokenExpired));
        }
    }

    #[test]
    fn not_found_and_rate_limit_are_classified() {
        assert_eq!(status_error(404).into_failure().kind(), Some(ErrorKind::DocumentNotFound));
        let failure = status_error(429).into_failure();
        assert_eq!(failure.kind(), Some(ErrorKind::ResourceExhausted));
        assert!(!failure.is_retryable());
        match failure {
            ActivityFailure::Classified(error) => assert_eq!(error.fields["status"], 429),
            other => panic!("expected classified failure, got {other:?}"),
        }
    }

    #[test]
    fn server_and_transport_errors_stay_retryable() {
        let failure = status_error(500).into_failure();
        assert!(failure.kind().is_none());
        assert!(failure.is_retryable());
        assert!(ApiError::transport("https://store.example.com", "connection reset").into_failure().is_retryable());
    }

    #[test]
    fn invalid_url_is_a_parameter_error() {
        let error = ApiError::InvalidUrl {
            field: "config.store_url",
            url: "ftp://nowhere".into(),
            reason: "unsupported scheme".into(),
        };
        assert_eq!(error.into_failure().kind(), Some(ErrorKind::ActivityParamInvalid));
    }
}
