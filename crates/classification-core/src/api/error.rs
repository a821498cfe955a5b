use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassificationError {
    /// The saved token is missing, unreadable or incomplete.
    #[error("Saved token unavailable: {0}")]
    TokenUnavailable(String),

    /// The login flow failed, e.g. the callback carried no code.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Access token expired")]
    TokenExpired,

    #[error("The following parameter must be supplied: {0}")]
    MissingParameter(&'static str),

    #[error("No active session - initialize the client first")]
    NotInitialized,

    #[error("Unexpected status: expected {expected}, got {actual}")]
    UnexpectedStatus {
        expected: StatusCode,
        actual: StatusCode,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClassificationError>;

impl ClassificationError {
    /// Whether `call_with_refresh` should refresh and retry on this error.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, ClassificationError::TokenExpired)
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClassificationError::Http(e) => e.status(),
            ClassificationError::UnexpectedStatus { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_names_field() {
        let err = ClassificationError::MissingParameter("course_code");
        assert_eq!(
            err.to_string(),
            "The following parameter must be supplied: course_code"
        );
    }

    #[test]
    fn test_only_token_expired_triggers_refresh() {
        assert!(ClassificationError::TokenExpired.is_token_expired());
        assert!(!ClassificationError::NotInitialized.is_token_expired());
        assert!(!ClassificationError::Authorization("x".into()).is_token_expired());
    }

    #[test]
    fn test_unexpected_status_exposes_actual() {
        let err = ClassificationError::UnexpectedStatus {
            expected: StatusCode::CREATED,
            actual: StatusCode::OK,
        };
        assert_eq!(err.status(), Some(StatusCode::OK));
    }
}
