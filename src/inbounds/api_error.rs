use thiserror::Error;

use crate::domain::services::{
    ErrorKind, agreement::AgreementError, notification::NotificationError,
};

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Enums:                                                   |
/// |   - ApiError                                             |
/// +----------------------------------------------------------+

/// Represents errors that can occur in the API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed or broke a business rule.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requester is not a permitted party.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An internal server error occurred.
    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status a transport layer would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalError(_) => 500,
        }
    }

    fn from_kind(kind: ErrorKind, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        match kind {
            ErrorKind::Validation => ApiError::BadRequest(err.to_string()),
            ErrorKind::Authorization => ApiError::Forbidden(err.to_string()),
            ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
            ErrorKind::Internal => ApiError::InternalError(anyhow::Error::new(err)),
        }
    }
}

impl From<AgreementError> for ApiError {
    fn from(err: AgreementError) -> Self {
        ApiError::from_kind(err.kind(), err)
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        ApiError::from_kind(err.kind(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{models::Transition, ports::StoreError};

    #[test]
    fn test_api_error_display() {
        let bad_request = ApiError::BadRequest("Invalid parameter".to_string());
        assert_eq!(
            format!("{}", bad_request),
            "Bad request: Invalid parameter"
        );

        let internal_error = ApiError::InternalError(anyhow::anyhow!("Database error"));
        assert_eq!(
            format!("{}", internal_error),
            "Internal server error: Database error"
        );
    }

    #[test]
    fn agreement_errors_map_by_kind() {
        let err = ApiError::from(AgreementError::InvalidTransition(Transition::Accept));
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.to_string(),
            "Bad request: can only accept pending agreements"
        );

        assert_eq!(ApiError::from(AgreementError::OnlyLenderCanAccept).status_code(), 403);
        assert_eq!(ApiError::from(AgreementError::AgreementNotFound).status_code(), 404);
        assert_eq!(
            ApiError::from(AgreementError::Store(StoreError::Unavailable("down".into()))).status_code(),
            500
        );
    }

    #[test]
    fn notification_errors_map_by_kind() {
        assert_eq!(ApiError::from(NotificationError::NotFound).status_code(), 404);
        assert_eq!(ApiError::from(NotificationError::AlreadyRead).status_code(), 400);
    }
}
