use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use text2dataset_core::{Error, ExportError, LabelError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}

/// Error type returned by every handler.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    UnsupportedFile(String),
    PayloadTooLarge(String),
    ModelUnavailable(String),
    NotFound(String),
    Expired(String),
    Unauthorized,
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedFile(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) => StatusCode::GONE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedFile(_) => "UNSUPPORTED_FILE",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Expired(_) => "EXPIRED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            Self::Validation(msg)
            | Self::UnsupportedFile(msg)
            | Self::PayloadTooLarge(msg)
            | Self::ModelUnavailable(msg)
            | Self::NotFound(msg)
            | Self::Expired(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg) => msg,
            Self::Unauthorized => "Login required".to_string(),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::DatasetNotFound(_)
            | Error::ShareNotFound(_)
            | Error::UserNotFound(_)
            | Error::FileNotFound(_) => Self::NotFound(err.to_string()),
            Error::DuplicateUser(_) | Error::AlreadyShared(_) => Self::Conflict(err.to_string()),
            Error::Expired(_) => Self::Expired(err.to_string()),
            Error::InvalidFormat(_) | Error::InvalidMode(_) => Self::Validation(err.to_string()),
            Error::Validation(msg) => Self::Validation(msg),
            Error::Database(_) | Error::Serialization(_) | Error::Io(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<LabelError> for AppError {
    fn from(err: LabelError) -> Self {
        match err {
            LabelError::ModelUnavailable(_) => Self::ModelUnavailable(err.to_string()),
            LabelError::EmptyInput => Self::Validation(err.to_string()),
            LabelError::Failed(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let id = uuid::Uuid::now_v7();
        assert_eq!(
            AppError::from(Error::DatasetNotFound(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::from(Error::Expired(id)).status(), StatusCode::GONE);
        assert_eq!(
            AppError::from(Error::AlreadyShared(id)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(Error::InvalidFormat("xml".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_label_error_mapping() {
        assert_eq!(
            AppError::from(LabelError::ModelUnavailable("rule-ner".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(LabelError::EmptyInput).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
