//! 统一的 API 错误类型与 JSON 响应转换。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::any::Any;
use std::io::ErrorKind;
use tracing::error;

use crate::messages;
use crate::share::ShareError;
use crate::uploader::UploadError;

/// `{success, message}` 响应体，成功与失败共用。
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => ApiMessage::failed(msg),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ShareError> for ApiError {
    fn from(error: ShareError) -> Self {
        match error {
            ShareError::InvalidPath => ApiError::BadRequest(messages::INVALID_PATH.into()),
            ShareError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound(messages::FILE_NOT_FOUND.into()),
                _ => ApiError::Internal(format!("{}{err}", messages::ERROR_PREFIX)),
            },
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::MissingCredentials => {
                ApiError::Internal(messages::MISSING_UPLOADER_CONFIG.into())
            }
            UploadError::Failed { stderr, .. } => {
                let detail = if stderr.is_empty() {
                    messages::UNKNOWN_ERROR
                } else {
                    stderr.as_str()
                };
                ApiError::Internal(format!("{}{detail}", messages::UPLOAD_FAILED))
            }
            UploadError::Spawn(err) => ApiError::Internal(format!("{}{err}", messages::ERROR_PREFIX)),
        }
    }
}

/// 处理器 panic 时的兜底响应。
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "request handler panicked");
    ApiError::Internal(messages::INTERNAL_ERROR.into()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = ApiError::from(ShareError::Io(io::Error::from(ErrorKind::NotFound)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), messages::FILE_NOT_FOUND);
    }

    #[test]
    fn uploader_failure_keeps_stderr_verbatim() {
        let err = ApiError::from(UploadError::Failed {
            code: Some(3),
            stderr: "login rejected: bad credentials\n".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message().contains("login rejected: bad credentials\n"));
    }

    #[test]
    fn empty_stderr_falls_back_to_unknown_error() {
        let err = ApiError::from(UploadError::Failed {
            code: Some(1),
            stderr: String::new(),
        });
        assert!(err.message().ends_with(messages::UNKNOWN_ERROR));
    }

    #[test]
    fn panic_response_is_generic_json_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
