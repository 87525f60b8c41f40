use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File must be an image, got content type '{0}'")]
    UnsupportedFormat(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Error processing image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RecognitionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecognitionError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecognitionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RecognitionError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            RecognitionError::Base64(_) => StatusCode::BAD_REQUEST,
            RecognitionError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            RecognitionError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 请求体提取失败：超出长度上限为 413，其余为 400
    fn from_rejection(status: StatusCode, body_text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            RecognitionError::BodyTooLarge(body_text)
        } else {
            RecognitionError::InvalidInput(body_text)
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RecognitionError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            RecognitionError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            RecognitionError::Inference(_) => "INFERENCE_ERROR",
            RecognitionError::InvalidInput(_) => "INVALID_INPUT",
            RecognitionError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            RecognitionError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            RecognitionError::BodyTooLarge(_) => "FILE_TOO_LARGE",
            RecognitionError::Config(_) => "CONFIG_ERROR",
            RecognitionError::Io(_) => "IO_ERROR",
            RecognitionError::Json(_) => "JSON_ERROR",
            RecognitionError::Base64(_) => "BASE64_DECODE_ERROR",
            RecognitionError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            RecognitionError::Ort(_) => "ORT_ERROR",
            RecognitionError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for RecognitionError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for RecognitionError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for RecognitionError {
    fn from(error: MultipartError) -> Self {
        Self::from_rejection(error.status(), error.body_text())
    }
}

impl IntoResponse for RecognitionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        let error_response = serde_json::json!({
            "success": false,
            "detail": message,
            "error": {
                "code": self.error_code(),
                "message": message,
            }
        });

        tracing::error!("Request failed: {} ({})", message, status);

        (status, axum::Json(error_response)).into_response()
    }
}
