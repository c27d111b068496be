use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::audio::AudioError;
use crate::tts::EngineError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid filename")]
    InvalidFilename,

    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    #[error("TTS model not loaded: {0}")]
    EngineUnavailable(String),

    #[error("TTS generation failed: {0}")]
    Synthesis(String),

    #[error("Audio processing failed: {0}")]
    Audio(#[from] AudioError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Messages of the underlying errors, outermost first.
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        causes
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Synthesis(e.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, body) = match &self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                ErrorResponse::new(msg.clone(), None),
            ),
            AppError::InvalidFilename => (
                StatusCode::BAD_REQUEST,
                "INVALID_FILENAME",
                ErrorResponse::new("Invalid filename", None),
            ),
            AppError::AudioNotFound(_) => (
                StatusCode::NOT_FOUND,
                "AUDIO_NOT_FOUND",
                ErrorResponse::new("Audio file not found", None),
            ),
            AppError::EngineUnavailable(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ENGINE_UNAVAILABLE",
                ErrorResponse::new("TTS model not loaded", Some(reason.clone())),
            ),
            AppError::Synthesis(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TTS_ERROR",
                ErrorResponse::new("TTS generation failed", Some(msg.clone())),
            ),
            AppError::Audio(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUDIO_ERROR",
                ErrorResponse::new("TTS generation failed", Some(e.to_string())),
            ),
            AppError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                ErrorResponse::new("Internal server error", Some(e.to_string())),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                ErrorResponse::new("Internal server error", Some(msg.clone())),
            ),
        };

        if status.is_server_error() {
            tracing::error!(
                error = ?self,
                causes = ?self.causes(),
                "Request failed: {} - {}",
                code,
                self
            );
        } else {
            tracing::warn!("Request rejected: {} - {}", code, self);
        }

        (status, Json(body)).into_response()
    }
}
