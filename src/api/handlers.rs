use axum::{
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{HealthResponse, TtsRequest, TtsResponse};
use crate::api::routes::AppState;
use crate::error::AppError;

pub async fn tts(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TtsResponse>, AppError> {
    state.tts.ensure_ready()?;

    let job = TtsRequest::from_body(&body).into_job()?;

    // Synthesis blocks for its full duration; keep it off the async workers.
    let worker = Arc::clone(&state);
    let audio = tokio::task::spawn_blocking(move || worker.tts.synthesize(&job))
        .await
        .map_err(|e| AppError::Internal(format!("Synthesis task failed: {}", e)))??;

    let url = format!("{}/audio/{}", state.base_url, audio.filename);
    if audio.recovered.is_empty() {
        tracing::info!("Generated {}", audio.path.display());
    } else {
        tracing::warn!(
            "Generated {} with {} degraded step(s)",
            audio.path.display(),
            audio.recovered.len()
        );
    }

    Ok(Json(TtsResponse {
        success: true,
        filename: audio.filename,
        url,
    }))
}

/// Bare OPTIONS without CORS headers; real preflights are answered by the CORS layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn audio(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let path = state.tts.store().resolve(&filename)?;

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to serve {}: {}", filename, e)))?;

    let mut response = response.map(Body::new);
    if response.status() == StatusCode::OK {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
    }

    Ok(response.into_response())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        tts_model_loaded: state.tts.engine_loaded(),
        audio_directory: state.tts.store().dir().display().to_string(),
    })
}
