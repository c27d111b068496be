use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use crate::error::ErrorResponse;
use crate::tts::TtsService;

pub struct AppState {
    pub tts: TtsService,
    pub base_url: String,
}

pub fn create_router(state: Arc<AppState>, allowed_origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/tts", post(handlers::tts).options(handlers::preflight))
        .route(
            "/audio/:filename",
            get(handlers::audio).options(handlers::preflight),
        )
        .route("/health", get(handlers::health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!("Handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error", Some(details))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CORS_ORIGINS;
    use crate::store::AudioStore;
    use crate::tts::testing::{FailingEngine, ToneEngine};
    use crate::tts::{EngineState, SpeechEngine};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const BASE_URL: &str = "http://127.0.0.1:5001";

    fn tts_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/tts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn boom() -> &'static str {
        panic!("kaboom")
    }

    struct Harness {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
    }

    impl Harness {
        fn new(engine: EngineState) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = AudioStore::open(dir.path().join("audio")).unwrap();
            let state = Arc::new(AppState {
                tts: TtsService::new(engine, store),
                base_url: BASE_URL.to_string(),
            });
            Self { _dir: dir, state }
        }

        fn with_engine(engine: impl SpeechEngine + 'static) -> Self {
            Self::new(EngineState::Ready(Arc::new(engine)))
        }

        fn router(&self) -> Router {
            let origins = DEFAULT_CORS_ORIGINS
                .iter()
                .map(|o| HeaderValue::from_static(*o))
                .collect();
            create_router(Arc::clone(&self.state), origins)
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.state.tts.store().dir()).unwrap().count()
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
            let response = self.router().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.into_body().collect().await.unwrap().to_bytes();
            (status, body.to_vec(), headers)
        }

        async fn post_tts(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
            let (status, body, _) = self.send(tts_request(body)).await;
            (status, serde_json::from_slice(&body).unwrap())
        }

        async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            self.send(request).await
        }
    }

    #[tokio::test]
    async fn text_request_produces_retrievable_wav() {
        let harness = Harness::with_engine(ToneEngine::default());

        let (status, body) = harness
            .post_tts(serde_json::json!({ "text": "hello world" }))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let filename = body["filename"].as_str().unwrap();
        let pattern = regex::Regex::new(r"^tts_[0-9a-f]{32}\.wav$").unwrap();
        assert!(pattern.is_match(filename));
        assert_eq!(body["url"], format!("{}/audio/{}", BASE_URL, filename));

        let (status, bytes, headers) = harness.get(&format!("/audio/{}", filename)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
        assert!(bytes.starts_with(b"RIFF"));
        assert!(bytes.len() > 44);
    }

    #[tokio::test]
    async fn dialogue_request_keeps_only_non_empty_turns() {
        let harness = Harness::with_engine(ToneEngine::default());

        let (status, body) = harness
            .post_tts(serde_json::json!({
                "dialogue": [
                    { "role": "teacher", "text": "Hi" },
                    { "role": "student", "text": "" }
                ]
            }))
            .await;

        assert_eq!(status, StatusCode::OK);
        let filename = body["filename"].as_str().unwrap();
        let path = harness.state.tts.store().dir().join(filename);
        let frames = hound::WavReader::open(&path).unwrap().duration() as f64;
        let expected = (2.0 * crate::tts::testing::FRAMES_PER_CHAR as f64 / 1.15).round();
        assert_eq!(frames, expected);
        assert_eq!(harness.stored_files(), 1);
    }

    #[tokio::test]
    async fn missing_text_and_dialogue_is_400_without_side_effects() {
        let engine = Arc::new(ToneEngine::default());
        let harness = Harness::new(EngineState::Ready(engine.clone()));

        for _ in 0..2 {
            let (status, body) = harness.post_tts(serde_json::json!({})).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, serde_json::json!({ "error": "'text' or 'dialogue' is required" }));
        }

        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.stored_files(), 0);
    }

    #[tokio::test]
    async fn empty_dialogue_segments_is_400() {
        let harness = Harness::with_engine(ToneEngine::default());

        let (status, body) = harness
            .post_tts(serde_json::json!({
                "dialogue": [{ "role": "teacher", "text": "  " }]
            }))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No valid dialogue segments");
    }

    #[tokio::test]
    async fn unavailable_engine_is_500() {
        let harness = Harness::new(EngineState::Unavailable("no model".into()));

        let (status, body) = harness
            .post_tts(serde_json::json!({ "text": "hello" }))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "TTS model not loaded");
        assert_eq!(body["details"], "no model");
    }

    #[tokio::test]
    async fn engine_failure_is_500_with_details() {
        let harness = Harness::with_engine(FailingEngine::always());

        let (status, body) = harness
            .post_tts(serde_json::json!({ "text": "hello" }))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "TTS generation failed");
        assert!(body["details"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_get_distinct_files() {
        let harness = Harness::with_engine(ToneEngine::with_frames_per_char(50));
        let router = harness.router();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let router = router.clone();
            tasks.spawn(async move {
                let response = router
                    .oneshot(tts_request(serde_json::json!({ "text": "same" })))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                let body = response.into_body().collect().await.unwrap().to_bytes();
                let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
                body["filename"].as_str().unwrap().to_string()
            });
        }

        let mut names = HashSet::new();
        while let Some(name) = tasks.join_next().await {
            names.insert(name.unwrap());
        }
        assert_eq!(names.len(), 16);
        assert_eq!(harness.stored_files(), 16);
    }

    #[tokio::test]
    async fn options_tts_is_empty_200() {
        let harness = Harness::with_engine(ToneEngine::default());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/tts")
            .body(Body::empty())
            .unwrap();

        let (status, body, _) = harness.send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(harness.stored_files(), 0);
    }

    #[tokio::test]
    async fn cors_preflight_allows_listed_origin_only() {
        let harness = Harness::with_engine(ToneEngine::default());
        let preflight = |origin: &'static str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/tts")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap()
        };

        let (status, _, headers) = harness.send(preflight("http://localhost:5173")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );

        let (_, _, headers) = harness.send(preflight("http://evil.test")).await;
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn traversal_filenames_are_400() {
        let harness = Harness::with_engine(ToneEngine::default());

        for uri in ["/audio/..%2Fsecret", "/audio/a%2Fb", "/audio/a%5Cb", "/audio/.."] {
            let (status, body, _) = harness.get(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body["error"], "Invalid filename");
        }
    }

    #[tokio::test]
    async fn missing_audio_is_404() {
        let harness = Harness::with_engine(ToneEngine::default());

        let (status, body, _) = harness.get("/audio/tts_nothere.wav").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Audio file not found");
    }

    #[tokio::test]
    async fn health_reports_engine_state_and_directory() {
        let harness = Harness::new(EngineState::Unavailable("no model".into()));

        let (status, body, _) = harness.get("/health").await;

        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tts_model_loaded"], false);
        let dir = body["audio_directory"].as_str().unwrap();
        assert!(std::path::Path::new(dir).is_absolute());
        assert_eq!(dir, harness.state.tts.store().dir().display().to_string());
    }

    #[tokio::test]
    async fn panics_become_500_json() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["details"], "kaboom");
    }
}
