pub mod piper;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio;
use crate::dialogue::DialogueSegment;
use crate::error::AppError;
use crate::store::{remove_temp, AudioStore};

pub use piper::PiperEngine;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Voice model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("{0}")]
    Init(String),

    #[error("{0}")]
    Synthesis(String),

    #[error("Engine produced no audio")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid voice config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text-to-speech backend, treated as a black box.
pub trait SpeechEngine: Send + Sync {
    /// Render `text` to a WAV file at `output`.
    fn synthesize(&self, text: &str, output: &Path) -> Result<(), EngineError>;
}

/// Outcome of loading the engine at startup. The server runs in both states.
#[derive(Clone)]
pub enum EngineState {
    Ready(Arc<dyn SpeechEngine>),
    Unavailable(String),
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }
}

/// Load the Piper model once. Failure is logged and kept as a state.
pub fn init_engine(model_path: &Path) -> EngineState {
    match PiperEngine::load(model_path) {
        Ok(engine) => {
            tracing::info!("TTS model loaded: {}", model_path.display());
            EngineState::Ready(Arc::new(engine))
        }
        Err(e) => {
            tracing::error!("Failed to load TTS model {}: {}", model_path.display(), e);
            EngineState::Unavailable(e.to_string())
        }
    }
}

/// What a validated `/tts` request asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisJob {
    Text(String),
    Dialogue(Vec<DialogueSegment>),
}

/// Failures that degrade the result instead of failing the request.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Recovered {
    /// Speed adjustment failed; the unmodified segment was used.
    #[error("Speed adjustment {speed}x failed for segment {index}, using original: {reason}")]
    StretchSkipped {
        index: usize,
        speed: f32,
        reason: String,
    },

    /// A temp segment could not be deleted and is left on disk.
    #[error("Could not remove temp segment {}: {reason}", .path.display())]
    SegmentNotRemoved { path: PathBuf, reason: String },
}

#[derive(Debug)]
pub struct GeneratedAudio {
    pub filename: String,
    pub path: PathBuf,
    pub recovered: Vec<Recovered>,
}

pub struct TtsService {
    engine: EngineState,
    store: AudioStore,
}

impl TtsService {
    pub fn new(engine: EngineState, store: AudioStore) -> Self {
        Self { engine, store }
    }

    pub fn engine_loaded(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    pub fn ensure_ready(&self) -> Result<&Arc<dyn SpeechEngine>, AppError> {
        match &self.engine {
            EngineState::Ready(engine) => Ok(engine),
            EngineState::Unavailable(reason) => Err(AppError::EngineUnavailable(reason.clone())),
        }
    }

    /// Run a job to completion on the calling thread.
    pub fn synthesize(&self, job: &SynthesisJob) -> Result<GeneratedAudio, AppError> {
        let engine = self.ensure_ready()?;
        match job {
            SynthesisJob::Text(text) => self.synthesize_text(engine.as_ref(), text),
            SynthesisJob::Dialogue(segments) => self.synthesize_dialogue(engine.as_ref(), segments),
        }
    }

    fn synthesize_text(
        &self,
        engine: &dyn SpeechEngine,
        text: &str,
    ) -> Result<GeneratedAudio, AppError> {
        let filename = AudioStore::new_filename();
        let path = self.store.output_path(&filename);

        tracing::info!("Synth text: {} chars -> {}", text.chars().count(), filename);
        if let Err(e) = engine.synthesize(text, &path) {
            self.discard(std::slice::from_ref(&path));
            return Err(e.into());
        }

        Ok(GeneratedAudio {
            filename,
            path,
            recovered: Vec::new(),
        })
    }

    fn synthesize_dialogue(
        &self,
        engine: &dyn SpeechEngine,
        segments: &[DialogueSegment],
    ) -> Result<GeneratedAudio, AppError> {
        let request_id = AudioStore::new_request_id();
        let mut written: Vec<PathBuf> = Vec::with_capacity(segments.len());
        let mut recovered = Vec::new();

        for segment in segments {
            let path = self.store.segment_path(&request_id, segment.index);
            let speed = segment.profile.speed_multiplier;
            tracing::info!(
                "Synth segment {}: role={}, speed={}, text={}...",
                segment.index,
                segment.role,
                speed,
                preview(&segment.text)
            );

            written.push(path.clone());
            if let Err(e) = engine.synthesize(&segment.text, &path) {
                self.discard(&written);
                return Err(e.into());
            }

            if segment.profile.is_neutral() {
                continue;
            }

            match audio::stretch_file(&path, speed) {
                Ok(frames) => tracing::info!(
                    "Applied speed adjustment {}x to segment {} ({} frames)",
                    speed,
                    segment.index,
                    frames
                ),
                Err(e) => {
                    let skipped = Recovered::StretchSkipped {
                        index: segment.index,
                        speed,
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", skipped);
                    recovered.push(skipped);
                }
            }
        }

        let filename = AudioStore::new_filename();
        let output = self.store.output_path(&filename);

        match audio::concatenate(&written, &output) {
            Ok(frames) => tracing::info!(
                "Concatenated {} segments into {} ({} frames)",
                written.len(),
                filename,
                frames
            ),
            Err(e) => {
                self.discard(&written);
                self.discard(std::slice::from_ref(&output));
                return Err(e.into());
            }
        }

        recovered.extend(self.discard(&written));

        Ok(GeneratedAudio {
            filename,
            path: output,
            recovered,
        })
    }

    /// Best-effort removal of temp files. Failures are logged and returned.
    fn discard(&self, paths: &[PathBuf]) -> Vec<Recovered> {
        paths
            .iter()
            .filter_map(|path| {
                let e = remove_temp(path).err()?;
                let failure = Recovered::SegmentNotRemoved {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", failure);
                Some(failure)
            })
            .collect()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
