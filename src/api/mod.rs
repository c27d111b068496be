pub mod handlers;
pub mod routes;

use serde::Serialize;
use serde_json::Value;

use crate::dialogue::{self, DialogueTurn};
use crate::error::AppError;
use crate::tts::SynthesisJob;

pub const MAX_TEXT_CHARS: usize = 10000;

#[derive(Debug, Default)]
pub struct TtsRequest {
    pub text: Option<String>,
    pub dialogue: Option<Vec<DialogueTurn>>,
}

impl TtsRequest {
    /// Parse a request body leniently.
    ///
    /// A body that is not JSON reads as an empty request. Fields are taken
    /// independently: `text` only if it is a string, `dialogue` only if it is
    /// an array, so a malformed field never hides a well-formed one.
    pub fn from_body(body: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Ignoring unparseable /tts body: {}", e);
                return Self::default();
            }
        };

        Self {
            text: value.get("text").and_then(Value::as_str).map(str::to_string),
            dialogue: value
                .get("dialogue")
                .and_then(Value::as_array)
                .map(|turns| turns.iter().map(DialogueTurn::from_value).collect()),
        }
    }

    /// Decide between text and dialogue mode.
    pub fn into_job(self) -> Result<SynthesisJob, AppError> {
        let text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let dialogue = self.dialogue.filter(|d| !d.is_empty());

        match (text, dialogue) {
            (None, None) => Err(AppError::BadRequest(
                "'text' or 'dialogue' is required".into(),
            )),
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "Provide either 'text' or 'dialogue', not both".into(),
            )),
            (Some(text), None) => {
                check_length(&text)?;
                Ok(SynthesisJob::Text(text))
            }
            (None, Some(turns)) => {
                let segments = dialogue::segment(&turns);
                if segments.is_empty() {
                    return Err(AppError::BadRequest("No valid dialogue segments".into()));
                }
                for segment in &segments {
                    check_length(&segment.text)?;
                }
                Ok(SynthesisJob::Dialogue(segments))
            }
        }
    }
}

fn check_length(text: &str) -> Result<(), AppError> {
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Text too long (max {} chars)",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub tts_model_loaded: bool,
    pub audio_directory: String,
}
