use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{EngineError, SpeechEngine};

pub const FRAMES_PER_CHAR: usize = 2205;

/// Writes a 22.05 kHz tone whose length is proportional to the text.
pub struct ToneEngine {
    frames_per_char: usize,
    pub calls: AtomicUsize,
}

impl ToneEngine {
    pub fn with_frames_per_char(frames_per_char: usize) -> Self {
        Self {
            frames_per_char,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self::with_frames_per_char(FRAMES_PER_CHAR)
    }
}

impl SpeechEngine for ToneEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(EngineError::Synthesis("Cannot synthesize empty text".into()));
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| EngineError::Synthesis(e.to_string());

        let mut writer = WavWriter::create(output, spec).map_err(wav_err)?;
        let frames = text.chars().count() * self.frames_per_char;
        for i in 0..frames {
            let t = i as f32 / 22050.0;
            let value = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 6000.0;
            writer.write_sample(value as i16).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)
    }
}

/// Fails on one specific text (or always), otherwise behaves like [`ToneEngine`].
pub struct FailingEngine {
    fail_on: Option<String>,
    inner: ToneEngine,
}

impl FailingEngine {
    pub fn always() -> Self {
        Self {
            fail_on: None,
            inner: ToneEngine::default(),
        }
    }

    pub fn on_text(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            inner: ToneEngine::default(),
        }
    }
}

impl SpeechEngine for FailingEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<(), EngineError> {
        match &self.fail_on {
            Some(target) if target != text => self.inner.synthesize(text, output),
            _ => {
                // Leave a truncated file behind, as a crashed writer would.
                std::fs::write(output, b"RIFF")?;
                Err(EngineError::Synthesis(format!("engine refused {:?}", text)))
            }
        }
    }
}
