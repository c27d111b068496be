use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use hound::{SampleFormat, WavSpec, WavWriter};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use super::voice::Voice;
use super::{EngineError, SpeechEngine};

/// Piper VITS model run through ONNX Runtime.
///
/// The session is behind a mutex, so concurrent requests synthesize one at a time.
pub struct PiperEngine {
    session: Mutex<Session>,
    voice: Voice,
    noise_scale: f32,
    length_scale: f32,
    noise_w: f32,
}

impl PiperEngine {
    pub fn load(model_path: &Path) -> Result<Self, EngineError> {
        let voice = Voice::load(model_path)?;

        let session = Session::builder()
            .map_err(|e| EngineError::Init(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EngineError::Init(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| EngineError::Init(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&voice.model_path)
            .map_err(|e| EngineError::Init(format!("Failed to load model: {}", e)))?;

        let inference = voice.config.inference.clone().unwrap_or_default();

        Ok(Self {
            session: Mutex::new(session),
            voice,
            noise_scale: inference.noise_scale,
            length_scale: inference.length_scale,
            noise_w: inference.noise_w,
        })
    }

    fn infer(&self, phoneme_ids: &[i64]) -> Result<Vec<f32>, EngineError> {
        let input_len = phoneme_ids.len();

        // input: [batch, sequence] = [1, phoneme_count]
        let input_value = Value::from_array((vec![1, input_len], phoneme_ids.to_vec()))
            .map_err(|e| EngineError::Synthesis(format!("Failed to create input tensor: {}", e)))?;

        let lengths_value = Value::from_array((vec![1], vec![input_len as i64]))
            .map_err(|e| EngineError::Synthesis(format!("Failed to create lengths tensor: {}", e)))?;

        // scales: [noise_scale, length_scale, noise_w]
        let scales_value = Value::from_array((
            vec![3],
            vec![self.noise_scale, self.length_scale, self.noise_w],
        ))
        .map_err(|e| EngineError::Synthesis(format!("Failed to create scales tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::Synthesis("Inference session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![input_value, lengths_value, scales_value])
            .map_err(|e| EngineError::Synthesis(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("output")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| EngineError::Synthesis("Missing output tensor".to_string()))?;

        let output_view = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Synthesis(format!("Failed to extract output tensor: {}", e)))?;

        Ok(output_view.1.iter().copied().collect())
    }
}

impl SpeechEngine for PiperEngine {
    fn synthesize(&self, text: &str, output: &Path) -> Result<(), EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Synthesis("Cannot synthesize empty text".to_string()));
        }

        let phonemes = phonemize(text, self.voice.espeak_voice())?;
        let ids = phonemes_to_ids(&phonemes, &self.voice.config.phoneme_id_map);
        let samples = self.infer(&ids)?;
        if samples.is_empty() {
            return Err(EngineError::EmptyOutput);
        }

        write_wav(output, &samples, self.voice.config.audio.sample_rate)
    }
}

/// Convert text to phonemes using espeak-ng
pub fn phonemize(text: &str, voice: &str) -> Result<String, EngineError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let output = Command::new("espeak-ng")
        .args(["--ipa", "-q", "-v", voice, text])
        .output()
        .map_err(|e| {
            EngineError::Synthesis(format!(
                "Failed to run espeak-ng (is it installed?): {}",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Synthesis(format!("espeak-ng failed: {}", stderr)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Convert phonemes to IDs using the voice's phoneme map
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<String, Vec<i64>>) -> Vec<i64> {
    let mut ids = Vec::new();

    match id_map.get("^") {
        Some(bos) => ids.extend(bos),
        None => ids.push(0),
    }

    let pad = id_map.get("_");
    for ch in phonemes.chars() {
        if let Some(mapped) = id_map.get(&ch.to_string()) {
            ids.extend(mapped);
        }
        if let Some(pad) = pad {
            ids.extend(pad);
        }
    }

    match id_map.get("$") {
        Some(eos) => ids.extend(eos),
        None => ids.push(0),
    }

    ids
}

/// Write f32 model output as 16-bit mono PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), EngineError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let wav_err = |e: hound::Error| EngineError::Synthesis(format!("Failed to write WAV: {}", e));

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for sample in samples {
        // f32 [-1.0, 1.0] to i16 with 2x gain boost
        let scaled = (sample * 2.0 * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(scaled).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}
