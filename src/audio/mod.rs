pub mod concat;
pub mod stretch;

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

pub use concat::concatenate;
pub use stretch::stretch_file;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("no waveform files to concatenate")]
    NoInputs,

    #[error("{path}: incompatible format ({found}), expected {expected}")]
    IncompatibleFormat {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("unsupported stretch rate {0}")]
    UnsupportedRate(f32),

    #[error("audio too short to stretch ({frames} frames, need {required})")]
    TooShort { frames: usize, required: usize },

    #[error("{path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    fn wav(path: &Path, source: hound::Error) -> Self {
        AudioError::Wav {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decoded waveform: one `Vec<f32>` per channel, normalized to [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct Waveform {
    pub spec: WavSpec,
    pub channels: Vec<Vec<f32>>,
}

impl Waveform {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }
}

pub fn describe_spec(spec: &WavSpec) -> String {
    let format = match spec.sample_format {
        SampleFormat::Int => "int",
        SampleFormat::Float => "float",
    };
    format!(
        "{} Hz, {} ch, {}-bit {}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, format
    )
}

pub fn read_waveform(path: &Path) -> Result<Waveform, AudioError> {
    let reader = WavReader::open(path).map_err(|e| AudioError::wav(path, e))?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| AudioError::wav(path, e))?,
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| AudioError::wav(path, e))?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Ok(Waveform { spec, channels })
}

/// Writes `waveform` with its own spec, converting back from normalized floats.
pub fn write_waveform(path: &Path, waveform: &Waveform) -> Result<(), AudioError> {
    let spec = waveform.spec;
    let mut writer = WavWriter::create(path, spec).map_err(|e| AudioError::wav(path, e))?;

    let scale = int_scale(spec.bits_per_sample);
    let max = scale - 1.0;
    for frame in 0..waveform.frames() {
        for channel in &waveform.channels {
            let sample = channel[frame];
            let written = match spec.sample_format {
                SampleFormat::Float => writer.write_sample(sample),
                SampleFormat::Int => {
                    let value = (sample * scale).round().clamp(-scale, max) as i32;
                    writer.write_sample(value)
                }
            };
            written.map_err(|e| AudioError::wav(path, e))?;
        }
    }

    writer.finalize().map_err(|e| AudioError::wav(path, e))
}

fn int_scale(bits_per_sample: u16) -> f32 {
    (1u64 << (bits_per_sample.clamp(1, 32) - 1)) as f32
}
