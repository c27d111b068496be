//! WSOLA time-stretch.
//!
//! Frames of the input are windowed and overlap-added at a fixed output hop,
//! while the input position advances by `hop * rate`. Each frame's exact start
//! is nudged within a small tolerance so it lines up with the natural
//! continuation of the previous frame, which keeps the waveform phase-coherent.
//! Duration changes, sample rate does not.

use std::path::Path;

use super::{read_waveform, write_waveform, AudioError, Waveform};
use crate::store::remove_temp;

pub const MIN_RATE: f32 = 0.25;
pub const MAX_RATE: f32 = 4.0;

const FRAME: usize = 1024;
const HOP: usize = FRAME / 2;
const TOLERANCE: usize = 256;

/// Stretch every channel of a waveform along one shared set of frame starts.
///
/// `rate > 1.0` shortens, `rate < 1.0` lengthens. Alignment is searched on
/// the mono mix, so channels stay sample-locked.
pub fn stretch_waveform(waveform: &Waveform, rate: f32) -> Result<Waveform, AudioError> {
    let mix;
    let guide: &[f32] = match waveform.channels.as_slice() {
        [only] => only.as_slice(),
        channels => {
            mix = mono_mix(channels);
            mix.as_slice()
        }
    };

    let plan = Plan::new(guide, rate)?;
    let window = hann(FRAME);
    let channels = waveform
        .channels
        .iter()
        .map(|channel| plan.render(channel, &window))
        .collect();

    Ok(Waveform {
        spec: waveform.spec,
        channels,
    })
}

/// Stretch a WAV file in place, keeping its spec.
///
/// The stretched audio is written next to the original and renamed over it,
/// so on any error the original file is left untouched.
pub fn stretch_file(path: &Path, rate: f32) -> Result<usize, AudioError> {
    let waveform = read_waveform(path)?;
    let stretched = stretch_waveform(&waveform, rate)?;
    replace_with(path, &stretched)?;
    Ok(stretched.frames())
}

/// Write `waveform` to a staging file beside `path`, then rename it over `path`.
/// The staging file never outlives a failure.
fn replace_with(path: &Path, waveform: &Waveform) -> Result<(), AudioError> {
    let staging = path.with_extension("stretch.wav");

    let committed = write_waveform(&staging, waveform)
        .and_then(|()| std::fs::rename(&staging, path).map_err(AudioError::from));

    if committed.is_err() {
        if let Err(e) = remove_temp(&staging) {
            tracing::warn!("Could not remove staging file {}: {}", staging.display(), e);
        }
    }
    committed
}

/// Frame starts chosen once for a signal, replayable over any signal of the same length.
struct Plan {
    len: usize,
    out_len: usize,
    starts: Vec<usize>,
}

impl Plan {
    fn new(guide: &[f32], rate: f32) -> Result<Self, AudioError> {
        if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(AudioError::UnsupportedRate(rate));
        }
        if guide.len() < FRAME {
            return Err(AudioError::TooShort {
                frames: guide.len(),
                required: FRAME,
            });
        }

        let out_len = (guide.len() as f64 / rate as f64).round() as usize;
        let padded = pad(guide);
        let last_start = padded.len() - FRAME - HOP;

        let mut starts = Vec::with_capacity(out_len / HOP + 1);
        let mut previous = 0usize;
        for k in 0.. {
            if k * HOP >= out_len {
                break;
            }
            let start = if k == 0 {
                0
            } else {
                let nominal = ((k * HOP) as f64 * rate as f64).round() as usize;
                best_alignment(&padded, previous + HOP, nominal, last_start)
            };
            starts.push(start);
            previous = start;
        }

        Ok(Self {
            len: guide.len(),
            out_len,
            starts,
        })
    }

    /// Overlap-add `input` at the planned starts. `input` must match the guide's length.
    fn render(&self, input: &[f32], window: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.len);
        let padded = pad(input);

        let mut output = vec![0.0f32; self.out_len + FRAME];
        let mut weight = vec![0.0f32; self.out_len + FRAME];

        for (k, &start) in self.starts.iter().enumerate() {
            let out_pos = k * HOP;
            for i in 0..FRAME {
                output[out_pos + i] += padded[start + i] * window[i];
                weight[out_pos + i] += window[i];
            }
        }

        output.truncate(self.out_len);
        for (sample, w) in output.iter_mut().zip(weight) {
            if w > 1e-6 {
                *sample /= w;
            }
        }
        output
    }
}

/// Zero padding lets frames and their similarity search run past the end.
fn pad(input: &[f32]) -> Vec<f32> {
    let mut padded = Vec::with_capacity(input.len() + 2 * FRAME + TOLERANCE);
    padded.extend_from_slice(input);
    padded.resize(input.len() + 2 * FRAME + TOLERANCE, 0.0);
    padded
}

fn mono_mix(channels: &[Vec<f32>]) -> Vec<f32> {
    let len = channels.iter().map(Vec::len).min().unwrap_or(0);
    let count = channels.len().max(1) as f32;
    (0..len)
        .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / count)
        .collect()
}

/// Pick the frame start near `nominal` whose head best matches `natural`,
/// the sample run that would have followed the previous frame.
fn best_alignment(signal: &[f32], natural: usize, nominal: usize, last_start: usize) -> usize {
    let nominal = nominal.min(last_start);
    let natural = natural.min(last_start);
    let lo = nominal.saturating_sub(TOLERANCE);
    let hi = (nominal + TOLERANCE).min(last_start);

    let reference = &signal[natural..natural + HOP];
    let mut best = nominal;
    let mut best_score = f32::NEG_INFINITY;

    for candidate in lo..=hi {
        let score: f32 = reference
            .iter()
            .zip(&signal[candidate..candidate + HOP])
            .map(|(a, b)| a * b)
            .sum();
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    best
}

fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let x = std::f32::consts::PI * i as f32 / len as f32;
            x.sin().powi(2)
        })
        .collect()
}
