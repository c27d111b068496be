use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{describe_spec, AudioError};

/// Concatenate WAV files in order into `output`, returning the frames written.
///
/// The first file's spec becomes the output header. Later files with a
/// different sample rate are appended verbatim under that header, which
/// plays them back at the wrong speed; the mismatch is only logged. Files
/// whose channel layout or sample encoding differ are rejected since their
/// samples cannot be written under the canonical encoding at all.
pub fn concatenate(inputs: &[PathBuf], output: &Path) -> Result<u64, AudioError> {
    let (first, rest) = inputs.split_first().ok_or(AudioError::NoInputs)?;

    let first_reader = open(first)?;
    let canonical = first_reader.spec();

    let mut writer = WavWriter::create(output, canonical).map_err(|e| AudioError::wav(output, e))?;
    let mut frames = append(&mut writer, first_reader, first, output)?;

    for path in rest {
        let reader = open(path)?;
        let spec = reader.spec();
        check_compatible(&canonical, &spec, path)?;
        if spec.sample_rate != canonical.sample_rate {
            tracing::warn!(
                "{} is {} Hz but output header says {} Hz; copying samples unchanged",
                path.display(),
                spec.sample_rate,
                canonical.sample_rate
            );
        }
        frames += append(&mut writer, reader, path, output)?;
    }

    writer.finalize().map_err(|e| AudioError::wav(output, e))?;

    Ok(frames)
}

fn open(path: &Path) -> Result<WavReader<std::io::BufReader<std::fs::File>>, AudioError> {
    WavReader::open(path).map_err(|e| AudioError::wav(path, e))
}

fn check_compatible(canonical: &WavSpec, spec: &WavSpec, path: &Path) -> Result<(), AudioError> {
    if spec.channels == canonical.channels
        && spec.bits_per_sample == canonical.bits_per_sample
        && spec.sample_format == canonical.sample_format
    {
        return Ok(());
    }

    Err(AudioError::IncompatibleFormat {
        path: path.to_path_buf(),
        expected: describe_spec(canonical),
        found: describe_spec(spec),
    })
}

fn append<W>(
    writer: &mut WavWriter<W>,
    reader: WavReader<std::io::BufReader<std::fs::File>>,
    source: &Path,
    output: &Path,
) -> Result<u64, AudioError>
where
    W: std::io::Write + std::io::Seek,
{
    let frames = reader.duration() as u64;

    match reader.spec().sample_format {
        SampleFormat::Int => {
            for sample in reader.into_samples::<i32>() {
                let sample = sample.map_err(|e| AudioError::wav(source, e))?;
                writer
                    .write_sample(sample)
                    .map_err(|e| AudioError::wav(output, e))?;
            }
        }
        SampleFormat::Float => {
            for sample in reader.into_samples::<f32>() {
                let sample = sample.map_err(|e| AudioError::wav(source, e))?;
                writer
                    .write_sample(sample)
                    .map_err(|e| AudioError::wav(output, e))?;
            }
        }
    }

    Ok(frames)
}
