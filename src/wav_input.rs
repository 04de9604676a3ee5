//! WAV loading for offline analysis.

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Reads a WAV file as mono `f32` samples, averaging all channels.
/// Integer formats are scaled to [-1, 1). Returns the samples and the file's
/// sample rate.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path).with_context(|| format!("Failed to open WAV {:?}", path))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(anyhow!("WAV {:?} has no channels", path));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("Failed to decode {:?}", path))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("Failed to decode {:?}", path))?
        }
    };

    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect::<Vec<_>>();

    log::debug!(
        target: "wav_input",
        "Loaded {:?}: {} Hz, {} ch, {}-bit {:?}, {} frames",
        path, spec.sample_rate, channels, spec.bits_per_sample, spec.sample_format, mono.len()
    );
    Ok((mono, spec.sample_rate))
}
