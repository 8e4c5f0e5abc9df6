//! Audio module
//!
//! Capture is delegated to an external recorder process (sox) that writes a
//! WAV file and exits on its own once the speaker goes quiet. This module
//! owns that process, reads the finished file back for transcription and
//! plays synthesized speech.

pub mod playback;
pub mod recorder;

use crate::error::AudioError;
use std::path::Path;

pub use recorder::{
    artifact_has_audio, stop_recording, CaptureHandle, CaptureLauncher, CommandLauncher, Recorder,
    SoxLauncher,
};

/// Sample rate expected by whisper
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Load a WAV file as f32 mono samples at 16kHz
pub fn load_wav(path: &Path) -> Result<Vec<f32>, AudioError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| AudioError::File(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    tracing::debug!(
        "Audio format: {} Hz, {} channel(s), {:?}",
        spec.sample_rate,
        spec.channels,
        spec.sample_format
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
    };

    // Mix to mono if stereo
    let mono_samples: Vec<f32> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok(resample(&mono_samples, spec.sample_rate, WHISPER_SAMPLE_RATE))
}

/// Simple linear resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
