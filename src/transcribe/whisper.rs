//! Whisper-based speech-to-text transcription
//!
//! Uses whisper.cpp via the whisper-rs crate for fast, local transcription.

use super::Transcriber;
use crate::audio::{self, WHISPER_SAMPLE_RATE};
use crate::config::{base_language, WhisperConfig};
use crate::error::TranscribeError;
use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-based transcriber
pub struct WhisperTranscriber {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Whisper language code ("ja", "en", "auto", ...)
    language: String,
    /// Number of threads to use
    threads: usize,
}

impl WhisperTranscriber {
    /// Create a new whisper transcriber
    pub fn new(config: &WhisperConfig, language: &str) -> Result<Self, TranscribeError> {
        let model_path = &config.model;
        if !model_path.exists() {
            return Err(TranscribeError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TranscribeError::ModelNotFound("Invalid path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| TranscribeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let threads = config
            .threads
            .unwrap_or_else(|| num_cpus::get().min(4));

        Ok(Self {
            ctx,
            // whisper only knows base language codes
            language: base_language(language).to_string(),
            threads,
        })
    }

    fn transcribe_samples(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        // Create state for this transcription
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }
        params.set_translate(false);
        params.set_n_threads(self.threads as i32);

        // Disable output we don't need
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        // No VAD pass: the recorder already cut the segment at silence
        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // Utterances are short; one segment is enough
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        if let Some(audio_ctx) = calculate_audio_ctx(duration_secs) {
            params.set_audio_ctx(audio_ctx);
            tracing::trace!(
                "Using audio_ctx={} for {:.2}s clip",
                audio_ctx,
                duration_secs
            );
        }

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?,
            );
        }

        tracing::info!(
            "Transcription completed in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        Ok(text)
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe_file(&self, path: &Path) -> Result<String, TranscribeError> {
        let samples =
            audio::load_wav(path).map_err(|e| TranscribeError::AudioFormat(e.to_string()))?;

        if samples.is_empty() {
            tracing::debug!("No samples in {:?}", path);
            return Ok(String::new());
        }

        self.transcribe_samples(&samples)
    }
}

/// Calculate audio_ctx parameter for short clips (≤22.5s).
/// Formula: duration_seconds * 50 + 64
fn calculate_audio_ctx(duration_secs: f32) -> Option<i32> {
    if duration_secs <= 22.5 {
        Some((duration_secs * 50.0) as i32 + 64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_ctx_for_short_clip() {
        assert_eq!(calculate_audio_ctx(2.0), Some(164));
        assert_eq!(calculate_audio_ctx(22.5), Some(1189));
    }

    #[test]
    fn test_audio_ctx_for_long_clip() {
        assert_eq!(calculate_audio_ctx(23.0), None);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let config = WhisperConfig {
            model: "/nonexistent/ggml-base.bin".into(),
            threads: None,
        };
        let err = WhisperTranscriber::new(&config, "ja-JP").err().unwrap();
        assert!(matches!(err, TranscribeError::ModelNotFound(_)));
    }
}
