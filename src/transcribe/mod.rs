//! Speech-to-text transcription module
//!
//! Turns a finished utterance file into text using local whisper.cpp
//! inference (whisper-rs crate). The language is fixed for the whole session.

pub mod whisper;

use crate::config::WhisperConfig;
use crate::error::TranscribeError;
use std::path::Path;

/// Trait for speech-to-text implementations
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV file to text (untrimmed)
    fn transcribe_file(&self, path: &Path) -> Result<String, TranscribeError>;
}

/// Load the whisper model for the given session language
pub fn create_transcriber(
    config: &WhisperConfig,
    language: &str,
) -> Result<Box<dyn Transcriber>, TranscribeError> {
    tracing::info!(
        "Creating transcriber: model={:?}, language={}",
        config.model,
        language
    );
    Ok(Box::new(whisper::WhisperTranscriber::new(config, language)?))
}
