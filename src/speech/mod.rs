//! Speech synthesis module
//!
//! Backends render text to a temporary WAV file with an external engine and
//! play it to completion:
//! - Open JTalk (Japanese)
//! - MMS via a user supplied shell command (Bulgarian and others)
//! - Disabled, which only logs the text

pub mod mms;
pub mod openjtalk;

use crate::config::{Config, TtsBackend};
use crate::error::SynthError;
use crate::text::NumberReader;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Trait for speech output implementations
pub trait Synthesizer: Send + Sync {
    /// Speak `text` and return once playback has finished
    fn speak(&self, text: &str) -> Result<(), SynthError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Logs instead of speaking
pub struct DisabledSynthesizer;

impl Synthesizer for DisabledSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SynthError> {
        tracing::info!("[TTS] disabled: {}", text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Front end used by the daemon: normalizes text, then hands it to a backend
pub struct Speaker {
    backend: Box<dyn Synthesizer>,
    numbers: Option<NumberReader>,
}

impl Speaker {
    pub fn new(backend: Box<dyn Synthesizer>, numbers: Option<NumberReader>) -> Self {
        Self { backend, numbers }
    }
}

impl Synthesizer for Speaker {
    fn speak(&self, text: &str) -> Result<(), SynthError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let text = match self.numbers {
            Some(ref numbers) => numbers.process(text),
            None => text.to_string(),
        };

        tracing::debug!("Speaking via {}: {:?}", self.backend.name(), text);
        let start = std::time::Instant::now();
        self.backend.speak(&text)?;
        tracing::debug!("Speech finished in {:.2}s", start.elapsed().as_secs_f32());
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}

/// Build the configured speech backend
pub fn create_synthesizer(config: &Config) -> Result<Arc<dyn Synthesizer>, SynthError> {
    let backend: Box<dyn Synthesizer> = match config.tts.backend {
        TtsBackend::Disabled => Box::new(DisabledSynthesizer),
        TtsBackend::OpenJtalk => Box::new(openjtalk::OpenJtalkSynthesizer::new(&config.tts)?),
        TtsBackend::Mms => Box::new(mms::MmsSynthesizer::new(&config.tts)?),
    };
    tracing::info!("Speech output: {}", backend.name());

    let numbers = config
        .text
        .number_pronunciation
        .then(|| NumberReader::new(&config.text, &config.language));

    Ok(Arc::new(Speaker::new(backend, numbers)))
}

/// Run a synthesis command with `text` on stdin and wait for it to exit
pub(crate) fn run_with_stdin(mut command: Command, text: &str) -> Result<(), SynthError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SynthError::CommandFailed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| SynthError::CommandFailed(format!("Failed to write text: {}", e)))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| SynthError::CommandFailed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SynthError::CommandFailed(format!(
            "{}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl Synthesizer for Arc<Recording> {
        fn speak(&self, text: &str) -> Result<(), SynthError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn test_speaker_normalizes_numbers() {
        let spoken = Arc::new(Recording::default());
        let numbers = NumberReader::new(&TextConfig::default(), "en");
        let speaker = Speaker::new(Box::new(spoken.clone()), Some(numbers));

        speaker.speak("  Gate 12  ").unwrap();
        assert_eq!(*spoken.0.lock().unwrap(), vec!["Gate one two".to_string()]);
    }

    #[test]
    fn test_speaker_skips_empty_text() {
        let spoken = Arc::new(Recording::default());
        let speaker = Speaker::new(Box::new(spoken.clone()), None);

        speaker.speak("   ").unwrap();
        assert!(spoken.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_backend_succeeds() {
        assert!(DisabledSynthesizer.speak("hello").is_ok());
    }

    #[test]
    fn test_create_disabled_synthesizer() {
        let config = Config::default();
        let synth = create_synthesizer(&config).unwrap();
        assert_eq!(synth.name(), "disabled");
    }

    #[test]
    fn test_run_with_stdin_reports_failure() {
        let mut command = Command::new("sh");
        command.args(["-c", "cat >/dev/null; echo nope >&2; exit 3"]);
        let err = run_with_stdin(command, "text").unwrap_err();
        assert!(matches!(err, SynthError::CommandFailed(ref msg) if msg.contains("nope")));
    }
}
