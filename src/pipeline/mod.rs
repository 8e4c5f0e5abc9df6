//! Utterance pipeline
//!
//! One finished recording in, one spoken reply out:
//!
//! ```text
//! artifact ─▶ transcribe ─▶ [lang: correct + speak] ─▶ prompt ─▶ generate ─▶ speak
//! ```
//!
//! Every step is a blocking call into an engine and the steps run strictly in
//! order. Engine errors are returned to the caller untouched.

pub mod prompt;

use crate::error::VoxtalkError;
use crate::generate::{Generator, SamplingParams};
use crate::speech::Synthesizer;
use crate::state::Mode;
use crate::transcribe::Transcriber;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub use prompt::PromptBuilder;

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Trimmed transcript
    pub transcript: String,
    /// Grammar correction, when one was produced
    pub correction: Option<String>,
    /// Trimmed reply (empty if the transcript was empty)
    pub reply: String,
}

/// Runs transcription, generation and synthesis for finished utterances
pub struct Pipeline {
    transcriber: Box<dyn Transcriber>,
    generator: Box<dyn Generator>,
    synth: Arc<dyn Synthesizer>,
    prompts: PromptBuilder,
    max_tokens: u32,
}

impl Pipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        generator: Box<dyn Generator>,
        synth: Arc<dyn Synthesizer>,
        prompts: PromptBuilder,
        max_tokens: u32,
    ) -> Self {
        Self {
            transcriber,
            generator,
            synth,
            prompts,
            max_tokens,
        }
    }

    /// Run one cycle and remove the artifact afterwards, whatever the outcome
    pub fn process_utterance(&self, path: &Path, mode: Mode) -> Result<CycleReport, VoxtalkError> {
        let result = self.run_cycle(path, mode);
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {:?}: {}", path, e);
            }
        }
        result
    }

    /// Transcribe `path` and answer it under `mode`
    pub fn run_cycle(&self, path: &Path, mode: Mode) -> Result<CycleReport, VoxtalkError> {
        let start = Instant::now();
        let transcript = self.transcriber.transcribe_file(path)?.trim().to_string();

        if transcript.is_empty() {
            tracing::debug!("Empty transcript, skipping generation");
            return Ok(CycleReport::default());
        }
        tracing::info!("Heard: {:?}", transcript);

        let mut report = CycleReport {
            transcript,
            ..CycleReport::default()
        };

        if mode == Mode::Lang {
            let correction = self.correct(&report.transcript)?;
            if !correction.is_empty() {
                tracing::info!("Correction: {:?}", correction);
                self.synth.speak(&correction)?;
                report.correction = Some(correction);
            }
        }

        let user_text = report
            .correction
            .as_deref()
            .unwrap_or(&report.transcript);
        let prompt = self.prompts.reply_prompt(user_text);
        tracing::trace!("Prompt: {:?}", prompt);

        let params = SamplingParams::reply(self.max_tokens, self.prompts.stop_markers());
        report.reply = self.generator.complete(&prompt, &params)?.trim().to_string();

        if report.reply.is_empty() {
            tracing::debug!("Empty reply, nothing to speak");
        } else {
            tracing::info!("Reply: {:?}", report.reply);
            self.synth.speak(&report.reply)?;
        }

        tracing::debug!("Cycle completed in {:.2}s", start.elapsed().as_secs_f32());
        Ok(report)
    }

    fn correct(&self, text: &str) -> Result<String, VoxtalkError> {
        let prompt = self.prompts.correction_prompt(text);
        let params = SamplingParams::correction(self.prompts.stop_markers());
        Ok(self.generator.complete(&prompt, &params)?.trim().to_string())
    }
}
