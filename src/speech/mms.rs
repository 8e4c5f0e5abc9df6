//! MMS speech backend
//!
//! Runs `tts.mms_command` through `sh -c` with the text on stdin. The
//! command must write a WAV file to the path substituted for `{output}`.

use super::{run_with_stdin, Synthesizer};
use crate::audio::playback::play_wav;
use crate::config::TtsConfig;
use crate::error::SynthError;
use std::path::Path;
use std::process::Command;

pub struct MmsSynthesizer {
    template: String,
    volume: f32,
}

impl MmsSynthesizer {
    pub fn new(config: &TtsConfig) -> Result<Self, SynthError> {
        let template = config
            .mms_command
            .clone()
            .ok_or_else(|| SynthError::CommandFailed("tts.mms_command is not set".into()))?;
        if !template.contains("{output}") {
            return Err(SynthError::CommandFailed(
                "tts.mms_command has no {output} placeholder".into(),
            ));
        }
        Ok(Self {
            template,
            volume: config.volume,
        })
    }

    fn shell_line(&self, output: &Path) -> String {
        let quoted = format!("'{}'", output.display().to_string().replace('\'', r"'\''"));
        self.template.replace("{output}", &quoted)
    }

    /// Synthesize `text` into `output`
    pub fn render(&self, text: &str, output: &Path) -> Result<(), SynthError> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(self.shell_line(output));
        run_with_stdin(command, text)
    }
}

impl Synthesizer for MmsSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SynthError> {
        let wav = tempfile::Builder::new()
            .prefix("voxtalk-mms-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| SynthError::CommandFailed(e.to_string()))?;

        self.render(text, wav.path())?;
        play_wav(wav.path(), self.volume)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mms"
    }
}
