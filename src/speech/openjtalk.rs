//! Open JTalk speech backend
//!
//! `open_jtalk -x <dic> -m <voice> -r <speed> -ow <file>` reads text on stdin.

use super::{run_with_stdin, Synthesizer};
use crate::audio::playback::play_wav;
use crate::config::TtsConfig;
use crate::error::SynthError;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct OpenJtalkSynthesizer {
    binary: PathBuf,
    dictionary: PathBuf,
    voice: PathBuf,
    speed: f32,
    volume: f32,
}

impl OpenJtalkSynthesizer {
    pub fn new(config: &TtsConfig) -> Result<Self, SynthError> {
        let binary = which::which("open_jtalk")
            .map_err(|_| SynthError::BinaryNotFound("open_jtalk".into()))?;

        let dictionary = config
            .openjtalk_dic
            .clone()
            .ok_or_else(|| SynthError::CommandFailed("tts.openjtalk_dic is not set".into()))?;
        let voice = config
            .openjtalk_voice
            .clone()
            .ok_or_else(|| SynthError::CommandFailed("tts.openjtalk_voice is not set".into()))?;

        Ok(Self {
            binary,
            dictionary,
            voice,
            speed: config.openjtalk_speed,
            volume: config.volume,
        })
    }

    fn command(&self, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-x")
            .arg(&self.dictionary)
            .arg("-m")
            .arg(&self.voice)
            .args(["-r", &self.speed.to_string()])
            .arg("-ow")
            .arg(output);
        command
    }

    /// Synthesize `text` into `output`
    pub fn render(&self, text: &str, output: &Path) -> Result<(), SynthError> {
        run_with_stdin(self.command(output), text)
    }
}

impl Synthesizer for OpenJtalkSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SynthError> {
        let wav = tempfile::Builder::new()
            .prefix("voxtalk-jtalk-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| SynthError::CommandFailed(e.to_string()))?;

        self.render(text, wav.path())?;
        play_wav(wav.path(), self.volume)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "openjtalk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let synth = OpenJtalkSynthesizer {
            binary: "open_jtalk".into(),
            dictionary: "/dic".into(),
            voice: "/mei.htsvoice".into(),
            speed: 1.0,
            volume: 1.0,
        };
        let command = synth.command(Path::new("/tmp/out.wav"));
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-x", "/dic", "-m", "/mei.htsvoice", "-r", "1", "-ow", "/tmp/out.wav"]
        );
    }
}
