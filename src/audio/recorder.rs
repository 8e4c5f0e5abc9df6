//! Recording lifecycle
//!
//! Each utterance is captured by a short-lived recorder process that writes
//! to a fixed artifact path and exits by itself after a stretch of silence.
//! Completion is observed by polling the process, never by blocking on it.
//!
//! At most one [`CaptureHandle`] exists at a time. The handle slot lives in
//! [`crate::state::Session`], under the same lock as the listening flag.

use crate::config::AudioConfig;
use crate::error::AudioError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// How long a terminated recorder gets to exit before it is killed
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Size of a canonical WAV header. A file no larger than this holds no audio.
const WAV_HEADER_LEN: u64 = 44;

/// Builds the command for one capture process
pub trait CaptureLauncher: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Command that records one utterance into `output`
    fn command(&self, output: &Path) -> Command;
}

/// sox recorder that stops on silence
#[derive(Debug, Clone)]
pub struct SoxLauncher {
    device: String,
    sample_rate: u32,
    silence_stop_secs: f32,
    silence_threshold: String,
}

impl SoxLauncher {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device: config.device.clone(),
            sample_rate: config.sample_rate,
            silence_stop_secs: config.silence_stop_secs,
            silence_threshold: config.silence_threshold.clone(),
        }
    }

    /// Arguments passed to sox, excluding the program name
    pub fn args(&self, output: &Path) -> Vec<String> {
        vec![
            "-q".into(),
            "-t".into(),
            "alsa".into(),
            self.device.clone(),
            "-r".into(),
            self.sample_rate.to_string(),
            "-c".into(),
            "1".into(),
            "-b".into(),
            "16".into(),
            output.display().to_string(),
            // Trim leading silence, then stop after silence_stop_secs below threshold
            "silence".into(),
            "1".into(),
            "0.1".into(),
            self.silence_threshold.clone(),
            "1".into(),
            self.silence_stop_secs.to_string(),
            self.silence_threshold.clone(),
        ]
    }
}

impl CaptureLauncher for SoxLauncher {
    fn name(&self) -> &str {
        "sox"
    }

    fn command(&self, output: &Path) -> Command {
        let mut cmd = Command::new("sox");
        cmd.args(self.args(output));
        cmd
    }
}

/// Arbitrary program with `{output}` substituted in its arguments
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl CaptureLauncher for CommandLauncher {
    fn name(&self) -> &str {
        &self.program
    }

    fn command(&self, output: &Path) -> Command {
        let output = output.display().to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|a| a.replace("{output}", &output)));
        cmd
    }
}

/// Ownership of one live capture process
#[derive(Debug)]
pub struct CaptureHandle {
    child: Child,
    started_at: Instant,
}

impl CaptureHandle {
    /// Process id of the recorder
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Non-blocking check whether the recorder has exited on its own.
    ///
    /// Exit by silence and exit by error look the same here; the caller
    /// inspects the artifact to tell them apart.
    pub fn poll_finished(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(
                    "Recorder {} exited ({}) after {:.1}s",
                    self.child.id(),
                    status,
                    self.elapsed().as_secs_f32()
                );
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to poll recorder {}: {}", self.child.id(), e);
                true
            }
        }
    }

    fn terminate(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }

        let pid = self.child.id();
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!("Failed to send SIGTERM to recorder {}: {}", pid, e);
        }

        let deadline = Instant::now() + STOP_GRACE;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => {
                    tracing::debug!("Recorder {} stopped", pid);
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => {
                    tracing::warn!("Failed to wait for recorder {}: {}", pid, e);
                    break;
                }
            }
        }

        tracing::warn!(
            "Recorder {} did not exit within {:?}, killing",
            pid,
            STOP_GRACE
        );
        if let Err(e) = self.child.kill() {
            tracing::warn!("Failed to kill recorder {}: {}", pid, e);
        }
        let _ = self.child.wait();
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // Never leave an orphaned recorder behind
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Stop a recorder: SIGTERM, wait up to [`STOP_GRACE`], then SIGKILL.
///
/// Blocks for at most the grace period. No-op for `None` or an already
/// exited process. Never call this while holding the session lock.
pub fn stop_recording(handle: Option<CaptureHandle>) {
    if let Some(mut handle) = handle {
        handle.terminate();
    }
}

/// Whether a finished artifact contains any audio
pub fn artifact_has_audio(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() > WAV_HEADER_LEN)
        .unwrap_or(false)
}

/// Starts capture processes for the session's artifact path
pub struct Recorder {
    launcher: Box<dyn CaptureLauncher>,
    output: PathBuf,
}

impl Recorder {
    pub fn new(launcher: Box<dyn CaptureLauncher>, output: PathBuf) -> Self {
        Self { launcher, output }
    }

    /// sox recorder writing to the configured temporary path
    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(Box::new(SoxLauncher::new(config)), config.tmp_wav.clone())
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Launch a recorder. The caller guarantees no other handle is live.
    pub fn start_recording(&self) -> Result<CaptureHandle, AudioError> {
        self.discard_artifact();

        let child = self
            .launcher
            .command(&self.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| AudioError::SpawnFailed {
                program: self.launcher.name().to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Recorder started ({}, pid={}) -> {:?}",
            self.launcher.name(),
            child.id(),
            self.output
        );

        Ok(CaptureHandle {
            child,
            started_at: Instant::now(),
        })
    }

    /// Move a finished artifact out of the recorder's way.
    ///
    /// Returns the new path if the artifact holds audio. An empty or missing
    /// artifact is removed and `None` is returned.
    pub fn claim_artifact(&self) -> Option<PathBuf> {
        if !artifact_has_audio(&self.output) {
            tracing::debug!("Recording is empty, discarding");
            self.discard_artifact();
            return None;
        }

        let claimed = self.output.with_extension("claimed.wav");
        match std::fs::rename(&self.output, &claimed) {
            Ok(()) => Some(claimed),
            Err(e) => {
                tracing::warn!("Failed to claim artifact {:?}: {}", self.output, e);
                self.discard_artifact();
                None
            }
        }
    }

    /// Remove the artifact if present
    pub fn discard_artifact(&self) {
        match std::fs::remove_file(&self.output) {
            Ok(()) => tracing::trace!("Removed artifact {:?}", self.output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove artifact {:?}: {}", self.output, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper() -> Box<dyn CaptureLauncher> {
        Box::new(CommandLauncher::new("sleep", ["30"]))
    }

    fn wait_finished(handle: &mut CaptureHandle) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if handle.poll_finished() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_sox_args() {
        let config = AudioConfig {
            silence_stop_secs: 1.5,
            ..AudioConfig::default()
        };
        let args = SoxLauncher::new(&config).args(Path::new("/tmp/rec.wav"));
        assert_eq!(
            args,
            [
                "-q", "-t", "alsa", "default", "-r", "16000", "-c", "1", "-b", "16",
                "/tmp/rec.wav", "silence", "1", "0.1", "1%", "1", "1.5", "1%"
            ]
        );
    }

    #[test]
    fn test_command_launcher_substitutes_output() {
        let launcher = CommandLauncher::new("sh", ["-c", "touch {output}"]);
        let cmd = launcher.command(Path::new("/tmp/x.wav"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-c", "touch /tmp/x.wav"]);
    }

    #[test]
    fn test_poll_finished_after_self_exit() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rec.wav");
        let recorder = Recorder::new(
            Box::new(CommandLauncher::new("sh", ["-c", "head -c 100 /dev/zero > {output}"])),
            output.clone(),
        );

        let mut handle = recorder.start_recording().unwrap();
        assert!(wait_finished(&mut handle));
        assert!(artifact_has_audio(&output));
    }

    #[test]
    fn test_running_recorder_is_not_finished() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(sleeper(), dir.path().join("rec.wav"));

        let mut handle = recorder.start_recording().unwrap();
        assert!(!handle.poll_finished());
        stop_recording(Some(handle));
    }

    #[test]
    fn test_stop_recording_terminates_within_grace() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(sleeper(), dir.path().join("rec.wav"));

        let handle = recorder.start_recording().unwrap();
        let pid = handle.pid();
        let started = Instant::now();
        stop_recording(Some(handle));

        assert!(started.elapsed() <= STOP_GRACE + Duration::from_millis(500));
        // Signal 0 only checks for existence; the reaped process is gone
        assert!(kill(Pid::from_raw(pid as i32), None::<Signal>).is_err());
    }

    #[test]
    fn test_stop_recording_escalates_to_kill() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            Box::new(CommandLauncher::new("sh", ["-c", "trap '' TERM; while :; do sleep 0.05; done"])),
            dir.path().join("rec.wav"),
        );

        let handle = recorder.start_recording().unwrap();
        let pid = handle.pid();
        // Give the shell time to install its trap
        std::thread::sleep(Duration::from_millis(100));
        stop_recording(Some(handle));
        assert!(kill(Pid::from_raw(pid as i32), None::<Signal>).is_err());
    }

    #[test]
    fn test_stop_recording_none_is_noop() {
        stop_recording(None);
    }

    #[test]
    fn test_start_replaces_stale_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rec.wav");
        std::fs::write(&output, vec![1u8; 500]).unwrap();

        let recorder = Recorder::new(sleeper(), output.clone());
        let handle = recorder.start_recording().unwrap();
        assert!(!output.exists());
        stop_recording(Some(handle));
    }

    #[test]
    fn test_artifact_has_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        assert!(!artifact_has_audio(&path));

        std::fs::write(&path, b"").unwrap();
        assert!(!artifact_has_audio(&path));

        std::fs::write(&path, vec![0u8; 44]).unwrap();
        assert!(!artifact_has_audio(&path));

        std::fs::write(&path, vec![0u8; 45]).unwrap();
        assert!(artifact_has_audio(&path));
    }

    #[test]
    fn test_claim_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rec.wav");
        let recorder = Recorder::new(sleeper(), output.clone());

        assert_eq!(recorder.claim_artifact(), None);

        std::fs::write(&output, vec![0u8; 44]).unwrap();
        assert_eq!(recorder.claim_artifact(), None);
        assert!(!output.exists());

        std::fs::write(&output, vec![0u8; 2048]).unwrap();
        let claimed = recorder.claim_artifact().unwrap();
        assert_eq!(claimed, dir.path().join("rec.claimed.wav"));
        assert!(claimed.exists());
        assert!(!output.exists());
    }

    #[test]
    fn test_spawn_failure_reports_program() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(
            Box::new(CommandLauncher::new("voxtalk-no-such-recorder", Vec::<String>::new())),
            dir.path().join("rec.wav"),
        );
        match recorder.start_recording() {
            Err(AudioError::SpawnFailed { program, .. }) => {
                assert_eq!(program, "voxtalk-no-such-recorder")
            }
            other => panic!("unexpected: {:?}", other.map(|h| h.pid())),
        }
    }
}
