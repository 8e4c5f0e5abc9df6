//! Signal gateway
//!
//! Entry points for asynchronous control requests. Each one mutates the
//! shared [`Session`] under its lock and returns; capture stop waits and
//! speech synthesis always happen with the lock released.

pub mod bridge;
pub mod signals;

use crate::error::VoxtalkError;
use crate::speech::Synthesizer;
use crate::state::{Mode, Session};
use rand::seq::SliceRandom;
use std::sync::Arc;

pub use signals::ControlSignal;

/// Applies control requests to the session
pub struct SignalGateway {
    session: Arc<Session>,
    synth: Arc<dyn Synthesizer>,
    /// Topic prompts for the session language
    topics: Vec<String>,
}

impl SignalGateway {
    pub fn new(session: Arc<Session>, synth: Arc<dyn Synthesizer>, topics: Vec<String>) -> Self {
        Self {
            session,
            synth,
            topics,
        }
    }

    /// Flip listening; returns the new value
    pub fn toggle(&self) -> bool {
        let listening = self.session.toggle();
        tracing::info!(
            "Listening {}",
            if listening { "on" } else { "off" }
        );
        listening
    }

    pub fn force_on(&self) {
        let started = self.session.force_on();
        tracing::info!("Listening on (forced{})", if started { ", recorder started" } else { "" });
    }

    pub fn force_off(&self) {
        let stopped = self.session.force_off();
        tracing::info!("Listening off (forced{})", if stopped { ", recorder stopped" } else { "" });
    }

    pub fn set_mode(&self, mode: Mode) {
        let previous = self.session.set_mode(mode);
        if previous != mode {
            tracing::info!("Mode: {} -> {}", previous, mode);
        } else {
            tracing::debug!("Mode already {}", mode);
        }
    }

    /// Speak a random topic prompt, then make sure the reply gets recorded.
    ///
    /// Returns the prompt that was spoken, or `None` when no topics are
    /// configured for the session language.
    pub fn trigger_topic(&self) -> Result<Option<String>, VoxtalkError> {
        let Some(topic) = self.topics.choose(&mut rand::thread_rng()).cloned() else {
            tracing::debug!("No topics configured, ignoring topic trigger");
            return Ok(None);
        };

        tracing::info!("Topic: {:?}", topic);
        if self.session.snapshot().capturing {
            // The live recorder keeps running and picks up the prompt too
            tracing::info!("Recorder already live, topic prompt will be part of the recording");
        }
        self.synth.speak(&topic)?;

        if !self.session.is_listening() {
            self.session.force_on();
        }
        Ok(Some(topic))
    }

    /// Route one control signal to its entry point
    pub fn dispatch(&self, signal: ControlSignal) -> Result<(), VoxtalkError> {
        match signal {
            ControlSignal::Toggle => {
                self.toggle();
            }
            ControlSignal::ForceOn => self.force_on(),
            ControlSignal::ForceOff => self.force_off(),
            ControlSignal::Lang | ControlSignal::Memory => {
                if let Some(mode) = signal.mode() {
                    self.set_mode(mode);
                }
            }
            ControlSignal::TriggerTopic => {
                self.trigger_topic()?;
            }
        }
        tracing::debug!("Session: {}", self.session.snapshot());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureLauncher, CommandLauncher, Recorder};
    use crate::pipeline::tests::FakeSynth;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::path::Path;
    use std::process::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Long-running recorder that counts launches
    struct CountingLauncher(Arc<AtomicUsize>);

    impl CaptureLauncher for CountingLauncher {
        fn name(&self) -> &str {
            "counting"
        }

        fn command(&self, output: &Path) -> Command {
            self.0.fetch_add(1, Ordering::SeqCst);
            CommandLauncher::new("sleep", ["30"]).command(output)
        }
    }

    struct Fixture {
        gateway: SignalGateway,
        session: Arc<Session>,
        synth: Arc<FakeSynth>,
        launches: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    fn fixture(topics: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let launches = Arc::new(AtomicUsize::new(0));
        let session = Arc::new(Session::new(Recorder::new(
            Box::new(CountingLauncher(launches.clone())),
            dir.path().join("rec.wav"),
        )));
        let synth = Arc::new(FakeSynth::default());
        let gateway = SignalGateway::new(
            session.clone(),
            synth.clone(),
            topics.iter().map(|t| t.to_string()).collect(),
        );
        Fixture {
            gateway,
            session,
            synth,
            launches,
            _dir: dir,
        }
    }

    #[test]
    fn test_toggle_parity() {
        let f = fixture(&[]);
        for i in 1..=6 {
            let listening = f.gateway.toggle();
            assert_eq!(listening, i % 2 == 1);
        }
        assert!(!f.session.is_listening());
        assert!(!f.session.snapshot().capturing);
    }

    #[test]
    fn test_mode_is_last_write() {
        let f = fixture(&[]);
        f.gateway.dispatch(ControlSignal::Lang).unwrap();
        f.gateway.dispatch(ControlSignal::Memory).unwrap();
        assert_eq!(f.session.mode(), Mode::Memory);
    }

    #[test]
    fn test_force_on_twice_launches_once() {
        let f = fixture(&[]);
        f.gateway.force_on();
        f.gateway.force_on();
        assert_eq!(f.launches.load(Ordering::SeqCst), 1);
        assert!(f.session.is_listening());
        f.gateway.force_off();
    }

    #[test]
    fn test_force_off_stops_live_capture() {
        let f = fixture(&[]);
        f.gateway.force_on();
        let pid = f.session.capture_pid().unwrap();

        let started = Instant::now();
        f.gateway.force_off();
        assert!(started.elapsed() < Duration::from_secs(2));

        // Signal 0 only checks for existence
        assert!(kill(Pid::from_raw(pid as i32), None::<Signal>).is_err());
        let snap = f.session.snapshot();
        assert!(!snap.listening);
        assert!(!snap.capturing);
        assert!(!f.session.recorder().output().exists());
    }

    #[test]
    fn test_topic_with_empty_list_is_noop() {
        let f = fixture(&[]);
        f.gateway.set_mode(Mode::Lang);

        assert_eq!(f.gateway.trigger_topic().unwrap(), None);
        assert!(f.synth.spoken.lock().unwrap().is_empty());
        assert!(!f.session.is_listening());
        assert_eq!(f.session.mode(), Mode::Lang);
        assert_eq!(f.launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_topic_speaks_and_arms() {
        let f = fixture(&["What did you eat today?"]);

        let topic = f.gateway.trigger_topic().unwrap();
        assert_eq!(topic.as_deref(), Some("What did you eat today?"));
        assert_eq!(
            *f.synth.spoken.lock().unwrap(),
            vec!["What did you eat today?".to_string()]
        );
        assert!(f.session.is_listening());
        assert_eq!(f.launches.load(Ordering::SeqCst), 1);
        f.gateway.force_off();
    }

    #[test]
    fn test_topic_while_listening_does_not_relaunch() {
        let f = fixture(&["Tell me about your weekend."]);
        f.gateway.force_on();
        let pid = f.session.capture_pid();

        f.gateway.trigger_topic().unwrap();
        assert_eq!(
            *f.synth.spoken.lock().unwrap(),
            vec!["Tell me about your weekend.".to_string()]
        );
        // Same recorder keeps running through the prompt
        assert_eq!(f.session.capture_pid(), pid);
        assert_eq!(f.launches.load(Ordering::SeqCst), 1);
        f.gateway.force_off();
    }
}
