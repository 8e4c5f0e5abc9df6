//! Session state for the voxtalk daemon
//!
//! One [`Session`] exists per process. It is shared between the session loop
//! and the signal gateway, and every mutation goes through a single
//! `std::sync::Mutex`:
//!
//! - `listening`: whether capture should be active
//! - `mode`: the interaction mode (normal, lang, memory)
//! - the capture slot: a live recorder, a finished recording still being
//!   consumed by the pipeline, or nothing
//!
//! The slot shares the lock with `listening` so that "check listening,
//! then start capture" and "clear listening, then take the handle" are each
//! atomic. Stopping a taken handle (grace period and kill) always happens
//! after the lock is released.
//!
//! While a cycle is consuming a recording the slot stays occupied, so no
//! signal can start a recorder that would hear the spoken reply. The loop
//! releases it through [`Session::rearm`].

use crate::audio::{stop_recording, CaptureHandle, Recorder};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Interaction mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Plain conversation
    #[default]
    Normal,
    /// Grammar correction before every reply
    Lang,
    /// Multi-turn memory (flag only, no prompt effect)
    Memory,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Lang => write!(f, "lang"),
            Mode::Memory => write!(f, "memory"),
        }
    }
}

/// Capture slot
#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Live(CaptureHandle),
    /// Recorder exited; its result is being consumed by the session loop
    Consuming,
}

impl Slot {
    /// Take a live handle, leaving any other state in place
    fn take_live(&mut self) -> Option<CaptureHandle> {
        match std::mem::take(self) {
            Slot::Live(handle) => Some(handle),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Lock-protected session fields
#[derive(Debug, Default)]
struct SessionState {
    listening: bool,
    mode: Mode,
    capture: Slot,
}

/// Point-in-time copy of the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub listening: bool,
    pub mode: Mode,
    pub capturing: bool,
    /// A finished recording is going through the pipeline
    pub processing: bool,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activity = if self.capturing {
            ", recording"
        } else if self.processing {
            ", processing"
        } else {
            ""
        };
        if self.listening {
            write!(f, "Listening ({}{})", self.mode, activity)
        } else {
            write!(f, "Idle ({}{})", self.mode, activity)
        }
    }
}

/// Result of one completion poll by the session loop
#[derive(Debug)]
pub enum CapturePoll {
    /// Not listening
    Idle,
    /// Listening but no recorder is live
    Unarmed,
    /// Recorder still running
    Recording,
    /// Recorder exited and its handle was released. Holds the claimed
    /// artifact, or `None` if the recording was empty. The slot stays
    /// occupied until the next [`Session::rearm`].
    Finished(Option<PathBuf>),
}

/// Process-wide session shared by the loop and the signal gateway
pub struct Session {
    state: Mutex<SessionState>,
    recorder: Recorder,
}

impl Session {
    /// Create an idle session in normal mode
    pub fn new(recorder: Recorder) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            recorder,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A panicking holder cannot leave the flags half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            listening: state.listening,
            mode: state.mode,
            capturing: matches!(state.capture, Slot::Live(_)),
            processing: matches!(state.capture, Slot::Consuming),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    /// Process id of the live recorder, if any
    pub fn capture_pid(&self) -> Option<u32> {
        match &self.lock().capture {
            Slot::Live(handle) => Some(handle.pid()),
            _ => None,
        }
    }

    /// Start a recorder if the slot is empty. Called with the lock held.
    fn arm(&self, state: &mut SessionState) -> bool {
        match state.capture {
            Slot::Empty => {}
            Slot::Live(_) => return false,
            Slot::Consuming => {
                tracing::debug!("Cycle in progress, recorder starts after it");
                return false;
            }
        }
        match self.recorder.start_recording() {
            Ok(handle) => {
                state.capture = Slot::Live(handle);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                false
            }
        }
    }

    /// Stop a handle taken out of the session and drop its partial artifact
    fn discard(&self, handle: Option<CaptureHandle>) -> bool {
        let Some(handle) = handle else {
            return false;
        };
        stop_recording(Some(handle));

        // A new recorder may have been armed during the grace period
        let state = self.lock();
        if !matches!(state.capture, Slot::Live(_)) {
            self.recorder.discard_artifact();
        }
        true
    }

    /// Flip `listening`. Returns the new value.
    ///
    /// Turning on arms a recorder if the slot is empty; turning off stops
    /// the live recorder and discards its artifact.
    pub fn toggle(&self) -> bool {
        let taken = {
            let mut state = self.lock();
            state.listening = !state.listening;
            if state.listening {
                self.arm(&mut state);
                return true;
            }
            state.capture.take_live()
        };
        self.discard(taken);
        false
    }

    /// Set `listening`; returns true if a recorder was started
    pub fn force_on(&self) -> bool {
        let mut state = self.lock();
        state.listening = true;
        self.arm(&mut state)
    }

    /// Clear `listening`; returns true if a live recorder was stopped
    pub fn force_off(&self) -> bool {
        let taken = {
            let mut state = self.lock();
            state.listening = false;
            state.capture.take_live()
        };
        self.discard(taken)
    }

    /// Set the interaction mode. Returns the previous mode.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.lock().mode, mode)
    }

    /// Release a consumed recording, then arm a recorder if listening and
    /// the slot is empty. Returns true if a recorder was started.
    pub fn rearm(&self) -> bool {
        let mut state = self.lock();
        if matches!(state.capture, Slot::Consuming) {
            state.capture = Slot::Empty;
        }
        state.listening && self.arm(&mut state)
    }

    /// Non-blocking completion check for the session loop
    pub fn poll_capture(&self) -> CapturePoll {
        let mut state = self.lock();
        if !state.listening {
            return CapturePoll::Idle;
        }
        let finished = match &mut state.capture {
            Slot::Live(handle) => handle.poll_finished(),
            // A cycle that never reached rearm; let the loop release it
            Slot::Empty | Slot::Consuming => return CapturePoll::Unarmed,
        };
        if !finished {
            return CapturePoll::Recording;
        }
        state.capture = Slot::Consuming;

        // Claimed under the lock so a recorder armed by a signal handler
        // cannot overwrite or delete the finished file
        CapturePoll::Finished(self.recorder.claim_artifact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CommandLauncher;

    fn session(dir: &tempfile::TempDir) -> Session {
        Session::new(Recorder::new(
            Box::new(CommandLauncher::new("sleep", ["30"])),
            dir.path().join("rec.wav"),
        ))
    }

    #[test]
    fn test_new_session_is_idle_normal() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let snap = session.snapshot();
        assert!(!snap.listening);
        assert!(!snap.capturing);
        assert_eq!(snap.mode, Mode::Normal);
        assert!(matches!(session.poll_capture(), CapturePoll::Idle));
    }

    #[test]
    fn test_set_mode_is_exclusive_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);

        assert_eq!(session.set_mode(Mode::Lang), Mode::Normal);
        assert_eq!(session.set_mode(Mode::Memory), Mode::Lang);
        assert_eq!(session.mode(), Mode::Memory);

        assert_eq!(session.set_mode(Mode::Memory), Mode::Memory);
        assert_eq!(session.mode(), Mode::Memory);
    }

    #[test]
    fn test_set_mode_does_not_touch_listening() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        session.set_mode(Mode::Lang);
        assert!(!session.is_listening());
        assert!(!session.snapshot().capturing);
    }

    #[test]
    fn test_toggle_on_arms_and_off_stops() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);

        assert!(session.toggle());
        assert!(session.snapshot().capturing);
        assert!(matches!(session.poll_capture(), CapturePoll::Recording));

        assert!(!session.toggle());
        let snap = session.snapshot();
        assert!(!snap.listening);
        assert!(!snap.capturing);
    }

    #[test]
    fn test_rearm_requires_listening() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        assert!(!session.rearm());
        assert!(!session.snapshot().capturing);

        session.force_on();
        assert!(!session.rearm(), "already armed");
        session.force_off();
    }

    #[test]
    fn test_finished_capture_is_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(Recorder::new(
            Box::new(CommandLauncher::new("sh", ["-c", "head -c 4096 /dev/zero > {output}"])),
            dir.path().join("rec.wav"),
        ));
        session.force_on();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let claimed = loop {
            match session.poll_capture() {
                CapturePoll::Finished(claimed) => break claimed,
                CapturePoll::Recording => {}
                other => panic!("unexpected poll result: {:?}", other),
            }
            assert!(std::time::Instant::now() < deadline, "recorder never finished");
            std::thread::sleep(std::time::Duration::from_millis(10));
        };

        let claimed = claimed.unwrap();
        assert!(claimed.exists());
        let snap = session.snapshot();
        assert!(!snap.capturing);
        assert!(snap.processing);
    }

    fn finish_one(session: &Session) -> Option<PathBuf> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if let CapturePoll::Finished(claimed) = session.poll_capture() {
                return claimed;
            }
            assert!(std::time::Instant::now() < deadline, "recorder never finished");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    #[test]
    fn test_no_recorder_while_cycle_consumes() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(Recorder::new(
            Box::new(CommandLauncher::new("sh", ["-c", "head -c 4096 /dev/zero > {output}"])),
            dir.path().join("rec.wav"),
        ));
        session.force_on();
        assert!(finish_one(&session).is_some());

        // Signals arriving while the reply is produced
        assert!(!session.force_on());
        assert!(!session.toggle());
        assert!(session.toggle());
        assert!(session.capture_pid().is_none());
        assert!(!session.snapshot().capturing);

        // The loop hands the slot back and records the next utterance
        assert!(session.rearm());
        assert!(session.snapshot().capturing);
        session.force_off();
    }

    #[test]
    fn test_rearm_releases_cycle_when_not_listening() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(Recorder::new(
            Box::new(CommandLauncher::new("sh", ["-c", "head -c 4096 /dev/zero > {output}"])),
            dir.path().join("rec.wav"),
        ));
        session.force_on();
        finish_one(&session);
        session.force_off();
        assert!(session.snapshot().processing);

        assert!(!session.rearm());
        let snap = session.snapshot();
        assert!(!snap.processing);
        assert!(!snap.capturing);

        session.force_on();
        assert!(session.snapshot().capturing);
        session.force_off();
    }

    #[test]
    fn test_snapshot_display() {
        let snap = Snapshot {
            listening: true,
            mode: Mode::Lang,
            capturing: true,
            processing: false,
        };
        assert_eq!(snap.to_string(), "Listening (lang, recording)");

        let snap = Snapshot {
            listening: false,
            mode: Mode::Normal,
            capturing: false,
            processing: false,
        };
        assert_eq!(snap.to_string(), "Idle (normal)");

        let snap = Snapshot {
            listening: true,
            mode: Mode::Normal,
            capturing: false,
            processing: true,
        };
        assert_eq!(snap.to_string(), "Listening (normal, processing)");
    }
}
