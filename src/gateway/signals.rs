//! Control signal numbering
//!
//! The keypad dispatcher and `voxtalk send` talk to the daemon with plain
//! Unix signals. Realtime signals carry the mode and topic actions because
//! the two user-defined signals are already taken.

use crate::config::Config;
use crate::error::KeypadError;
use crate::state::Mode;
use std::fmt;
use std::path::Path;

/// One asynchronous request to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Toggle,
    ForceOn,
    ForceOff,
    /// Switch to grammar-correction mode
    Lang,
    /// Switch to memory mode
    Memory,
    TriggerTopic,
}

impl ControlSignal {
    /// Every signal the daemon listens for
    pub const ALL: [ControlSignal; 6] = [
        ControlSignal::Toggle,
        ControlSignal::ForceOn,
        ControlSignal::ForceOff,
        ControlSignal::Lang,
        ControlSignal::Memory,
        ControlSignal::TriggerTopic,
    ];

    /// Unix signal number carrying this request
    pub fn signal_number(self) -> libc::c_int {
        match self {
            ControlSignal::Toggle => libc::SIGUSR1,
            ControlSignal::ForceOn => libc::SIGUSR2,
            ControlSignal::ForceOff => libc::SIGHUP,
            ControlSignal::Lang => libc::SIGRTMIN() + 1,
            ControlSignal::Memory => libc::SIGRTMIN() + 2,
            ControlSignal::TriggerTopic => libc::SIGRTMIN() + 3,
        }
    }

    /// Parse an action name as used by `voxtalk send` and the keypad map
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "toggle" => Some(ControlSignal::Toggle),
            "on" => Some(ControlSignal::ForceOn),
            "off" => Some(ControlSignal::ForceOff),
            "lang" => Some(ControlSignal::Lang),
            "memory" => Some(ControlSignal::Memory),
            "topic" => Some(ControlSignal::TriggerTopic),
            _ => None,
        }
    }

    /// Mode selected by this signal, if it is a mode switch
    pub fn mode(self) -> Option<Mode> {
        match self {
            ControlSignal::Lang => Some(Mode::Lang),
            ControlSignal::Memory => Some(Mode::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlSignal::Toggle => write!(f, "toggle"),
            ControlSignal::ForceOn => write!(f, "on"),
            ControlSignal::ForceOff => write!(f, "off"),
            ControlSignal::Lang => write!(f, "lang"),
            ControlSignal::Memory => write!(f, "memory"),
            ControlSignal::TriggerTopic => write!(f, "topic"),
        }
    }
}

/// Read the daemon PID from `path`
pub fn read_pid_file(path: &Path) -> Result<i32, KeypadError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_| KeypadError::DaemonNotRunning(path.display().to_string()))?;
    contents
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            KeypadError::SignalFailed(format!("invalid PID file {}: {:?}", path.display(), contents))
        })
}

/// Deliver `signal` to process `pid`
pub fn send_to_pid(pid: i32, signal: ControlSignal) -> Result<(), KeypadError> {
    // nix's Signal enum has no realtime signals, so go through libc directly
    let ret = unsafe { libc::kill(pid, signal.signal_number()) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(KeypadError::SignalFailed(format!(
            "{} to pid {}: {}",
            signal, pid, err
        )));
    }
    tracing::debug!("Sent {} (signal {}) to pid {}", signal, signal.signal_number(), pid);
    Ok(())
}

/// Deliver `signal` to the running daemon found through its PID file
pub fn send_to_daemon(signal: ControlSignal) -> Result<(), KeypadError> {
    let pid = read_pid_file(&Config::pid_file())?;
    send_to_pid(pid, signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn test_signal_numbers_are_distinct() {
        let mut numbers: Vec<_> = ControlSignal::ALL.iter().map(|s| s.signal_number()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), ControlSignal::ALL.len());
    }

    #[test]
    fn test_fixed_signal_mapping() {
        assert_eq!(ControlSignal::Toggle.signal_number(), libc::SIGUSR1);
        assert_eq!(ControlSignal::ForceOn.signal_number(), libc::SIGUSR2);
        assert_eq!(ControlSignal::ForceOff.signal_number(), libc::SIGHUP);
        assert_eq!(
            ControlSignal::TriggerTopic.signal_number(),
            libc::SIGRTMIN() + 3
        );
    }

    #[test]
    fn test_names_round_trip() {
        for signal in ControlSignal::ALL {
            assert_eq!(ControlSignal::from_name(&signal.to_string()), Some(signal));
        }
        assert_eq!(ControlSignal::from_name("shutdown"), None);
    }

    #[test]
    fn test_send_actions_match_control_signals() {
        use clap::CommandFactory;

        let cli = crate::cli::Cli::command();
        let send = cli.find_subcommand("send").unwrap();
        let actions: Vec<_> = send
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .filter(|name| name != "help")
            .collect();
        assert_eq!(actions.len(), ControlSignal::ALL.len());
        for name in &actions {
            assert!(ControlSignal::from_name(name).is_some(), "{}", name);
        }
    }

    #[test]
    fn test_only_mode_switches_carry_a_mode() {
        assert_eq!(ControlSignal::Lang.mode(), Some(Mode::Lang));
        assert_eq!(ControlSignal::Memory.mode(), Some(Mode::Memory));
        assert_eq!(ControlSignal::Toggle.mode(), None);
        assert_eq!(ControlSignal::TriggerTopic.mode(), None);
    }

    #[test]
    fn test_read_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");

        assert!(matches!(
            read_pid_file(&path),
            Err(KeypadError::DaemonNotRunning(_))
        ));

        std::fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid_file(&path).unwrap(), 4242);

        std::fs::write(&path, "garbage").unwrap();
        assert!(matches!(read_pid_file(&path), Err(KeypadError::SignalFailed(_))));
    }

    #[test]
    fn test_send_to_pid_delivers_signal() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        send_to_pid(child.id() as i32, ControlSignal::ForceOff).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGHUP));
    }
}
