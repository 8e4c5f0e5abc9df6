//! evdev-based keypad listener
//!
//! Uses the Linux evdev interface to detect key presses at the kernel level,
//! so it works without a display server.

use crate::config::KeypadConfig;
use crate::error::KeypadError;
use crate::gateway::signals::{send_to_daemon, ControlSignal};
use evdev::{Device, InputEventKind, Key};
use std::collections::HashMap;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

/// Maps keypad keys to control signals
pub struct KeypadDispatcher {
    bindings: HashMap<Key, ControlSignal>,
}

impl KeypadDispatcher {
    /// Build the key map from configuration
    pub fn new(config: &KeypadConfig) -> Result<Self, KeypadError> {
        let mut names: Vec<(&str, ControlSignal)> = vec![
            (config.toggle.as_str(), ControlSignal::Toggle),
            (config.lang.as_str(), ControlSignal::Lang),
            (config.memory.as_str(), ControlSignal::Memory),
            (config.topic.as_str(), ControlSignal::TriggerTopic),
        ];
        if let Some(ref key) = config.on {
            names.push((key.as_str(), ControlSignal::ForceOn));
        }
        if let Some(ref key) = config.off {
            names.push((key.as_str(), ControlSignal::ForceOff));
        }

        let mut bindings = HashMap::new();
        for (name, signal) in names {
            let key = parse_key_name(name)?;
            if bindings.insert(key, signal).is_some() {
                return Err(KeypadError::DuplicateKey(name.to_string()));
            }
        }

        Ok(Self { bindings })
    }

    /// Signal for one key event. Only key-down fires; repeats and releases don't.
    pub fn on_key(&self, key: Key, value: i32) -> Option<ControlSignal> {
        if value != 1 {
            return None;
        }
        self.bindings.get(&key).copied()
    }

    fn keys(&self) -> impl Iterator<Item = &Key> {
        self.bindings.keys()
    }
}

/// Run the dispatcher until the process is killed
pub fn run(config: &KeypadConfig) -> Result<(), KeypadError> {
    let dispatcher = KeypadDispatcher::new(config)?;

    let device_paths = match config.device {
        Some(ref path) => vec![path.clone()],
        None => find_keypad_devices(&dispatcher)?,
    };
    if device_paths.is_empty() {
        return Err(KeypadError::NoDevice);
    }

    let mut devices = open_devices(&device_paths)?;
    for (key, signal) in &dispatcher.bindings {
        tracing::info!("{:?} -> {}", key, signal);
    }

    loop {
        // Poll each device (all set to non-blocking mode)
        for device in &mut devices {
            let events = match device.fetch_events() {
                Ok(events) => events,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(KeypadError::Evdev(e)),
            };
            for event in events {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };
                let Some(signal) = dispatcher.on_key(key, event.value()) else {
                    continue;
                };

                tracing::debug!("{:?} pressed, sending {}", key, signal);
                match send_to_daemon(signal) {
                    Ok(()) => {}
                    // The daemon may be restarting; keep listening
                    Err(e @ KeypadError::DaemonNotRunning(_)) => tracing::warn!("{}", e),
                    Err(e) => tracing::error!("{}", e),
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Open devices in non-blocking mode so fetch_events doesn't block
fn open_devices(paths: &[PathBuf]) -> Result<Vec<Device>, KeypadError> {
    let mut devices = Vec::new();
    for path in paths {
        let device = Device::open(path)
            .map_err(|e| KeypadError::DeviceAccess(format!("{}: {}", path.display(), e)))?;

        let fd = device.as_raw_fd();
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags != -1 {
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }
        tracing::info!(
            "Listening on {:?} ({})",
            path,
            device.name().unwrap_or("unknown")
        );
        devices.push(device);
    }
    Ok(devices)
}

/// Find input devices that carry every bound key
fn find_keypad_devices(dispatcher: &KeypadDispatcher) -> Result<Vec<PathBuf>, KeypadError> {
    let mut found = Vec::new();

    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| KeypadError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| KeypadError::DeviceAccess(e.to_string()))?;
        let path = entry.path();

        // Only look at event* devices
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                let has_keys = device
                    .supported_keys()
                    .map(|keys| dispatcher.keys().all(|key| keys.contains(*key)))
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keypad: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    found.push(path);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(KeypadError::DeviceAccess(path.display().to_string()));
                }
                tracing::trace!("Skipping {:?}: {}", path, e);
            }
        }
    }

    Ok(found)
}

/// Parse a key name string to evdev Key
fn parse_key_name(name: &str) -> Result<Key, KeypadError> {
    // Normalize: uppercase and replace - or space with _
    let normalized: String = name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    // Add KEY_ prefix if not present
    let key_name = if normalized.starts_with("KEY_") {
        normalized
    } else {
        format!("KEY_{}", normalized)
    };

    let key = match key_name.as_str() {
        // Numeric keypad
        "KEY_KP0" => Key::KEY_KP0,
        "KEY_KP1" => Key::KEY_KP1,
        "KEY_KP2" => Key::KEY_KP2,
        "KEY_KP3" => Key::KEY_KP3,
        "KEY_KP4" => Key::KEY_KP4,
        "KEY_KP5" => Key::KEY_KP5,
        "KEY_KP6" => Key::KEY_KP6,
        "KEY_KP7" => Key::KEY_KP7,
        "KEY_KP8" => Key::KEY_KP8,
        "KEY_KP9" => Key::KEY_KP9,
        "KEY_KPENTER" => Key::KEY_KPENTER,
        "KEY_KPPLUS" => Key::KEY_KPPLUS,
        "KEY_KPMINUS" => Key::KEY_KPMINUS,
        "KEY_KPASTERISK" => Key::KEY_KPASTERISK,
        "KEY_KPSLASH" => Key::KEY_KPSLASH,
        "KEY_KPDOT" => Key::KEY_KPDOT,
        "KEY_NUMLOCK" => Key::KEY_NUMLOCK,
        "KEY_BACKSPACE" => Key::KEY_BACKSPACE,

        // Lock keys
        "KEY_SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "KEY_PAUSE" => Key::KEY_PAUSE,

        // Function keys (F13-F24 are often unused)
        "KEY_F13" => Key::KEY_F13,
        "KEY_F14" => Key::KEY_F14,
        "KEY_F15" => Key::KEY_F15,
        "KEY_F16" => Key::KEY_F16,
        "KEY_F17" => Key::KEY_F17,
        "KEY_F18" => Key::KEY_F18,
        "KEY_F19" => Key::KEY_F19,
        "KEY_F20" => Key::KEY_F20,
        "KEY_F21" => Key::KEY_F21,
        "KEY_F22" => Key::KEY_F22,
        "KEY_F23" => Key::KEY_F23,
        "KEY_F24" => Key::KEY_F24,

        // Media keys
        "KEY_PLAYPAUSE" => Key::KEY_PLAYPAUSE,
        "KEY_MUTE" => Key::KEY_MUTE,

        _ => {
            return Err(KeypadError::UnknownKey(format!(
                "{}. Try: KPENTER, KP0-KP9, KPPLUS, F13-F24",
                name
            )));
        }
    };

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_name() {
        assert_eq!(parse_key_name("KPENTER").unwrap(), Key::KEY_KPENTER);
        assert_eq!(parse_key_name("kp1").unwrap(), Key::KEY_KP1);
        assert_eq!(parse_key_name("KEY_KP3").unwrap(), Key::KEY_KP3);
        assert_eq!(parse_key_name("f13").unwrap(), Key::KEY_F13);
    }

    #[test]
    fn test_parse_key_name_error() {
        assert!(matches!(
            parse_key_name("HYPER"),
            Err(KeypadError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_default_bindings() {
        let dispatcher = KeypadDispatcher::new(&KeypadConfig::default()).unwrap();
        assert_eq!(dispatcher.on_key(Key::KEY_KPENTER, 1), Some(ControlSignal::Toggle));
        assert_eq!(dispatcher.on_key(Key::KEY_KP1, 1), Some(ControlSignal::Lang));
        assert_eq!(dispatcher.on_key(Key::KEY_KP2, 1), Some(ControlSignal::Memory));
        assert_eq!(
            dispatcher.on_key(Key::KEY_KP3, 1),
            Some(ControlSignal::TriggerTopic)
        );
        assert_eq!(dispatcher.on_key(Key::KEY_KP9, 1), None);
    }

    #[test]
    fn test_only_key_down_fires() {
        let dispatcher = KeypadDispatcher::new(&KeypadConfig::default()).unwrap();
        // 0 = release, 2 = autorepeat
        assert_eq!(dispatcher.on_key(Key::KEY_KPENTER, 0), None);
        assert_eq!(dispatcher.on_key(Key::KEY_KPENTER, 2), None);
    }

    #[test]
    fn test_optional_on_off_keys() {
        let config = KeypadConfig {
            on: Some("KPPLUS".to_string()),
            off: Some("KPMINUS".to_string()),
            ..KeypadConfig::default()
        };
        let dispatcher = KeypadDispatcher::new(&config).unwrap();
        assert_eq!(dispatcher.on_key(Key::KEY_KPPLUS, 1), Some(ControlSignal::ForceOn));
        assert_eq!(dispatcher.on_key(Key::KEY_KPMINUS, 1), Some(ControlSignal::ForceOff));
    }

    #[test]
    fn test_duplicate_binding_is_rejected() {
        let config = KeypadConfig {
            lang: "KPENTER".to_string(),
            ..KeypadConfig::default()
        };
        assert!(matches!(
            KeypadDispatcher::new(&config),
            Err(KeypadError::DuplicateKey(_))
        ));
    }
}
