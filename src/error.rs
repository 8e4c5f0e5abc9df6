//! Error types for voxtalk
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the voxtalk application
#[derive(Error, Debug)]
pub enum VoxtalkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keypad error: {0}")]
    Keypad(#[from] KeypadError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),

    #[error("Speech synthesis error: {0}")]
    Synth(#[from] SynthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Errors related to keypad input
#[derive(Error, Debug)]
pub enum KeypadError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest to find valid key names.")]
    UnknownKey(String),

    #[error("Key {0} is bound to more than one action")]
    DuplicateKey(String),

    #[error("No keypad device found in /dev/input/ with the bound keys")]
    NoDevice,

    #[error("Daemon not running (no PID file at {0}). Start it with: voxtalk daemon")]
    DaemonNotRunning(String),

    #[error("Failed to signal daemon: {0}")]
    SignalFailed(String),

    #[error("evdev error: {0}")]
    Evdev(#[from] std::io::Error),
}

/// Errors related to the capture subprocess
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to launch capture command '{program}': {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Audio file error: {0}")]
    File(String),

    #[error("Audio playback error: {0}")]
    Playback(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper initialization failed: {0}")]
    InitFailed(String),

    #[error("Transcription failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),
}

/// Errors related to text generation
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("LLM server failed to start: {0}")]
    ServerStart(String),

    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Malformed completion response: {0}")]
    Response(String),
}

/// Errors related to speech synthesis
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("{0} not found in PATH. Install it via your package manager.")]
    BinaryNotFound(String),

    #[error("Synthesis command failed: {0}")]
    CommandFailed(String),

    #[error(transparent)]
    Playback(#[from] AudioError),
}

/// Result type alias using VoxtalkError
pub type Result<T> = std::result::Result<T, VoxtalkError>;

