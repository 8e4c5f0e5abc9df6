//! Voxtalk: hands-free voice conversation with local models
//!
//! This library provides the core functionality for:
//! - Recording utterances with a sox process that stops on silence
//! - Transcribing speech using whisper.cpp (fast, local, offline)
//! - Generating replies with a llama.cpp server
//! - Speaking replies through Open JTalk or an MMS command
//! - Switching interaction modes at runtime via Unix signals
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐   signals    ┌──────────────┐   lock    ┌──────────────┐
//!   │    Keypad    │ ───────────▶ │    Signal    │ ────────▶ │   Session    │
//!   │   (evdev)    │  USR1/USR2/  │   Gateway    │           │    State     │
//!   └──────────────┘  HUP/RTMIN+n └──────────────┘           └──────────────┘
//!                                        │ topic prompt              ▲
//!                                        ▼                           │ poll
//!                                 ┌──────────────┐           ┌──────────────┐
//!                                 │    Speech    │           │   Session    │
//!                                 │   (TTS)      │           │     Loop     │
//!                                 └──────────────┘           └──────────────┘
//!                                        ▲                           │ finished
//!                                        │                           ▼ recording
//!   ┌──────────────┐  reply     ┌──────────────┐  text      ┌──────────────┐
//!   │   llama.cpp  │ ─────────▶ │   Pipeline   │ ◀───────── │   Whisper    │
//!   │    server    │ ◀───────── │   Executor   │ ─────────▶ │ (whisper-rs) │
//!   └──────────────┘  prompt    └──────────────┘  wav path  └──────────────┘
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod gateway;
pub mod generate;
#[cfg(target_os = "linux")]
pub mod keypad;
pub mod pipeline;
pub mod speech;
pub mod state;
pub mod text;
pub mod transcribe;

pub use cli::{Cli, Commands, SendAction};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, VoxtalkError};
