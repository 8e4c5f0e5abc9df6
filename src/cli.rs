// Command-line interface definitions for voxtalk
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voxtalk")]
#[command(author, version, about = "Hands-free voice conversation with local models")]
#[command(long_about = "
Voxtalk is a hands-free voice conversation partner for Linux.
It listens, transcribes with whisper, answers with a local llama.cpp model
and speaks the reply. A numeric keypad controls it from across the room.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install sox, llama.cpp (llama-server) and optionally open_jtalk
  4. Run: voxtalk config --init (then set the model paths)
  5. Run: voxtalk daemon, and voxtalk keypad in a second terminal

USAGE:
  KPENTER toggles listening. KP1 switches to grammar-correction mode,
  KP2 to memory mode, KP3 asks a conversation topic.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override session language (e.g., en, ja-JP, bg)
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// Override speech backend (disabled, openjtalk, mms)
    #[arg(long, value_name = "BACKEND")]
    pub tts: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the voice session daemon (default if no command specified)
    Daemon,

    /// Send a control signal to the running daemon
    Send {
        #[command(subcommand)]
        action: SendAction,
    },

    /// Forward keypad presses to the running daemon
    Keypad,

    /// Transcribe an audio file (WAV) with the configured whisper model
    Transcribe {
        /// Path to audio file
        file: std::path::PathBuf,
    },

    /// Show current configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum SendAction {
    /// Toggle listening (SIGUSR1)
    Toggle,
    /// Start listening (SIGUSR2)
    On,
    /// Stop listening and cancel the current recording (SIGHUP)
    Off,
    /// Switch to grammar-correction mode
    Lang,
    /// Switch to memory mode
    Memory,
    /// Speak a random conversation topic and listen for the answer
    Topic,
}
