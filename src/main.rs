//! Voxtalk - hands-free voice conversation with local models
//!
//! Run with `voxtalk` or `voxtalk daemon` to start the daemon.
//! Use `voxtalk keypad` to forward keypad presses to it.
//! Use `voxtalk send <action>` to control it from scripts.

use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use voxtalk::cli::{Cli, Commands, SendAction};
use voxtalk::config::{self, Config};
use voxtalk::gateway::signals::{send_to_daemon, ControlSignal};
use voxtalk::{transcribe, Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voxtalk={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(lang) = cli.lang {
        config.language = lang;
    }
    if let Some(ref tts) = cli.tts {
        config.tts.backend = config::parse_tts_backend(tts)?;
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Send { action } => {
            send_to_daemon(control_signal(action))?;
        }

        Commands::Keypad => {
            run_keypad(config).await?;
        }

        Commands::Transcribe { file } => {
            transcribe_file(&config, &file)?;
        }

        Commands::Config { init } => {
            if init {
                init_config(cli.config.as_deref())?;
            }
            show_config(&config)?;
        }
    }

    Ok(())
}

fn control_signal(action: SendAction) -> ControlSignal {
    match action {
        SendAction::Toggle => ControlSignal::Toggle,
        SendAction::On => ControlSignal::ForceOn,
        SendAction::Off => ControlSignal::ForceOff,
        SendAction::Lang => ControlSignal::Lang,
        SendAction::Memory => ControlSignal::Memory,
        SendAction::Topic => ControlSignal::TriggerTopic,
    }
}

#[cfg(target_os = "linux")]
async fn run_keypad(config: Config) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || voxtalk::keypad::run(&config.keypad)).await??;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run_keypad(_config: Config) -> anyhow::Result<()> {
    anyhow::bail!("Keypad input requires Linux evdev")
}

/// Transcribe an audio file
fn transcribe_file(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("Loading model: {:?}", config.whisper.model);
    let transcriber = transcribe::create_transcriber(&config.whisper, &config.language)?;

    println!("Transcribing {:?}...", path);
    let text = transcriber.transcribe_file(path)?;
    println!("\n{}", text.trim());

    Ok(())
}

/// Write the default configuration file
fn init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(Config::default_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;

    if path.exists() {
        println!("Config already exists at {:?}, leaving it untouched\n", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, config::DEFAULT_CONFIG)?;
    println!("Wrote default config to {:?}\n", path);
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Current Configuration\n");
    println!("=====================\n");
    println!("{}", toml::to_string_pretty(config)?);

    println!("[paths]");
    if let Some(path) = Config::default_path() {
        println!("  config = {:?}", path);
    }
    println!("  models = {:?}", Config::models_dir());
    println!("  pid_file = {:?}", Config::pid_file());

    Ok(())
}
