//! Daemon module - main event loop orchestration
//!
//! Loads the engines, installs the signal bridge, and runs the session loop
//! until a fatal engine error or a shutdown signal.

use crate::audio::Recorder;
use crate::config::Config;
use crate::error::{Result, VoxtalkError};
use crate::gateway::{bridge, SignalGateway};
use crate::generate;
use crate::pipeline::{Pipeline, PromptBuilder};
use crate::speech;
use crate::state::{CapturePoll, Session};
use crate::transcribe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Poll interval while not listening
pub const IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Poll interval while a recorder may be running
pub const ACTIVE_INTERVAL: Duration = Duration::from_millis(100);

/// Write PID file for external control via signals
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::pid_file();

    // Ensure parent directory exists
    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

/// Remove PID file on shutdown
fn cleanup_pid_file(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove PID file: {}", e);
        }
    }
}

/// Polls the session and feeds finished recordings to the pipeline.
///
/// Cycles run one at a time: the loop awaits each pipeline run before it
/// polls again.
pub struct SessionLoop {
    session: Arc<Session>,
    pipeline: Arc<Pipeline>,
}

impl SessionLoop {
    pub fn new(session: Arc<Session>, pipeline: Arc<Pipeline>) -> Self {
        Self { session, pipeline }
    }

    /// One loop iteration. Returns how long to sleep before the next one.
    pub async fn tick(&self) -> Result<Duration> {
        match self.session.poll_capture() {
            CapturePoll::Idle => Ok(IDLE_INTERVAL),
            CapturePoll::Recording => Ok(ACTIVE_INTERVAL),
            CapturePoll::Unarmed => {
                if self.session.rearm() {
                    tracing::debug!("Listening without a recorder, re-armed");
                }
                Ok(ACTIVE_INTERVAL)
            }
            CapturePoll::Finished(artifact) => {
                if let Some(path) = artifact {
                    self.process(path).await?;
                }
                if self.session.rearm() {
                    tracing::debug!("Recorder re-armed");
                }
                Ok(ACTIVE_INTERVAL)
            }
        }
    }

    /// Run one pipeline cycle on a blocking thread
    async fn process(&self, path: PathBuf) -> Result<()> {
        // Fixed for the whole cycle, whatever signals arrive meanwhile
        let mode = self.session.mode();
        tracing::debug!("Processing {:?} in {} mode", path, mode);

        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || pipeline.process_utterance(&path, mode))
            .await
            .map_err(|e| VoxtalkError::Task(e.to_string()))??;
        Ok(())
    }

    /// Loop until a pipeline error
    pub async fn run(&self) -> Result<()> {
        loop {
            let interval = self.tick().await?;
            tokio::time::sleep(interval).await;
        }
    }
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    pid_file_path: Option<PathBuf>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pid_file_path: None,
        }
    }

    /// Run the daemon until shutdown or a fatal engine error
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voxtalk daemon (language: {})", self.config.language);
        self.config.validate()?;

        if let Some(parent) = self.config.audio.tmp_wav.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VoxtalkError::Config(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        // Write PID file for `voxtalk send` and the keypad dispatcher
        self.pid_file_path = write_pid_file();

        let result = self.serve().await;

        // Remove PID file on shutdown
        if let Some(ref path) = self.pid_file_path {
            cleanup_pid_file(path);
        }

        match result {
            Ok(()) => tracing::info!("Daemon stopped"),
            Err(ref e) => tracing::error!("Daemon stopped: {}", e),
        }
        result
    }

    async fn serve(&self) -> Result<()> {
        let synth = speech::create_synthesizer(&self.config)?;

        // Model loading blocks for seconds; keep it off the async workers
        let whisper = self.config.whisper.clone();
        let language = self.config.language.clone();
        let transcriber = tokio::task::spawn_blocking(move || {
            transcribe::create_transcriber(&whisper, &language)
        })
        .await
        .map_err(|e| VoxtalkError::Task(e.to_string()))??;

        let llm = self.config.llm.clone();
        let generator = tokio::task::spawn_blocking(move || generate::create_generator(&llm))
            .await
            .map_err(|e| VoxtalkError::Task(e.to_string()))??;

        let pipeline = Arc::new(Pipeline::new(
            transcriber,
            generator,
            synth.clone(),
            PromptBuilder::new(&self.config),
            self.config.llm.max_tokens,
        ));

        let session = Arc::new(Session::new(Recorder::from_config(&self.config.audio)));
        let topics = self.config.topics_for_language().to_vec();
        tracing::info!("{} topic prompt(s) for {}", topics.len(), self.config.language);

        let gateway = Arc::new(SignalGateway::new(session.clone(), synth, topics));
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let bridge = bridge::spawn(gateway, fatal_tx)?;

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            VoxtalkError::Config(format!("Failed to set up SIGTERM handler: {}", e))
        })?;

        tracing::info!("Ready. Use the keypad or `voxtalk send toggle` to start listening");
        let session_loop = SessionLoop::new(session.clone(), pipeline);

        let result = tokio::select! {
            result = session_loop.run() => result,

            Some(e) = fatal_rx.recv() => Err(e),

            // Handle graceful shutdown (SIGINT from Ctrl+C)
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down...");
                Ok(())
            }

            // Handle graceful shutdown (SIGTERM from systemctl stop)
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down...");
                Ok(())
            }
        };

        bridge.abort();

        // Stop any live recorder before the engines go away
        tokio::task::spawn_blocking(move || session.force_off())
            .await
            .map_err(|e| VoxtalkError::Task(e.to_string()))?;

        result
    }
}
