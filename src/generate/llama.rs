//! llama.cpp server client
//!
//! Talks to the `/completion` endpoint of `llama-server`. When no endpoint is
//! configured the daemon starts its own server on localhost, waits for
//! `/health` to report the model as loaded, and kills it on drop.

use super::{Generator, SamplingParams};
use crate::config::LlmConfig;
use crate::error::GenerateError;
use serde::{Deserialize, Serialize};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Completion requests can take a while on CPU-only machines
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval between health probes while the server loads the model
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A llama-server process owned by the daemon
struct LlamaServer {
    child: Child,
}

impl LlamaServer {
    fn start(config: &LlmConfig) -> Result<Self, GenerateError> {
        if !config.model.exists() {
            return Err(GenerateError::ModelNotFound(
                config.model.display().to_string(),
            ));
        }

        let binary = which::which(&config.server_binary).map_err(|_| {
            GenerateError::ServerStart(format!("{} not found in PATH", config.server_binary))
        })?;

        let threads = config
            .threads
            .unwrap_or_else(|| num_cpus::get().min(4));

        tracing::info!(
            "Starting {} on port {} with model {:?}",
            config.server_binary,
            config.port,
            config.model
        );

        let child = Command::new(binary)
            .arg("-m")
            .arg(&config.model)
            .args(["-c", &config.context_size.to_string()])
            .args(["-t", &threads.to_string()])
            .args(["--host", "127.0.0.1"])
            .args(["--port", &config.port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| GenerateError::ServerStart(e.to_string()))?;

        Ok(Self { child })
    }

    /// Block until `/health` answers 200, the process dies, or the timeout passes
    fn wait_ready(&mut self, base_url: &str, timeout: Duration) -> Result<(), GenerateError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(2))
            .build();
        let health_url = format!("{}/health", base_url);
        let start = Instant::now();

        loop {
            if let Some(status) = self
                .child
                .try_wait()
                .map_err(|e| GenerateError::ServerStart(e.to_string()))?
            {
                return Err(GenerateError::ServerStart(format!(
                    "server exited during startup ({})",
                    status
                )));
            }

            match agent.get(&health_url).call() {
                Ok(_) => {
                    tracing::info!(
                        "LLM server ready in {:.1}s",
                        start.elapsed().as_secs_f32()
                    );
                    return Ok(());
                }
                // 503 while the model is still loading
                Err(ureq::Error::Status(code, _)) => {
                    tracing::trace!("LLM server health: {}", code);
                }
                Err(ureq::Error::Transport(_)) => {}
            }

            if start.elapsed() >= timeout {
                return Err(GenerateError::ServerStart(format!(
                    "model not loaded after {}s",
                    timeout.as_secs()
                )));
            }
            std::thread::sleep(HEALTH_POLL_INTERVAL);
        }
    }
}

impl Drop for LlamaServer {
    fn drop(&mut self) {
        tracing::debug!("Stopping LLM server (pid {})", self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    stop: &'a [String],
    cache_prompt: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Generator backed by a llama.cpp server
pub struct LlamaGenerator {
    base_url: String,
    agent: ureq::Agent,
    _server: Option<LlamaServer>,
}

impl LlamaGenerator {
    /// Use a server that is already running
    pub fn connect(endpoint: &str) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            _server: None,
        }
    }

    /// Start a private server for `config.model` and wait until it is ready
    pub fn spawn(config: &LlmConfig) -> Result<Self, GenerateError> {
        let mut server = LlamaServer::start(config)?;
        let base_url = format!("http://127.0.0.1:{}", config.port);
        server.wait_ready(
            &base_url,
            Duration::from_secs(config.startup_timeout_secs),
        )?;

        Ok(Self {
            base_url,
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            _server: Some(server),
        })
    }
}

impl Generator for LlamaGenerator {
    fn complete(&self, prompt: &str, params: &SamplingParams) -> Result<String, GenerateError> {
        let url = format!("{}/completion", self.base_url);
        let request = CompletionRequest {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
            repeat_penalty: params.repeat_penalty,
            stop: &params.stop,
            cache_prompt: true,
        };

        tracing::debug!(
            "Completion request: {} chars, n_predict={}",
            prompt.len(),
            params.max_tokens
        );
        let start = Instant::now();

        let response = self
            .agent
            .post(&url)
            .send_json(&request)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    GenerateError::Request(format!("HTTP {}: {}", code, body))
                }
                ureq::Error::Transport(t) => {
                    GenerateError::Request(format!("{}: {}", self.base_url, t))
                }
            })?;

        let completion: CompletionResponse = response
            .into_json()
            .map_err(|e| GenerateError::Response(e.to_string()))?;

        tracing::debug!(
            "Completion finished in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            completion.content.len()
        );

        Ok(completion.content)
    }
}
