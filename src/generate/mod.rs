//! Text generation module
//!
//! Completions come from a llama.cpp server, either one spawned and owned by
//! the daemon or an already running one at `llm.endpoint`.

pub mod llama;

use crate::config::LlmConfig;
use crate::error::GenerateError;

/// Sampling settings for one completion request
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub max_tokens: u32,
    /// Generation ends at the first of these markers
    pub stop: Vec<String>,
}

impl SamplingParams {
    /// Settings for conversational replies
    pub fn reply(max_tokens: u32, stop: &[&str]) -> Self {
        Self {
            temperature: 0.1,
            top_k: 25,
            top_p: 1.0,
            repeat_penalty: 1.1,
            max_tokens,
            stop: stop.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Deterministic settings for grammar correction
    pub fn correction(stop: &[&str]) -> Self {
        Self {
            temperature: 0.0,
            top_k: 1,
            top_p: 1.0,
            repeat_penalty: 1.0,
            max_tokens: 200,
            stop: stop.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Trait for text generation engines
pub trait Generator: Send + Sync {
    /// Complete a fully formatted prompt (untrimmed output)
    fn complete(&self, prompt: &str, params: &SamplingParams) -> Result<String, GenerateError>;
}

/// Connect to (or start) the generation engine
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn Generator>, GenerateError> {
    let generator = match config.endpoint {
        Some(ref endpoint) => {
            tracing::info!("Using llama.cpp server at {}", endpoint);
            llama::LlamaGenerator::connect(endpoint)
        }
        None => llama::LlamaGenerator::spawn(config)?,
    };
    Ok(Box::new(generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_params() {
        let params = SamplingParams::reply(400, &["<end_of_turn>"]);
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.top_k, 25);
        assert_eq!(params.repeat_penalty, 1.1);
        assert_eq!(params.max_tokens, 400);
        assert_eq!(params.stop, vec!["<end_of_turn>".to_string()]);
    }

    #[test]
    fn test_correction_params_are_greedy() {
        let params = SamplingParams::correction(&[]);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.top_k, 1);
        assert_eq!(params.repeat_penalty, 1.0);
        assert_eq!(params.max_tokens, 200);
        assert!(params.stop.is_empty());
    }
}
