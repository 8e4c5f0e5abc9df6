//! Configuration loading and types for voxtalk
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voxtalk/config.toml)
//! 3. Environment variables (VOXTALK_*)
//! 4. CLI arguments (highest priority)
//!
//! The result is a static settings object: the daemon reads it once at
//! startup and never reloads it.

use crate::error::VoxtalkError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voxtalk Configuration
#
# Location: ~/.config/voxtalk/config.toml

# Session language. Used for transcription, the reply style hint,
# grammar correction instructions and topic prompt selection.
language = "en"

# Free-form instruction placed at the top of every prompt
system_prompt = "You are a friendly conversation partner. Reply in plain spoken language."

[whisper]
# Path to a whisper.cpp ggml model
model = "~/.local/share/voxtalk/models/ggml-base.bin"

# Number of CPU threads for inference (omit for auto-detection)
# threads = 4

[llm]
# Path to a GGUF model served by llama-server (spawned by voxtalk)
model = "~/.local/share/voxtalk/models/gemma-2-2b-it-Q4_K_M.gguf"

# Use an already running llama.cpp server instead of spawning one
# endpoint = "http://127.0.0.1:8080"

# server_binary = "llama-server"
# port = 8089
# context_size = 8192
# prompt_format = "gemma"     # or "chatml"

# Maximum tokens generated per reply
max_tokens = 400

[reply]
# Ask the model to answer in at most this many sentences
max_sentences = 2

# Include the "answer concisely" hint in every prompt
style_hint = true

[audio]
# ALSA capture device passed to sox
device = "default"
sample_rate = 16000

# Seconds of silence that end a recording
silence_stop_secs = 1.0

# Amplitude below which audio counts as silence
silence_threshold = "1%"

# Where each finished utterance is written
tmp_wav = "/tmp/voxtalk_rec.wav"

[tts]
# "disabled", "openjtalk" or "mms"
backend = "disabled"

# Open JTalk assets (backend = "openjtalk")
# openjtalk_dic = "/var/lib/mecab/dic/open-jtalk/naist-jdic"
# openjtalk_voice = "/usr/share/hts-voice/nitech-jp-atr503-m001/nitech_jp_atr503_m001.htsvoice"

# MMS/VITS synthesis command (backend = "mms"). Reads text on stdin,
# writes a WAV file to the path substituted for {output}.
# mms_command = "mms-tts --model ~/models/mms-tts-bul --out {output}"

# volume = 1.0

[text]
# Speak digits as words before synthesis
# number_pronunciation = false

# Override the built-in digit words for the session language
# [text.digits]
# "0" = "nula"

# Proactive topic prompts, keyed by language ("ja", "en", "bg", "ja-JP", ...)
# [topics]
# en = ["What did you eat today?", "Tell me about your weekend."]

[keypad]
# Input device for `voxtalk keypad` (omit to listen on all keyboards)
# device = "/dev/input/by-id/usb-ELECOM_TK-TDM017BK-event-kbd"
toggle = "KPENTER"
lang = "KP1"
memory = "KP2"
topic = "KP3"
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Session language code (e.g. "en", "ja", "bg", "ja-JP")
    #[serde(default = "default_language")]
    pub language: String,

    /// Instruction placed at the top of every prompt
    #[serde(default)]
    pub system_prompt: String,

    pub whisper: WhisperConfig,
    pub llm: LlmConfig,

    #[serde(default)]
    pub reply: ReplyConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub text: TextConfig,

    /// Topic prompts keyed by language or locale
    #[serde(default)]
    pub topics: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub keypad: KeypadConfig,
}

/// Whisper speech-to-text configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model: PathBuf,

    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

/// Prompt template understood by the generation model
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    #[default]
    Gemma,
    ChatMl,
}

/// Text generation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Path to the GGUF model loaded by the spawned server
    pub model: PathBuf,

    /// Existing llama.cpp server; when set no server is spawned
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_server_binary")]
    pub server_binary: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_context_size")]
    pub context_size: u32,

    pub threads: Option<usize>,

    #[serde(default)]
    pub prompt_format: PromptFormat,

    /// Token budget for a reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// How long to wait for the spawned server to load the model
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

/// Reply shaping
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyConfig {
    #[serde(default = "default_max_sentences")]
    pub max_sentences: u32,

    #[serde(default = "default_true")]
    pub style_hint: bool,
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// ALSA device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Silence duration that ends a recording
    #[serde(default = "default_silence_stop")]
    pub silence_stop_secs: f32,

    /// sox silence threshold ("1%", "-40d", ...)
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: String,

    /// Temporary utterance artifact path
    #[serde(default = "default_tmp_wav")]
    pub tmp_wav: PathBuf,
}

/// Speech synthesis backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    #[default]
    Disabled,
    OpenJtalk,
    Mms,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: TtsBackend,

    #[serde(default)]
    pub openjtalk_dic: Option<PathBuf>,

    #[serde(default)]
    pub openjtalk_voice: Option<PathBuf>,

    #[serde(default = "default_speed")]
    pub openjtalk_speed: f32,

    /// Shell command with an `{output}` placeholder
    #[serde(default)]
    pub mms_command: Option<String>,

    #[serde(default = "default_volume")]
    pub volume: f32,
}

/// Pre-synthesis text configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TextConfig {
    /// Replace digits with spoken words before synthesis
    #[serde(default)]
    pub number_pronunciation: bool,

    /// Digit → word overrides for the session language
    #[serde(default)]
    pub digits: HashMap<String, String>,
}

/// Keypad dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeypadConfig {
    /// Device path; None scans /dev/input for keyboards
    #[serde(default)]
    pub device: Option<PathBuf>,

    #[serde(default = "default_toggle_key")]
    pub toggle: String,

    #[serde(default)]
    pub on: Option<String>,

    #[serde(default)]
    pub off: Option<String>,

    #[serde(default = "default_lang_key")]
    pub lang: String,

    #[serde(default = "default_memory_key")]
    pub memory: String,

    #[serde(default = "default_topic_key")]
    pub topic: String,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_server_binary() -> String {
    "llama-server".to_string()
}

fn default_port() -> u16 {
    8089
}

fn default_context_size() -> u32 {
    8192
}

fn default_max_tokens() -> u32 {
    400
}

fn default_startup_timeout() -> u64 {
    120
}

fn default_max_sentences() -> u32 {
    2
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_silence_stop() -> f32 {
    1.0
}

fn default_silence_threshold() -> String {
    "1%".to_string()
}

fn default_tmp_wav() -> PathBuf {
    PathBuf::from("/tmp/voxtalk_rec.wav")
}

fn default_speed() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    1.0
}

fn default_toggle_key() -> String {
    "KPENTER".to_string()
}

fn default_lang_key() -> String {
    "KP1".to_string()
}

fn default_memory_key() -> String {
    "KP2".to_string()
}

fn default_topic_key() -> String {
    "KP3".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_sentences: default_max_sentences(),
            style_hint: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            silence_stop_secs: default_silence_stop(),
            silence_threshold: default_silence_threshold(),
            tmp_wav: default_tmp_wav(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackend::Disabled,
            openjtalk_dic: None,
            openjtalk_voice: None,
            openjtalk_speed: default_speed(),
            mms_command: None,
            volume: default_volume(),
        }
    }
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            device: None,
            toggle: default_toggle_key(),
            on: None,
            off: None,
            lang: default_lang_key(),
            memory: default_memory_key(),
            topic: default_topic_key(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let models = Self::models_dir();
        Self {
            language: default_language(),
            system_prompt: String::new(),
            whisper: WhisperConfig {
                model: models.join("ggml-base.bin"),
                threads: None,
            },
            llm: LlmConfig {
                model: models.join("gemma-2-2b-it-Q4_K_M.gguf"),
                endpoint: None,
                server_binary: default_server_binary(),
                port: default_port(),
                context_size: default_context_size(),
                threads: None,
                prompt_format: PromptFormat::default(),
                max_tokens: default_max_tokens(),
                startup_timeout_secs: default_startup_timeout(),
            },
            reply: ReplyConfig::default(),
            audio: AudioConfig::default(),
            tts: TtsConfig::default(),
            text: TextConfig::default(),
            topics: HashMap::new(),
            keypad: KeypadConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voxtalk")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (PID file)
    pub fn runtime_dir() -> PathBuf {
        // Use XDG_RUNTIME_DIR if available, otherwise fall back to /tmp
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("voxtalk")
    }

    /// Path of the daemon PID file used by `voxtalk send`
    pub fn pid_file() -> PathBuf {
        Self::runtime_dir().join("pid")
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "voxtalk")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }

    /// Base language of the session locale ("ja-JP" → "ja")
    pub fn base_language(&self) -> &str {
        base_language(&self.language)
    }

    /// Topic prompts for the session language.
    ///
    /// The exact locale key wins; otherwise the base language list is used.
    pub fn topics_for_language(&self) -> &[String] {
        self.topics
            .get(&self.language)
            .or_else(|| self.topics.get(self.base_language()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check everything the daemon needs before entering the main loop
    pub fn validate(&self) -> Result<(), VoxtalkError> {
        if self.language.trim().is_empty() {
            return Err(VoxtalkError::Config("language must not be empty".into()));
        }
        if !self.whisper.model.exists() {
            return Err(VoxtalkError::Config(format!(
                "whisper model not found: {:?}",
                self.whisper.model
            )));
        }
        if self.llm.endpoint.is_none() && !self.llm.model.exists() {
            return Err(VoxtalkError::Config(format!(
                "llm model not found: {:?} (set llm.endpoint to use a running server)",
                self.llm.model
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(VoxtalkError::Config("llm.max_tokens must be positive".into()));
        }
        if self.reply.max_sentences == 0 {
            return Err(VoxtalkError::Config(
                "reply.max_sentences must be positive".into(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(VoxtalkError::Config("audio.sample_rate must be positive".into()));
        }
        if !(self.audio.silence_stop_secs > 0.0) {
            return Err(VoxtalkError::Config(
                "audio.silence_stop_secs must be positive".into(),
            ));
        }
        if which::which("sox").is_err() {
            return Err(VoxtalkError::Config(
                "sox not found in PATH (required for audio capture)".into(),
            ));
        }

        match self.tts.backend {
            TtsBackend::Disabled => {}
            TtsBackend::OpenJtalk => {
                for (key, path) in [
                    ("tts.openjtalk_dic", &self.tts.openjtalk_dic),
                    ("tts.openjtalk_voice", &self.tts.openjtalk_voice),
                ] {
                    match path {
                        Some(p) if p.exists() => {}
                        Some(p) => {
                            return Err(VoxtalkError::Config(format!("{} not found: {:?}", key, p)))
                        }
                        None => {
                            return Err(VoxtalkError::Config(format!(
                                "{} is required when tts.backend = \"openjtalk\"",
                                key
                            )))
                        }
                    }
                }
            }
            TtsBackend::Mms => match self.tts.mms_command {
                Some(ref cmd) if cmd.contains("{output}") => {}
                Some(_) => {
                    return Err(VoxtalkError::Config(
                        "tts.mms_command must contain an {output} placeholder".into(),
                    ))
                }
                None => {
                    return Err(VoxtalkError::Config(
                        "tts.mms_command is required when tts.backend = \"mms\"".into(),
                    ))
                }
            },
        }

        Ok(())
    }
}

/// Strip the region from a locale code ("ja-JP" / "ja_JP" → "ja")
pub fn base_language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoxtalkError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VoxtalkError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| VoxtalkError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(lang) = std::env::var("VOXTALK_LANG") {
        config.language = lang;
    }
    if let Ok(model) = std::env::var("VOXTALK_WHISPER_MODEL") {
        config.whisper.model = PathBuf::from(model);
    }
    if let Ok(model) = std::env::var("VOXTALK_LLM_MODEL") {
        config.llm.model = PathBuf::from(model);
    }
    if let Ok(backend) = std::env::var("VOXTALK_TTS") {
        config.tts.backend = parse_tts_backend(&backend)?;
    }

    config.whisper.model = expand_home(&config.whisper.model);
    config.llm.model = expand_home(&config.llm.model);
    config.tts.openjtalk_dic = config.tts.openjtalk_dic.as_deref().map(expand_home);
    config.tts.openjtalk_voice = config.tts.openjtalk_voice.as_deref().map(expand_home);

    Ok(config)
}

/// Parse a TTS backend name as accepted by the config file
pub fn parse_tts_backend(name: &str) -> Result<TtsBackend, VoxtalkError> {
    match name.to_lowercase().as_str() {
        "disabled" | "none" | "off" => Ok(TtsBackend::Disabled),
        "openjtalk" | "openjtalk-ja" => Ok(TtsBackend::OpenJtalk),
        "mms" | "mms-bg" => Ok(TtsBackend::Mms),
        other => Err(VoxtalkError::Config(format!(
            "Unknown TTS backend '{}'. Use disabled, openjtalk or mms",
            other
        ))),
    }
}
