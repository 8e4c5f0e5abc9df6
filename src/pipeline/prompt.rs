//! Prompt construction
//!
//! Prompts are single-turn: an optional system instruction, an optional
//! style hint in the session language, then the user's text, wrapped in the
//! turn markup the generation model was trained on.

use crate::config::{base_language, Config, PromptFormat};

impl PromptFormat {
    /// Wrap user content in one user turn and open the model turn
    pub fn wrap(&self, content: &str) -> String {
        match self {
            PromptFormat::Gemma => format!(
                "<start_of_turn>user\n{}\n<end_of_turn>\n<start_of_turn>model\n",
                content
            ),
            PromptFormat::ChatMl => format!(
                "<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
                content
            ),
        }
    }

    /// End-of-sequence and end-of-turn markers
    pub fn stop_markers(&self) -> &'static [&'static str] {
        match self {
            PromptFormat::Gemma => &["<eos>", "<end_of_turn>"],
            PromptFormat::ChatMl => &["<|im_end|>", "<|endoftext|>"],
        }
    }
}

/// "Answer in at most N sentences", phrased in the session language
pub fn style_hint(language: &str, max_sentences: u32) -> String {
    match base_language(language) {
        "ja" => format!("{}文以内で簡潔に答えてください。", max_sentences),
        "bg" => format!(
            "Отговори кратко, с най-много {} изречения.",
            max_sentences
        ),
        _ => format!(
            "Answer concisely in at most {} sentences.",
            max_sentences
        ),
    }
}

/// Instruction for the grammar-correction request
pub fn grammar_instruction(language: &str) -> &'static str {
    match base_language(language) {
        "ja" => "次の日本語の文の文法を直してください。直した文だけを答えてください。説明は不要です。",
        "bg" => "Поправи граматиката на следното изречение на български. Отговори само с поправеното изречение, без обяснения.",
        _ => "Correct the grammar of the following English sentence. Reply with the corrected sentence only, without explanations.",
    }
}

/// Builds reply and correction prompts for one session
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    format: PromptFormat,
    system_prompt: String,
    style_hint: Option<String>,
    grammar_instruction: &'static str,
}

impl PromptBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            format: config.llm.prompt_format,
            system_prompt: config.system_prompt.trim().to_string(),
            style_hint: config
                .reply
                .style_hint
                .then(|| style_hint(&config.language, config.reply.max_sentences)),
            grammar_instruction: grammar_instruction(&config.language),
        }
    }

    pub fn stop_markers(&self) -> &'static [&'static str] {
        self.format.stop_markers()
    }

    /// Prompt for a conversational reply to `text`
    pub fn reply_prompt(&self, text: &str) -> String {
        let content = [
            self.system_prompt.as_str(),
            self.style_hint.as_deref().unwrap_or_default(),
            text,
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

        self.format.wrap(&content)
    }

    /// Prompt asking for a grammatically corrected version of `text`
    pub fn correction_prompt(&self, text: &str) -> String {
        self.format
            .wrap(&format!("{}\n{}", self.grammar_instruction, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(language: &str) -> Config {
        Config {
            language: language.to_string(),
            system_prompt: "You are a friendly tutor.".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_gemma_reply_prompt() {
        let prompts = PromptBuilder::new(&config("en"));
        assert_eq!(
            prompts.reply_prompt("hello"),
            "<start_of_turn>user\nYou are a friendly tutor.\nAnswer concisely in at most 2 sentences.\nhello\n<end_of_turn>\n<start_of_turn>model\n"
        );
        assert_eq!(prompts.stop_markers(), &["<eos>", "<end_of_turn>"]);
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        let mut config = config("en");
        config.system_prompt = "  ".to_string();
        config.reply.style_hint = false;
        let prompts = PromptBuilder::new(&config);
        assert_eq!(
            prompts.reply_prompt("hello"),
            PromptFormat::Gemma.wrap("hello")
        );
    }

    #[test]
    fn test_chatml_format() {
        let wrapped = PromptFormat::ChatMl.wrap("hi");
        assert_eq!(wrapped, "<|im_start|>user\nhi<|im_end|>\n<|im_start|>assistant\n");
        assert_eq!(PromptFormat::ChatMl.stop_markers(), &["<|im_end|>", "<|endoftext|>"]);
    }

    #[test]
    fn test_style_hint_follows_language() {
        assert_eq!(style_hint("ja-JP", 3), "3文以内で簡潔に答えてください。");
        assert_eq!(
            style_hint("bg", 2),
            "Отговори кратко, с най-много 2 изречения."
        );
        assert_eq!(
            style_hint("de", 1),
            "Answer concisely in at most 1 sentences."
        );
    }

    #[test]
    fn test_correction_prompt_uses_session_language() {
        let prompts = PromptBuilder::new(&config("ja"));
        let prompt = prompts.correction_prompt("私は学生です");
        assert!(prompt.contains("文法を直してください"));
        assert!(prompt.contains("私は学生です"));
        assert!(!prompt.contains("friendly tutor"));
    }
}
