//! Text processing module
//!
//! Pre-synthesis text transformations. Speech engines read digit runs
//! poorly (or not at all, in the case of some MMS voices), so every digit is
//! replaced by its spoken word in the session language before synthesis.

use crate::config::{base_language, TextConfig};
use regex::Regex;

const DIGITS_EN: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

const DIGITS_JA: [&str; 10] = [
    "ぜろ", "いち", "に", "さん", "よん", "ご", "ろく", "なな", "はち", "きゅう",
];

const DIGITS_BG: [&str; 10] = [
    "нула", "едно", "две", "три", "четири", "пет", "шест", "седем", "осем", "девет",
];

/// Replaces digit runs with spoken digit words
pub struct NumberReader {
    /// Word for each digit 0-9
    words: [String; 10],
    /// Separator between words of the same run
    separator: &'static str,
}

impl NumberReader {
    /// Build a reader for the session language, applying config overrides
    pub fn new(config: &TextConfig, language: &str) -> Self {
        let base = base_language(language);
        let (table, separator) = match base {
            "ja" => (&DIGITS_JA, ""),
            "bg" => (&DIGITS_BG, " "),
            _ => (&DIGITS_EN, " "),
        };

        let mut words: [String; 10] = table.map(String::from);
        for (key, word) in &config.digits {
            match key.parse::<usize>() {
                Ok(digit) if digit < 10 => words[digit] = word.clone(),
                _ => tracing::warn!("Ignoring digit override for '{}'", key),
            }
        }

        Self { words, separator }
    }

    /// Replace every digit run in `text`
    pub fn process(&self, text: &str) -> String {
        match Regex::new("[0-9]+") {
            Ok(re) => re
                .replace_all(text, |caps: &regex::Captures| {
                    caps[0]
                        .bytes()
                        .map(|b| self.words[(b - b'0') as usize].as_str())
                        .collect::<Vec<_>>()
                        .join(self.separator)
                })
                .into_owned(),
            Err(_) => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn reader(language: &str) -> NumberReader {
        NumberReader::new(&TextConfig::default(), language)
    }

    #[test]
    fn test_english_digits() {
        assert_eq!(
            reader("en").process("Room 42 is open"),
            "Room four two is open"
        );
    }

    #[test]
    fn test_japanese_digits_are_joined() {
        assert_eq!(reader("ja-JP").process("3時15分"), "さん時いちご分");
    }

    #[test]
    fn test_bulgarian_digits() {
        assert_eq!(reader("bg").process("7 дни"), "седем дни");
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(reader("fr").process("10"), "one zero");
    }

    #[test]
    fn test_text_without_digits_is_unchanged() {
        let text = "No numbers here.";
        assert_eq!(reader("en").process(text), text);
    }

    #[test]
    fn test_overrides() {
        let mut digits = HashMap::new();
        digits.insert("0".to_string(), "oh".to_string());
        digits.insert("x".to_string(), "ignored".to_string());
        let config = TextConfig {
            number_pronunciation: true,
            digits,
        };
        let reader = NumberReader::new(&config, "en");
        assert_eq!(reader.process("007"), "oh oh seven");
    }
}
