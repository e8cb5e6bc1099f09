//! Word count capability: basic length statistics for a draft.

use async_trait::async_trait;
use inkwell_core::capability::{
    ArgType, Capability, CapabilityArgs, CapabilityCategory, CapabilitySchema,
};
use inkwell_core::error::CapabilityError;
use serde_json::{Value, json};

/// Average adult silent reading speed.
const WORDS_PER_MINUTE: f64 = 238.0;

pub struct WordCountCapability;

#[async_trait]
impl Capability for WordCountCapability {
    fn name(&self) -> &str {
        "word_count"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Count words, sentences and paragraphs in a piece of text.")
            .require("text", ArgType::String)
            .category(CapabilityCategory::Analysis)
            .keywords(&["count", "words", "length", "long", "limit"])
    }

    async fn invoke(&self, args: CapabilityArgs) -> Result<Value, CapabilityError> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::InvalidArguments("'text' must be a string".into()))?;

        let words = text.split_whitespace().count();
        let sentences = text
            .split(['.', '!', '?'])
            .filter(|s| s.split_whitespace().next().is_some())
            .count();
        let paragraphs = text
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();

        Ok(json!({
            "words": words,
            "characters": text.chars().count(),
            "sentences": sentences,
            "paragraphs": paragraphs,
            "reading_time_minutes": (words as f64 / WORDS_PER_MINUTE * 10.0).round() / 10.0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_words_sentences_paragraphs() {
        let mut args = CapabilityArgs::new();
        args.insert(
            "text".into(),
            json!("I failed my first exam. It hurt!\n\nThen I learned to study."),
        );
        let out = WordCountCapability.invoke(args).await.unwrap();
        assert_eq!(out["words"], 12);
        assert_eq!(out["sentences"], 3);
        assert_eq!(out["paragraphs"], 2);
    }

    #[tokio::test]
    async fn empty_text_is_zero() {
        let mut args = CapabilityArgs::new();
        args.insert("text".into(), json!(""));
        let out = WordCountCapability.invoke(args).await.unwrap();
        assert_eq!(out["words"], 0);
        assert_eq!(out["paragraphs"], 0);
    }

    #[tokio::test]
    async fn non_string_text_rejected() {
        let mut args = CapabilityArgs::new();
        args.insert("text".into(), json!(42));
        assert!(WordCountCapability.invoke(args).await.is_err());
    }
}
