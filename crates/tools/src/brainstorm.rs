//! Brainstorm capability: generates essay angles for a topic.
//!
//! Deterministic: the same topic and count always give the same ideas, so
//! the capability is safe to retry.

use async_trait::async_trait;
use inkwell_core::capability::{
    ArgType, Capability, CapabilityArgs, CapabilityCategory, CapabilitySchema,
};
use inkwell_core::error::CapabilityError;
use serde_json::Value;

const DEFAULT_COUNT: usize = 5;
const MAX_COUNT: usize = 12;

const ANGLES: &[&str] = &[
    "A specific moment when {} changed how you see yourself",
    "What {} taught you that no classroom could",
    "A misconception you once held about {}",
    "The people who shaped your experience of {}",
    "How {} connects to what you want to study",
    "A small, concrete object that represents {}",
    "The hardest decision you faced around {}",
    "What you would tell your younger self about {}",
    "A time {} forced you to ask for help",
    "How your view of {} differs from your family's",
    "The unexpected humor in {}",
    "What {} looks like one year from now",
];

pub struct BrainstormCapability;

#[async_trait]
impl Capability for BrainstormCapability {
    fn name(&self) -> &str {
        "brainstorm"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Generate essay ideas and angles for a topic.")
            .require("topic", ArgType::String)
            .optional("count", ArgType::Integer)
            .category(CapabilityCategory::Generation)
            .confidence_threshold(0.5)
            .keywords(&["brainstorm", "ideas", "idea", "angles", "topics", "stuck"])
    }

    async fn invoke(&self, args: CapabilityArgs) -> Result<Value, CapabilityError> {
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CapabilityError::InvalidArguments("'topic' must be a non-empty string".into()))?;

        let count = match args.get("count") {
            None | Some(Value::Null) => DEFAULT_COUNT,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or_else(|| CapabilityError::InvalidArguments("'count' must be a positive integer".into()))?
                as usize,
        }
        .min(MAX_COUNT);

        // rotate the starting angle by topic so different topics read differently
        let offset = topic.bytes().map(usize::from).sum::<usize>() % ANGLES.len();
        let ideas: Vec<String> = (0..count)
            .map(|i| ANGLES[(offset + i) % ANGLES.len()].replace("{}", topic))
            .collect();

        let text = ideas
            .iter()
            .enumerate()
            .map(|(i, idea)| format!("{}. {idea}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Value::String(format!("Here are {count} ideas for \"{topic}\":\n{text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> CapabilityArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn default_count_is_five() {
        let out = BrainstormCapability
            .invoke(args(json!({"topic": "failure"})))
            .await
            .unwrap();
        let text = out.as_str().unwrap();
        assert!(text.contains("5 ideas"));
        assert_eq!(text.lines().count(), 6);
        assert!(text.contains("failure"));
    }

    #[tokio::test]
    async fn count_is_capped() {
        let out = BrainstormCapability
            .invoke(args(json!({"topic": "music", "count": 50})))
            .await
            .unwrap();
        assert_eq!(out.as_str().unwrap().lines().count(), MAX_COUNT + 1);
    }

    #[tokio::test]
    async fn deterministic_for_same_input() {
        let a = BrainstormCapability.invoke(args(json!({"topic": "grit"}))).await.unwrap();
        let b = BrainstormCapability.invoke(args(json!({"topic": "grit"}))).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn blank_topic_rejected() {
        let err = BrainstormCapability
            .invoke(args(json!({"topic": "  "})))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments(_)));
    }
}
