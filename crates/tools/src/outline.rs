//! Outline capability: lays out an essay structure for a topic.

use async_trait::async_trait;
use inkwell_core::capability::{
    ArgType, Capability, CapabilityArgs, CapabilityCategory, CapabilitySchema,
};
use inkwell_core::error::CapabilityError;
use serde_json::{Value, json};

const MIN_SECTIONS: usize = 3;
const MAX_SECTIONS: usize = 8;

pub struct OutlineCapability;

/// Section titles for `n` sections: hook first, conclusion last, body between.
fn section_titles(n: usize) -> Vec<String> {
    let body = [
        "Context: set the scene",
        "Turning point",
        "Reflection: what changed",
        "Evidence: a concrete example",
        "Complication",
        "Growth since then",
    ];
    let mut titles = vec!["Hook: open with a vivid moment".to_string()];
    titles.extend(body.iter().take(n - 2).map(|s| s.to_string()));
    titles.push("Conclusion: tie back to the hook".to_string());
    titles
}

#[async_trait]
impl Capability for OutlineCapability {
    fn name(&self) -> &str {
        "outline"
    }

    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema::new("Produce a section-by-section essay outline for a topic.")
            .require("topic", ArgType::String)
            .optional("sections", ArgType::Integer)
            .category(CapabilityCategory::Generation)
            .keywords(&["outline", "structure", "organize", "plan", "sections"])
    }

    async fn invoke(&self, args: CapabilityArgs) -> Result<Value, CapabilityError> {
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CapabilityError::InvalidArguments("'topic' must be a non-empty string".into()))?;

        let sections = args
            .get("sections")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(5)
            .clamp(MIN_SECTIONS, MAX_SECTIONS);

        let titles = section_titles(sections);
        let text = titles
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {t}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(json!({
            "topic": topic,
            "sections": titles,
            "text": format!("Outline for \"{topic}\":\n{text}"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outline_has_requested_sections() {
        let mut args = CapabilityArgs::new();
        args.insert("topic".into(), json!("moving abroad"));
        args.insert("sections".into(), json!(4));
        let out = OutlineCapability.invoke(args).await.unwrap();
        let sections = out["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 4);
        assert!(sections[0].as_str().unwrap().starts_with("Hook"));
        assert!(sections[3].as_str().unwrap().starts_with("Conclusion"));
    }

    #[tokio::test]
    async fn section_count_is_clamped() {
        let mut args = CapabilityArgs::new();
        args.insert("topic".into(), json!("x"));
        args.insert("sections".into(), json!(1));
        let out = OutlineCapability.invoke(args).await.unwrap();
        assert_eq!(out["sections"].as_array().unwrap().len(), MIN_SECTIONS);
    }

    #[test]
    fn schema_declares_topic() {
        let schema = OutlineCapability.schema();
        assert_eq!(schema.required_args, vec!["topic"]);
        assert_eq!(schema.category, CapabilityCategory::Generation);
    }
}
