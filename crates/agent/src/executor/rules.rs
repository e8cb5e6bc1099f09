//! Data-driven argument remapping and fallback injection.
//!
//! LLMs name arguments loosely (`subject`, `essay`, `content`). Each rule
//! maps generic names onto the capability's own and fills in defaults for
//! anything still absent. The built-in table can be extended from config:
//!
//! ```toml
//! [executor.argument_rules.outline]
//! renames = { heading = "topic" }
//! defaults = { sections = 6 }
//! ```

use inkwell_config::{ArgumentRuleConfig, ExecutorConfig};
use inkwell_core::capability::CapabilityArgs;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentRule {
    /// Generic name → capability-specific name
    pub renames: BTreeMap<String, String>,
    /// Injected when the argument is absent or null
    pub defaults: BTreeMap<String, Value>,
}

impl ArgumentRule {
    fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    fn default_value(mut self, arg: &str, value: Value) -> Self {
        self.defaults.insert(arg.into(), value);
        self
    }

    fn merge(&mut self, config: &ArgumentRuleConfig) {
        self.renames.extend(config.renames.clone());
        self.defaults.extend(config.defaults.clone());
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArgumentRules {
    rules: HashMap<String, ArgumentRule>,
}

impl ArgumentRules {
    /// Rules for the built-in capabilities.
    pub fn builtin() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            "brainstorm".to_string(),
            ArgumentRule::default()
                .rename("subject", "topic")
                .rename("theme", "topic")
                .rename("query", "topic")
                .rename("prompt", "topic")
                .rename("num_ideas", "count")
                .default_value("topic", json!("your personal essay"))
                .default_value("count", json!(5)),
        );
        rules.insert(
            "outline".to_string(),
            ArgumentRule::default()
                .rename("subject", "topic")
                .rename("title", "topic")
                .rename("thesis", "topic")
                .rename("num_sections", "sections")
                .default_value("sections", json!(5)),
        );
        rules.insert(
            "word_count".to_string(),
            ArgumentRule::default()
                .rename("content", "text")
                .rename("essay", "text")
                .rename("draft", "text"),
        );
        Self { rules }
    }

    /// Built-in rules with the configured rules merged over them.
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let mut rules = Self::builtin();
        for (capability, rule) in &config.argument_rules {
            rules.rules.entry(capability.clone()).or_default().merge(rule);
        }
        rules
    }

    pub fn rule(&self, capability: &str) -> Option<&ArgumentRule> {
        self.rules.get(capability)
    }

    /// Apply renames, then defaults. Arguments already present under the
    /// specific name are never overwritten.
    pub fn resolve(&self, capability: &str, mut args: CapabilityArgs) -> CapabilityArgs {
        let Some(rule) = self.rules.get(capability) else {
            return args;
        };
        let absent = |args: &CapabilityArgs, key: &str| args.get(key).is_none_or(Value::is_null);

        for (from, to) in &rule.renames {
            if absent(&args, to)
                && let Some(value) = args.remove(from)
            {
                args.insert(to.clone(), value);
            }
        }
        for (arg, value) in &rule.defaults {
            if absent(&args, arg) {
                args.insert(arg.clone(), value.clone());
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> CapabilityArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renames_generic_names() {
        let rules = ArgumentRules::builtin();
        let out = rules.resolve("word_count", args(json!({"essay": "One two three."})));
        assert_eq!(out["text"], "One two three.");
        assert!(!out.contains_key("essay"));
    }

    #[test]
    fn specific_name_wins_over_rename() {
        let rules = ArgumentRules::builtin();
        let out = rules.resolve("outline", args(json!({"topic": "a", "subject": "b"})));
        assert_eq!(out["topic"], "a");
        assert_eq!(out["subject"], "b");
    }

    #[test]
    fn defaults_fill_absent_and_null() {
        let rules = ArgumentRules::builtin();
        let out = rules.resolve("brainstorm", args(json!({"topic": null})));
        assert_eq!(out["topic"], "your personal essay");
        assert_eq!(out["count"], 5);
    }

    #[test]
    fn config_rules_merge_over_builtin() {
        let mut config = ExecutorConfig::default();
        config.argument_rules.insert(
            "outline".into(),
            ArgumentRuleConfig {
                renames: BTreeMap::from([("heading".to_string(), "topic".to_string())]),
                defaults: BTreeMap::from([("sections".to_string(), json!(7))]),
            },
        );
        config.argument_rules.insert(
            "summarize".into(),
            ArgumentRuleConfig {
                renames: BTreeMap::new(),
                defaults: BTreeMap::from([("length".to_string(), json!("short"))]),
            },
        );
        let rules = ArgumentRules::from_config(&config);

        let out = rules.resolve("outline", args(json!({"heading": "x"})));
        assert_eq!(out["topic"], "x");
        assert_eq!(out["sections"], 7);
        // built-in renames survive the merge
        assert_eq!(rules.resolve("outline", args(json!({"title": "y"})))["topic"], "y");
        assert_eq!(rules.resolve("summarize", CapabilityArgs::new())["length"], "short");
    }

    #[test]
    fn unknown_capability_passes_through() {
        let rules = ArgumentRules::builtin();
        let input = args(json!({"a": 1}));
        assert_eq!(rules.resolve("mystery", input.clone()), input);
    }
}
