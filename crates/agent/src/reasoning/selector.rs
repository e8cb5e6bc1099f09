//! Independent capability selection used to cross-check the LLM's choice.

use inkwell_core::capability::{CapabilityArgs, CapabilityRegistry};
use std::collections::BTreeSet;

/// A selector's proposal for the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitySuggestion {
    pub capability: String,
    pub confidence: f32,
    /// Arguments the selector is sure of; anything absent is left to the
    /// executor's argument rules
    pub args: CapabilityArgs,
}

/// Proposes a capability for an input without calling the LLM.
pub trait CapabilitySelector: Send + Sync {
    fn suggest(&self, input: &str) -> Option<CapabilitySuggestion>;
}

struct Entry {
    name: String,
    keywords: BTreeSet<String>,
    threshold: f32,
}

/// Matches input words against each capability's declared keywords.
///
/// One hit gives 0.6, two 0.75, three or more 0.9. Suggestions below the
/// capability's own confidence threshold are withheld. Keywords say which
/// capability fits, not what to feed it, so suggestions carry no arguments.
pub struct KeywordSelector {
    entries: Vec<Entry>,
}

impl KeywordSelector {
    pub fn from_registry(registry: &CapabilityRegistry) -> Self {
        let entries = registry
            .schemas()
            .into_iter()
            .filter(|(_, schema)| !schema.keywords.is_empty())
            .map(|(name, schema)| Entry {
                name,
                keywords: schema.keywords.iter().cloned().collect(),
                threshold: schema.confidence_threshold,
            })
            .collect();
        Self { entries }
    }
}

fn hit_confidence(hits: usize) -> f32 {
    match hits {
        0 => 0.0,
        1 => 0.6,
        2 => 0.75,
        _ => 0.9,
    }
}

impl CapabilitySelector for KeywordSelector {
    fn suggest(&self, input: &str) -> Option<CapabilitySuggestion> {
        let words: BTreeSet<String> = input
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        // registry order is sorted by name, so ties resolve alphabetically
        let (entry, hits) = self
            .entries
            .iter()
            .map(|e| (e, e.keywords.intersection(&words).count()))
            .filter(|(_, hits)| *hits > 0)
            .fold(None::<(&Entry, usize)>, |best, (e, hits)| match best {
                Some((_, best_hits)) if best_hits >= hits => best,
                _ => Some((e, hits)),
            })?;

        let confidence = hit_confidence(hits);
        if confidence < entry.threshold {
            return None;
        }
        Some(CapabilitySuggestion {
            capability: entry.name.clone(),
            confidence,
            args: CapabilityArgs::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_tools::default_registry;

    #[test]
    fn strongest_keyword_match_wins() {
        let selector = KeywordSelector::from_registry(&default_registry());
        let s = selector.suggest("I need some ideas, I'm stuck").unwrap();
        assert_eq!(s.capability, "brainstorm");
        assert_eq!(s.confidence, 0.75);
        assert!(s.args.is_empty());
    }

    #[test]
    fn one_hit_meets_default_threshold() {
        let selector = KeywordSelector::from_registry(&default_registry());
        // outline keeps the default 0.6 threshold, so one hit is enough
        assert_eq!(selector.suggest("can you outline this").unwrap().capability, "outline");
        assert!(selector.suggest("tell me a story").is_none());
    }
}
