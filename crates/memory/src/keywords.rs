//! Keyword fingerprints for pattern mining and similarity search.

use std::collections::{BTreeSet, HashMap};

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "get", "got", "let", "say", "she", "too", "use", "this", "that",
    "with", "from", "they", "will", "would", "there", "their", "what", "about", "which", "when",
    "make", "like", "into", "than", "then", "them", "these", "some", "could", "been", "were",
    "your", "just", "also", "very", "want", "need", "please", "help", "should", "does", "here",
];

/// Extract keywords: lowercase, split on non-alphanumerics, drop short
/// tokens and stop words, rank by frequency then first occurrence.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let lower = text.to_lowercase();
    let tokens = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3 && !STOP_WORDS.contains(t));

    for (position, token) in tokens.enumerate() {
        counts
            .entry(token.to_string())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().map(|(word, _, _)| word).collect()
}

/// The `n` highest-ranked keywords as a set.
pub fn top_keywords(text: &str, n: usize) -> BTreeSet<String> {
    extract_keywords(text).into_iter().take(n).collect()
}

/// Jaccard similarity of two keyword sets; 0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Keywords present in at least `min_share` of the given texts.
pub fn shared_keywords<'a>(texts: impl IntoIterator<Item = &'a str>, min_share: f32) -> BTreeSet<String> {
    let mut presence: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for text in texts {
        total += 1;
        let unique: BTreeSet<String> = extract_keywords(text).into_iter().collect();
        for word in unique {
            *presence.entry(word).or_default() += 1;
        }
    }
    if total == 0 {
        return BTreeSet::new();
    }
    presence
        .into_iter()
        .filter(|(_, n)| *n as f32 / total as f32 >= min_share)
        .map(|(word, _)| word)
        .collect()
}
