//! Rough token counts for context budgeting.
//!
//! One token per four characters, rounded up. Counting chars rather than
//! bytes keeps accented prose from blowing the budget.

/// Approximate token cost of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
