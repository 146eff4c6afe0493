//! Approximate token counting for budget-constrained context packing.
//!
//! This is a tokenizer-free approximation: text splits on whitespace and
//! common punctuation, and each word contributes one token per 4 characters
//! (rounded up). Good enough for budget allocation; not a substitute for a
//! model-specific tokenizer.

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Punctuation treated as word separators when counting.
const SEPARATORS: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '-', '(', ')', '[', ']', '{', '}',
];

/// Count approximate tokens in `text`.
///
/// Splits on whitespace and [`SEPARATORS`], drops empty fragments, and sums
/// `ceil(len / 4)` per word. Always returns at least 1, even for empty
/// input.
pub fn count_tokens(text: &str) -> usize {
    let total: usize = text
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|w| !w.is_empty())
        .map(|w| w.chars().count().div_ceil(CHARS_PER_TOKEN))
        .sum();
    total.max(1)
}

/// Truncate `text` to at most `max_tokens`, breaking on word boundaries
/// and appending an ellipsis.
///
/// Text that already fits is returned unchanged (no ellipsis).
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if count_tokens(text) <= max_tokens {
        return text.to_string();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0usize;
    for word in text.split_whitespace() {
        let word_tokens = count_tokens(word);
        if used + word_tokens <= max_tokens {
            kept.push(word);
            used += word_tokens;
        } else {
            break;
        }
    }

    format!("{}...", kept.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counts_one() {
        assert_eq!(count_tokens(""), 1);
        assert_eq!(count_tokens("   "), 1);
    }

    #[test]
    fn test_short_words_one_token_each() {
        // Four words of <= 4 chars each.
        assert_eq!(count_tokens("the cat sat down"), 4);
    }

    #[test]
    fn test_long_word_multiple_tokens() {
        // 12 chars -> 3 tokens.
        assert_eq!(count_tokens("abcdefghijkl"), 3);
    }

    #[test]
    fn test_punctuation_splits_words() {
        // "hello" (2) + "world" (2), the comma is not counted.
        assert_eq!(count_tokens("hello,world"), count_tokens("hello world"));
    }

    #[test]
    fn test_truncate_noop_when_fits() {
        let text = "short text";
        assert_eq!(truncate_to_tokens(text, 100), text);
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let out = truncate_to_tokens(text, 4);
        assert!(out.ends_with("..."));
        assert!(count_tokens(out.trim_end_matches("...")) <= 4);
        assert!(out.len() < text.len());
    }

    #[test]
    fn test_truncate_respects_word_boundaries() {
        let out = truncate_to_tokens("first second third fourth fifth", 2);
        // Never cuts mid-word: output minus ellipsis is a prefix of the
        // input on a word boundary.
        let body = out.trim_end_matches("...");
        assert!("first second third fourth fifth".starts_with(body));
        assert!(!body.ends_with("thi"));
    }
}
