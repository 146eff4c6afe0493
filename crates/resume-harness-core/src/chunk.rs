//! Overlapping text chunker.
//!
//! Splits cleaned resume text into [`Chunk`]s bounded by a configurable
//! character budget, carrying a trailing slice of each chunk into the next
//! one so retrieval units keep context across the cut.
//!
//! # Algorithm (paragraph mode)
//!
//! 1. Clean the text: collapse whitespace runs inside paragraphs, normalize
//!    line endings, reduce blank-line runs to a single `\n\n` separator.
//! 2. Split on `\n\n` paragraph boundaries.
//! 3. Accumulate paragraphs until adding the next one would exceed
//!    `max_chunk_size`, then flush the buffer as a chunk.
//! 4. Seed the next buffer with the last `overlap_size` characters of
//!    already-flushed text, recorded as the new chunk's `overlap` span.
//! 5. A single paragraph longer than `max_chunk_size` is kept intact as its
//!    own oversized chunk, never cut mid-word.
//!
//! Size mode skips paragraph structure and accumulates
//! whitespace-delimited words instead, seeding overlap with the last
//! `ceil(overlap_size / 5)` words.
//!
//! With a non-zero `overlap_size`, concatenating the first chunk's text
//! with every later chunk's text after its `overlap` prefix reproduces the
//! cleaned input exactly. A chunk may exceed `max_chunk_size` by the
//! overlap carry when a paragraph fills the whole budget; that is the cost
//! of guaranteeing the shared context.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Chunker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    /// Character budget per chunk.
    pub max_chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub overlap_size: usize,
    /// Split on paragraph boundaries first (`true`) or on words alone.
    pub preserve_paragraphs: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            max_chunk_size: 1000,
            overlap_size: 100,
            preserve_paragraphs: true,
        }
    }
}

/// Normalize text for chunking.
///
/// Collapses internal whitespace runs (including single newlines) to one
/// space, normalizes `\r\n`, drops empty paragraphs, and joins the rest
/// with exactly one blank line. Deterministic and idempotent.
pub fn clean_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut paragraphs: Vec<String> = Vec::new();
    for raw in normalized.split("\n\n") {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            paragraphs.push(collapsed);
        }
    }
    paragraphs.join("\n\n")
}

/// Split `text` into an ordered chunk sequence per `config`.
///
/// The input is cleaned first ([`clean_text`]); callers pass raw text.
/// At least one chunk is always returned, even for empty input, and
/// identical input plus configuration always yields the identical
/// sequence.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let cleaned = clean_text(text);

    if cleaned.is_empty() {
        return vec![make_chunk(0, "", 0)];
    }

    let pieces = if config.preserve_paragraphs {
        chunk_by_paragraphs(&cleaned, config.max_chunk_size, config.overlap_size)
    } else {
        chunk_by_size(&cleaned, config.max_chunk_size, config.overlap_size)
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (text, overlap))| make_chunk(i, &text, overlap))
        .collect()
}

/// Accumulate whole paragraphs into chunks, carrying a character tail
/// between them. Returns `(chunk text, overlap byte length)` pairs.
fn chunk_by_paragraphs(text: &str, max_size: usize, overlap: usize) -> Vec<(String, usize)> {
    let mut chunks: Vec<(String, usize)> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_chars = 0usize;
    let mut current_overlap = 0usize;
    let mut has_paragraph = false;

    for para in text.split("\n\n") {
        if para.is_empty() {
            continue;
        }
        let para_chars = para.chars().count();
        let would_be = if current.is_empty() {
            para_chars
        } else {
            current_chars + 2 + para_chars
        };

        if would_be > max_size && has_paragraph {
            chunks.push((current.join("\n\n"), current_overlap));
            current.clear();
            current_chars = 0;
            current_overlap = 0;
            has_paragraph = false;

            let tail = trailing_context(&chunks, overlap);
            if !tail.is_empty() {
                current_overlap = tail.len();
                current_chars = tail.chars().count();
                current.push(tail);
            }
        }

        current_chars += if current.is_empty() {
            para_chars
        } else {
            2 + para_chars
        };
        current.push(para.to_string());
        has_paragraph = true;
    }

    if has_paragraph {
        chunks.push((current.join("\n\n"), current_overlap));
    }

    chunks
}

/// Accumulate whitespace-delimited words into chunks, carrying a word tail
/// between them.
fn chunk_by_size(text: &str, max_size: usize, overlap: usize) -> Vec<(String, usize)> {
    let overlap_words = overlap.div_ceil(5);
    let mut chunks: Vec<(String, usize)> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_chars = 0usize;
    let mut current_overlap = 0usize;
    let mut seeded = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let would_be = if current.is_empty() {
            word_chars
        } else {
            current_chars + 1 + word_chars
        };

        if would_be > max_size && current.len() > seeded {
            chunks.push((current.join(" "), current_overlap));
            let tail: Vec<String> = current
                .iter()
                .skip(current.len().saturating_sub(overlap_words))
                .cloned()
                .collect();
            current = tail;
            current_overlap = current.join(" ").len();
            current_chars = current.iter().map(|w| w.chars().count()).sum::<usize>()
                + current.len().saturating_sub(1);
            seeded = current.len();
        }

        current_chars += if current.is_empty() {
            word_chars
        } else {
            1 + word_chars
        };
        current.push(word.to_string());
    }

    if current.len() > seeded {
        chunks.push((current.join(" "), current_overlap));
    }

    chunks
}

/// Collect the last `overlap` characters of already-flushed chunk text,
/// walking backward across chunks until enough context is gathered.
fn trailing_context(chunks: &[(String, usize)], overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let mut tail = String::new();
    for (text, _) in chunks.iter().rev() {
        let chars: Vec<char> = text.chars().collect();
        let start = chars.len().saturating_sub(overlap);
        let piece: String = chars[start..].iter().collect();
        tail = format!("{piece}{tail}");
        if tail.chars().count() >= overlap {
            break;
        }
    }
    tail
}

/// Create a single [`Chunk`] with a SHA-256 content hash.
fn make_chunk(index: usize, text: &str, overlap: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_index: index,
        text: text.to_string(),
        overlap,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        for c in chunks {
            out.push_str(&c.text[c.overlap..]);
        }
        out
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        let cleaned = clean_text("Hello   world\nsecond  line\n\n\nNext    para");
        assert_eq!(cleaned, "Hello world second line\n\nNext para");
    }

    #[test]
    fn test_clean_text_handles_crlf() {
        let cleaned = clean_text("a\r\n\r\nb");
        assert_eq!(cleaned, "a\n\nb");
    }

    #[test]
    fn test_clean_text_idempotent() {
        let once = clean_text("  a   b \n\n c  ");
        assert_eq!(clean_text(&once), once);
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", &ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_empty_text_single_empty_chunk() {
        let chunks = chunk_text("", &ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn test_paragraph_split_carries_overlap() {
        let text = (0..8)
            .map(|i| format!("Paragraph number {i} with a little bit of padding text."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 120,
            overlap_size: 20,
            preserve_paragraphs: true,
        };
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        for c in chunks.iter().skip(1) {
            assert!(c.overlap >= 20, "chunk {} overlap {}", c.chunk_index, c.overlap);
            // The overlap prefix repeats trailing context of the previous text.
            let prev = &chunks[c.chunk_index - 1];
            assert!(prev.text.ends_with(&c.text[..c.overlap]));
        }
    }

    #[test]
    fn test_paragraph_mode_reconstructs_cleaned_text() {
        let text = (0..12)
            .map(|i| format!("Sentence {i} describing one more project milestone."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 100,
            overlap_size: 15,
            preserve_paragraphs: true,
        };
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), clean_text(&text));
    }

    #[test]
    fn test_size_mode_reconstructs_cleaned_text() {
        let text = (0..80)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let config = ChunkConfig {
            max_chunk_size: 60,
            overlap_size: 10,
            preserve_paragraphs: false,
        };
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), clean_text(&text));
    }

    #[test]
    fn test_oversized_paragraph_kept_intact() {
        let big = "x".repeat(40).replace("xx", "ax "); // one long paragraph of words
        let text = format!("Short intro.\n\n{big}\n\nShort outro.");
        let config = ChunkConfig {
            max_chunk_size: 30,
            overlap_size: 5,
            preserve_paragraphs: true,
        };
        let chunks = chunk_text(&text, &config);
        let whole = chunks.iter().any(|c| c.text.contains(big.trim()));
        assert!(whole, "oversized paragraph must not be cut mid-word");
    }

    #[test]
    fn test_chunk_size_bounded_without_overlap_carry() {
        let text = (0..20)
            .map(|i| format!("Para {i} text."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 40,
            overlap_size: 0,
            preserve_paragraphs: true,
        };
        for c in chunk_text(&text, &config) {
            assert!(
                c.text.chars().count() <= 40,
                "chunk {} too long: {}",
                c.chunk_index,
                c.text.len()
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let config = ChunkConfig {
            max_chunk_size: 12,
            overlap_size: 4,
            preserve_paragraphs: true,
        };
        let a = chunk_text(text, &config);
        let b = chunk_text(text, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_indices_contiguous() {
        let text = (0..30)
            .map(|i| format!("Paragraph number {i}."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 50,
            overlap_size: 8,
            preserve_paragraphs: true,
        };
        for (i, c) in chunk_text(&text, &config).iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
    }

    #[test]
    fn test_multibyte_overlap_boundaries() {
        let text = (0..10)
            .map(|i| format!("Résumé numéro {i} avec des caractères accentués."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let config = ChunkConfig {
            max_chunk_size: 90,
            overlap_size: 12,
            preserve_paragraphs: true,
        };
        let chunks = chunk_text(&text, &config);
        assert!(chunks.len() > 1);
        // overlap is a byte length on a char boundary: slicing must not panic
        assert_eq!(reconstruct(&chunks), clean_text(&text));
    }
}
