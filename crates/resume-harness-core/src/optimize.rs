//! Context optimization for retrieval-augmented answering.
//!
//! Takes raw search hits and produces the passage set actually handed to the
//! completion model. The stages run in a fixed order and the order matters:
//!
//! 1. Score every passage on similarity, length fit, recency, uniqueness.
//! 2. Drop passages scoring below the relevance floor.
//! 3. Sort by combined score, best first.
//! 4. Drop near-duplicates (word-set Jaccard) against already-kept passages,
//!    so the best-scoring variant of a repeated passage survives.
//! 5. Pack passages into the token budget, truncating at most one trailing
//!    passage and only when a useful amount of budget remains.
//!
//! Passages keep their original similarity score on the way out; the
//! combined score is internal to ordering and filtering.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::ContextResult;
use crate::tokens::{count_tokens, truncate_to_tokens};

/// Preferred passage length in characters for the length-fit factor.
const TARGET_LENGTH: f32 = 200.0;
/// Width of the length-fit bell curve.
const LENGTH_SIGMA: f32 = 100.0;
/// Recency factor when a passage carries no date.
const NEUTRAL_RECENCY: f32 = 0.5;
/// One year in milliseconds, the decay scale for recency.
const YEAR_MS: f64 = 365.0 * 24.0 * 60.0 * 60.0 * 1000.0;
/// Word-set Jaccard similarity above which two passages count as duplicates.
const DEDUP_THRESHOLD: f32 = 0.8;
/// Smallest remaining budget worth filling with a truncated passage.
const MIN_TRUNCATION_TOKENS: usize = 100;

const WEIGHT_SIMILARITY: f32 = 0.4;
const WEIGHT_LENGTH: f32 = 0.3;
const WEIGHT_RECENCY: f32 = 0.1;
const WEIGHT_UNIQUENESS: f32 = 0.2;

/// Tuning knobs for [`ContextOptimizer`].
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Token budget for the packed context.
    pub max_tokens: usize,
    /// Combined-score floor; passages below it are dropped.
    pub min_relevance: f32,
    /// Constant uniqueness factor fed into the combined score.
    pub uniqueness_score: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            min_relevance: 0.6,
            uniqueness_score: 0.8,
        }
    }
}

/// Scores, filters, orders, dedupes, and packs retrieval hits.
#[derive(Clone)]
pub struct ContextOptimizer {
    config: OptimizerConfig,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl ContextOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline over `results`.
    pub fn optimize(&self, results: Vec<ContextResult>) -> Vec<ContextResult> {
        let now = Utc::now();

        let mut scored: Vec<(ContextResult, f32)> = results
            .into_iter()
            .map(|r| {
                let score = self.relevance_score(&r, now);
                (r, score)
            })
            .collect();

        scored.retain(|(_, score)| *score >= self.config.min_relevance);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let deduped = dedupe(scored.into_iter().map(|(r, _)| r));
        self.pack(deduped)
    }

    /// Combined relevance of one passage at time `now`.
    fn relevance_score(&self, result: &ContextResult, now: DateTime<Utc>) -> f32 {
        let similarity = result.score;

        let len = result.text.chars().count() as f32;
        let offset = len - TARGET_LENGTH;
        let length_fit = (-(offset * offset) / (2.0 * LENGTH_SIGMA * LENGTH_SIGMA)).exp();

        let recency = passage_date(result)
            .map(|date| {
                let age_ms = (now - date).num_milliseconds() as f64;
                (-(age_ms / YEAR_MS)).exp() as f32
            })
            .unwrap_or(NEUTRAL_RECENCY);

        WEIGHT_SIMILARITY * similarity
            + WEIGHT_LENGTH * length_fit
            + WEIGHT_RECENCY * recency
            + WEIGHT_UNIQUENESS * self.config.uniqueness_score
    }

    /// Accumulate passages into the token budget.
    ///
    /// A passage that does not fit whole is truncated to the remaining budget
    /// when at least [`MIN_TRUNCATION_TOKENS`] remain; either way packing
    /// stops at the first passage that fails to fit whole.
    fn pack(&self, results: Vec<ContextResult>) -> Vec<ContextResult> {
        let mut packed = Vec::new();
        let mut used = 0usize;

        for mut result in results {
            let tokens = count_tokens(&result.text);
            if used + tokens <= self.config.max_tokens {
                used += tokens;
                packed.push(result);
                continue;
            }

            let remaining = self.config.max_tokens - used;
            if remaining >= MIN_TRUNCATION_TOKENS {
                result.text = truncate_to_tokens(&result.text, remaining);
                packed.push(result);
            }
            break;
        }

        packed
    }
}

/// Keep the first passage of each near-duplicate group.
///
/// Input must already be ordered best-first; this keeps the best-scoring
/// variant.
fn dedupe(results: impl Iterator<Item = ContextResult>) -> Vec<ContextResult> {
    let mut kept = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for result in results {
        let normalized = normalize_text(&result.text);
        let duplicate = seen
            .iter()
            .any(|prev| jaccard_similarity(prev, &normalized) > DEDUP_THRESHOLD);
        if !duplicate {
            seen.push(normalized);
            kept.push(result);
        }
    }

    kept
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity over word sets of two normalized strings.
fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();

    intersection as f32 / union as f32
}

/// Pull an RFC 3339 date out of a passage's payload, if present.
fn passage_date(result: &ContextResult) -> Option<DateTime<Utc>> {
    let raw = result.metadata.as_ref()?.get("date")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
