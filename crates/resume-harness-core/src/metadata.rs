//! Heuristic resume metadata derivation.
//!
//! Best-effort extraction of searchable facts from raw resume text: a skill
//! list matched against a fixed vocabulary, education entries found in the
//! education section, and total years of experience summed from explicit
//! `N years` mentions in the experience section. Section boundaries are
//! keyword-based (`education`, `experience`, `skills`, `projects`), so a
//! section that is last in the document and not followed by another keyword
//! yields nothing. Derivation never fails; absent matches simply produce
//! empty fields.

use regex::Regex;

use crate::models::EducationEntry;

/// Skill vocabulary matched (case-insensitively) against resume text.
pub const KNOWN_SKILLS: &[&str] = &[
    "javascript",
    "python",
    "java",
    "react",
    "node.js",
    "sql",
    "aws",
    "docker",
    "kubernetes",
    "machine learning",
    "ai",
    "typescript",
    "mongodb",
    "postgresql",
    "rest api",
];

/// Metadata derived from raw resume text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedMetadata {
    /// Lowercase vocabulary skills present in the text.
    pub skills: Vec<String>,
    /// Education entries found in the education section.
    pub education: Vec<EducationEntry>,
    /// Summed years of experience from `N years` mentions.
    pub experience_years: u32,
}

/// Compiled section and entity patterns.
pub struct MetadataExtractor {
    education_section: Regex,
    degree: Regex,
    year: Regex,
    experience_section: Regex,
    years_mention: Regex,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        MetadataExtractor {
            education_section: Regex::new(r"(?is)education(.*?)(experience|skills|projects)")
                .unwrap(),
            degree: Regex::new(
                r"(?is)(?:bachelor|master|phd|b\.?(?:tech|sc|a)|m\.?(?:tech|sc|ba)|doctorate).*?(?:20\d{2}|\d{2})",
            )
            .unwrap(),
            year: Regex::new(r"\d{4}|\d{2}").unwrap(),
            experience_section: Regex::new(r"(?is)experience(.*?)(education|skills|projects)")
                .unwrap(),
            years_mention: Regex::new(r"(?i)(\d+)(?:\s*-\s*\d+)?\s*years?").unwrap(),
        }
    }

    /// Run all heuristics over `text`.
    pub fn derive(&self, text: &str) -> DerivedMetadata {
        DerivedMetadata {
            skills: self.extract_skills(text),
            education: self.extract_education(text),
            experience_years: self.estimate_experience_years(text),
        }
    }

    /// Vocabulary skills present anywhere in the text, lowercased, in
    /// vocabulary order.
    pub fn extract_skills(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        KNOWN_SKILLS
            .iter()
            .filter(|skill| lower.contains(**skill))
            .map(|skill| skill.to_string())
            .collect()
    }

    /// Degree mentions in the education section.
    ///
    /// Each entry keeps the degree keyword as written, pairs it with the
    /// first year-like number in the mention, and leaves the institution
    /// as `"Unknown"` (not derivable from flat text).
    pub fn extract_education(&self, text: &str) -> Vec<EducationEntry> {
        let section = match self.education_section.captures(text) {
            Some(caps) => caps.get(1).map(|m| m.as_str().to_string()),
            None => None,
        };
        let section = match section {
            Some(s) => s,
            None => return Vec::new(),
        };

        self.degree
            .find_iter(&section)
            .map(|m| {
                let matched = m.as_str();
                let degree = matched
                    .split_whitespace()
                    .next()
                    .unwrap_or(matched)
                    .to_string();
                let year = self
                    .year
                    .find(matched)
                    .and_then(|y| y.as_str().parse::<i32>().ok());
                EducationEntry {
                    degree,
                    institution: "Unknown".to_string(),
                    year,
                }
            })
            .collect()
    }

    /// Sum of the first number in every `N years` (or `N-M years`) mention
    /// inside the experience section. 0 when no section or no mentions.
    pub fn estimate_experience_years(&self, text: &str) -> u32 {
        let section = match self.experience_section.captures(text) {
            Some(caps) => caps.get(1).map(|m| m.as_str().to_string()),
            None => None,
        };
        let section = match section {
            Some(s) => s,
            None => return 0,
        };

        self.years_mention
            .captures_iter(&section)
            .filter_map(|caps| caps.get(1).and_then(|n| n.as_str().parse::<u32>().ok()))
            .sum()
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}
