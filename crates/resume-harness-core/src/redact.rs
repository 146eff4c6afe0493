//! PII extraction and redaction.
//!
//! Replaces email, phone, national-ID-like, and payment-card-like patterns
//! with a sentinel token. The metadata-extraction variant captures the
//! first email and phone match verbatim before redacting them, so contact
//! fields survive into structured metadata while the text that reaches the
//! chunker, the index, and every cache is already scrubbed.
//!
//! Replacement order is fixed: email, phone, then the always-redacted
//! ID and card patterns. Redaction is idempotent; the sentinel token never
//! re-matches any pattern.

use regex::Regex;

/// Sentinel token substituted for every PII match.
pub const DEFAULT_REPLACEMENT: &str = "[REDACTED]";

/// Redaction behavior switches.
///
/// `keep_email` / `keep_phone` leave those patterns in place; ID-like and
/// card-like patterns are redacted regardless.
#[derive(Debug, Clone)]
pub struct RedactionOptions {
    pub keep_email: bool,
    pub keep_phone: bool,
    pub replacement: String,
}

impl Default for RedactionOptions {
    fn default() -> Self {
        RedactionOptions {
            keep_email: false,
            keep_phone: false,
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

/// Contact fields captured before redaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PiiMetadata {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Compiled PII patterns.
pub struct PiiRedactor {
    email: Regex,
    phone: Regex,
    ssn: Regex,
    credit_card: Regex,
}

impl PiiRedactor {
    pub fn new() -> Self {
        // Literal patterns, compiled once per process.
        PiiRedactor {
            email: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            phone: Regex::new(r"(\+\d{1,3}[\s.-])?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}").unwrap(),
            ssn: Regex::new(r"\b\d{3}[-.]?\d{2}[-.]?\d{4}\b").unwrap(),
            credit_card: Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").unwrap(),
        }
    }

    /// Redact PII per `options`. Never fails; unmatched text passes through.
    pub fn redact(&self, text: &str, options: &RedactionOptions) -> String {
        let replacement = options.replacement.as_str();
        let mut redacted = text.to_string();

        if !options.keep_email {
            redacted = self.email.replace_all(&redacted, replacement).into_owned();
        }
        if !options.keep_phone {
            redacted = self.phone.replace_all(&redacted, replacement).into_owned();
        }

        redacted = self.ssn.replace_all(&redacted, replacement).into_owned();
        self.credit_card
            .replace_all(&redacted, replacement)
            .into_owned()
    }

    /// Capture the first email and phone match, then redact per `options`.
    ///
    /// Extraction happens on the original text, so the metadata values are
    /// verbatim even when the returned text replaces them.
    pub fn extract_and_redact(
        &self,
        text: &str,
        options: &RedactionOptions,
    ) -> (String, PiiMetadata) {
        let metadata = PiiMetadata {
            email: self.email.find(text).map(|m| m.as_str().to_string()),
            phone: self.phone.find(text).map(|m| m.as_str().to_string()),
        };
        let redacted = self.redact(text, options);
        (redacted, metadata)
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_email_and_phone_verbatim() {
        let redactor = PiiRedactor::new();
        let text = "Jane Doe, jane@example.com, (555) 123-4567, Berlin.";
        let (redacted, meta) = redactor.extract_and_redact(text, &RedactionOptions::default());

        assert_eq!(meta.email.as_deref(), Some("jane@example.com"));
        assert_eq!(meta.phone.as_deref(), Some("(555) 123-4567"));
        assert!(!redacted.contains("jane@example.com"));
        assert!(!redacted.contains("(555) 123-4567"));
        assert!(redacted.contains("[REDACTED]"));
        assert!(redacted.contains("Berlin"));
    }

    #[test]
    fn test_first_match_wins() {
        let redactor = PiiRedactor::new();
        let (_, meta) = redactor
            .extract_and_redact("a@example.com then b@example.com", &RedactionOptions::default());
        assert_eq!(meta.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_keep_email_preserves_email() {
        let redactor = PiiRedactor::new();
        let options = RedactionOptions {
            keep_email: true,
            ..Default::default()
        };
        let out = redactor.redact("reach me at jane@example.com or 555-123-4567", &options);
        assert!(out.contains("jane@example.com"));
        assert!(!out.contains("555-123-4567"));
    }

    #[test]
    fn test_ssn_and_card_always_redacted() {
        let redactor = PiiRedactor::new();
        let options = RedactionOptions {
            keep_email: true,
            keep_phone: true,
            ..Default::default()
        };
        let out = redactor.redact("SSN 123-45-6789 card 4111-1111-1111-1111", &options);
        assert!(!out.contains("123-45-6789"));
        assert!(!out.contains("4111-1111-1111-1111"));
    }

    #[test]
    fn test_idempotent() {
        let redactor = PiiRedactor::new();
        let options = RedactionOptions::default();
        let once = redactor.redact(
            "jane@example.com / (555) 123-4567 / 123-45-6789",
            &options,
        );
        let twice = redactor.redact(&once, &options);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_match_passthrough() {
        let redactor = PiiRedactor::new();
        let text = "Plain resume text with no contact details.";
        let (redacted, meta) = redactor.extract_and_redact(text, &RedactionOptions::default());
        assert_eq!(redacted, text);
        assert_eq!(meta, PiiMetadata::default());
    }

    #[test]
    fn test_custom_replacement_token() {
        let redactor = PiiRedactor::new();
        let options = RedactionOptions {
            replacement: "<hidden>".to_string(),
            ..Default::default()
        };
        let out = redactor.redact("mail: jane@example.com", &options);
        assert_eq!(out, "mail: <hidden>");
    }
}
