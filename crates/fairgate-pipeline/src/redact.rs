//! PII redaction over context and answers.

use regex::Regex;

/// Pattern catalogue, applied in order. Credit cards run before phone
/// numbers so a 16-digit sequence is not partially consumed as a phone.
const PII_PATTERNS: &[(&str, &str)] = &[
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("credit_card", r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("phone", r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
    ("ip_address", r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
];

struct PiiPattern {
    kind: &'static str,
    replacement: String,
    regex: Regex,
}

/// Redacts personally identifiable information before text crosses the
/// trust boundary, replacing matches with `[REDACTED_<KIND>]`.
pub struct PiiRedactor {
    patterns: Vec<PiiPattern>,
}

impl PiiRedactor {
    pub fn new() -> Self {
        let patterns = PII_PATTERNS
            .iter()
            .map(|(kind, pattern)| PiiPattern {
                kind,
                replacement: format!("[REDACTED_{}]", kind.to_uppercase()),
                regex: Regex::new(pattern).expect("pii catalogue patterns are valid"),
            })
            .collect();
        Self { patterns }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for pattern in &self.patterns {
            let matches = pattern.regex.find_iter(&out).count();
            if matches == 0 {
                continue;
            }
            out = pattern
                .regex
                .replace_all(&out, pattern.replacement.as_str())
                .into_owned();

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "fairgate_pii_redactions_total",
                "pii_type" => pattern.kind
            )
            .increment(matches as u64);

            tracing::debug!(pii_type = pattern.kind, count = matches, "pii redacted");
        }
        out
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}
