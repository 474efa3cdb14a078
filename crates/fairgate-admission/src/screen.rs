//! Prompt-injection screening.

use regex::RegexSetBuilder;

/// The fixed catalogue of injection indicators. Matched case-insensitively
/// against the raw query before any other admission work happens.
const INJECTION_PATTERNS: &[&str] = &[
    r"ignore (the |all )?(previous|above) instructions",
    r"disregard",
    r"override",
    r"bypass",
    r"forget (the )?(system prompt|previous instructions|everything)",
    r"you are now",
    r"act as",
    r"developer mode",
    r"execute this command",
];

/// Screens query text against the injection catalogue.
pub struct InjectionScreen {
    set: regex::RegexSet,
}

impl InjectionScreen {
    pub fn new() -> Self {
        let set = RegexSetBuilder::new(INJECTION_PATTERNS)
            .case_insensitive(true)
            .build()
            .expect("injection catalogue patterns are valid");
        Self { set }
    }

    /// Returns the first matching catalogue pattern, if any.
    pub fn matched(&self, text: &str) -> Option<&'static str> {
        self.set
            .matches(text)
            .iter()
            .next()
            .map(|index| INJECTION_PATTERNS[index])
    }
}

impl Default for InjectionScreen {
    fn default() -> Self {
        Self::new()
    }
}
