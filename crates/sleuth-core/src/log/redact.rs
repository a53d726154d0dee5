//! Secret redaction for log output.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// The replacement text for redacted secrets.
const REDACTED: &str = "[REDACTED]";

/// Longest body excerpt written to a log line.
const MAX_LOGGED_BODY_CHARS: usize = 512;

/// Patterns that match credentials this client handles.
static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // `"access_token": "..."` in /wallet/auth responses
        r#"(?i)"(access_token|token|refresh_token)"\s*:\s*"[^"]*""#,
        // Bearer credentials copied from request headers
        r"(?i)bearer\s+[a-zA-Z0-9_.=\-]+",
        // Bare JWTs (header.payload.signature)
        r"eyJ[a-zA-Z0-9_\-]{8,}\.eyJ[a-zA-Z0-9_\-]{8,}\.[a-zA-Z0-9_\-]+",
        // key=value forms
        r#"(?i)(access[_-]?token|auth[_-]?token|secret|password)\s*=\s*[^\s&'"]{8,}"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("invalid secret pattern"))
    .collect()
});

/// Filters credentials out of strings before they are logged.
///
/// # Example
///
/// ```
/// use sleuth_core::log::SecretRedactor;
///
/// let redactor = SecretRedactor::new();
/// let body = r#"{"access_token": "abc.def.ghi", "wallet_address": "0xabc"}"#;
/// let output = redactor.redact(body);
/// assert!(output.contains("[REDACTED]"));
/// assert!(output.contains("0xabc"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecretRedactor {
    custom_patterns: Vec<Regex>,
}

impl SecretRedactor {
    /// Create a redactor with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.custom_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Replace every matched secret with `[REDACTED]`.
    #[must_use]
    pub fn redact<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(input);

        for pattern in SECRET_PATTERNS.iter().chain(&self.custom_patterns) {
            if pattern.is_match(&result) {
                result = Cow::Owned(pattern.replace_all(&result, REDACTED).into_owned());
            }
        }

        result
    }
}

/// Redact secrets from a string using the default redactor.
#[must_use]
pub fn redact(input: &str) -> Cow<'_, str> {
    SecretRedactor::new().redact(input)
}

/// Redact and cap a response body for a log line.
#[must_use]
pub fn truncate_for_log(body: &str) -> String {
    let redacted = redact(body);
    if redacted.chars().count() <= MAX_LOGGED_BODY_CHARS {
        return redacted.into_owned();
    }
    let mut excerpt: String = redacted.chars().take(MAX_LOGGED_BODY_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}
