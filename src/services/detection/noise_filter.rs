// Heuristic noise filter for detected text
//
// Rejects fragments that look like counters, IDs, codes or coordinates rather
// than translatable UI text. Rules are evaluated in order; the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static WORD_LIKE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());
static DIGIT_LETTER_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+[A-Za-z]+|[A-Za-z]+\d+").unwrap());
static PUNCTUATION_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\w\s]+$").unwrap());

/// A single rejection predicate over trimmed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseRule {
    /// Empty or whitespace-only
    Blank,
    /// Only digits: `42`, `1080`
    DigitsOnly,
    /// A single ASCII alphanumeric token: `ABC123`, `HP`
    WordLikeToken,
    /// Alphanumeric runs joined by one kind of separator: `abc:123`, `10:30`, `A-B-C`
    SeparatedCode,
    /// A digit run touching a letter run anywhere: `item9`, `x12 y40`, `2nd`
    DigitLetterRun,
    /// Only punctuation or symbols: `...`, `>>`, `★`
    PunctuationOnly,
}

impl NoiseRule {
    /// Default evaluation order
    pub const ALL: [NoiseRule; 6] = [
        NoiseRule::Blank,
        NoiseRule::DigitsOnly,
        NoiseRule::WordLikeToken,
        NoiseRule::SeparatedCode,
        NoiseRule::DigitLetterRun,
        NoiseRule::PunctuationOnly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NoiseRule::Blank => "blank",
            NoiseRule::DigitsOnly => "digits_only",
            NoiseRule::WordLikeToken => "word_like_token",
            NoiseRule::SeparatedCode => "separated_code",
            NoiseRule::DigitLetterRun => "digit_letter_run",
            NoiseRule::PunctuationOnly => "punctuation_only",
        }
    }

    /// Whether this rule rejects `text`. Callers pass text already trimmed.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            NoiseRule::Blank => text.is_empty(),
            NoiseRule::DigitsOnly => DIGITS_ONLY.is_match(text),
            NoiseRule::WordLikeToken => WORD_LIKE_TOKEN.is_match(text),
            NoiseRule::SeparatedCode => is_separated_code(text),
            NoiseRule::DigitLetterRun => DIGIT_LETTER_RUN.is_match(text),
            NoiseRule::PunctuationOnly => PUNCTUATION_ONLY.is_match(text),
        }
    }
}

/// `abc:123`-style tokens: no whitespace, ASCII alphanumeric runs at both ends,
/// and every separator between them is the same character.
fn is_separated_code(text: &str) -> bool {
    let mut separator: Option<char> = None;
    let mut saw_separator = false;
    let mut last_was_alnum = false;

    for (i, c) in text.chars().enumerate() {
        if c.is_ascii_alphanumeric() {
            last_was_alnum = true;
        } else if is_separator(c) {
            // Must sit between alphanumeric runs
            if i == 0 {
                return false;
            }
            match separator {
                Some(existing) if existing != c => return false,
                _ => separator = Some(c),
            }
            saw_separator = true;
            last_was_alnum = false;
        } else {
            // Whitespace, underscore or non-ASCII letters make it something else
            return false;
        }
    }

    saw_separator && last_was_alnum
}

/// Mirrors `[^\w\s]`
fn is_separator(c: char) -> bool {
    !c.is_alphanumeric() && c != '_' && !c.is_whitespace()
}

/// Ordered list of noise rules
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    rules: Vec<NoiseRule>,
}

impl NoiseFilter {
    /// Filter with a custom rule order. An empty list accepts everything.
    pub fn with_rules(rules: Vec<NoiseRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[NoiseRule] {
        &self.rules
    }

    /// First rule that rejects `text`, or `None` if the text should be kept
    pub fn rejection(&self, text: &str) -> Option<NoiseRule> {
        let normalized = text.trim();
        self.rules.iter().copied().find(|rule| rule.matches(normalized))
    }

    pub fn is_noise(&self, text: &str) -> bool {
        self.rejection(text).is_some()
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::with_rules(NoiseRule::ALL.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_codes_and_counters() {
        let filter = NoiseFilter::default();
        for text in ["42", "ABC123", "abc:123", "item9"] {
            assert!(filter.is_noise(text), "expected {:?} to be rejected", text);
        }
    }

    #[test]
    fn test_keeps_sentence_like_text() {
        let filter = NoiseFilter::default();
        for text in ["Press Start", "Game Over!", "Continue?", "Save and quit", "¿Dónde está?"] {
            assert!(!filter.is_noise(text), "expected {:?} to be kept", text);
        }
    }

    #[test]
    fn test_first_matching_rule_is_reported() {
        let filter = NoiseFilter::default();
        // Also matches WordLikeToken, but DigitsOnly comes first
        assert_eq!(filter.rejection("42"), Some(NoiseRule::DigitsOnly));
        assert_eq!(filter.rejection("ABC123"), Some(NoiseRule::WordLikeToken));
        assert_eq!(filter.rejection("abc:123"), Some(NoiseRule::SeparatedCode));
        assert_eq!(filter.rejection("Lv 5 x12"), Some(NoiseRule::DigitLetterRun));
        assert_eq!(filter.rejection("..."), Some(NoiseRule::PunctuationOnly));
        assert_eq!(filter.rejection("   "), Some(NoiseRule::Blank));
    }

    #[test]
    fn test_text_is_trimmed_before_matching() {
        let filter = NoiseFilter::default();
        assert_eq!(filter.rejection("  1080 "), Some(NoiseRule::DigitsOnly));
    }

    #[test]
    fn test_digits_only() {
        assert!(NoiseRule::DigitsOnly.matches("0"));
        assert!(NoiseRule::DigitsOnly.matches("0123456789"));
        assert!(!NoiseRule::DigitsOnly.matches("12a"));
        assert!(!NoiseRule::DigitsOnly.matches("1 2"));
        assert!(!NoiseRule::DigitsOnly.matches(""));
    }

    #[test]
    fn test_word_like_token() {
        assert!(NoiseRule::WordLikeToken.matches("HP"));
        assert!(NoiseRule::WordLikeToken.matches("x64"));
        assert!(!NoiseRule::WordLikeToken.matches("New Game"));
        assert!(!NoiseRule::WordLikeToken.matches("OK!"));
    }

    #[test]
    fn test_separated_code() {
        assert!(NoiseRule::SeparatedCode.matches("abc:123"));
        assert!(NoiseRule::SeparatedCode.matches("10:30"));
        assert!(NoiseRule::SeparatedCode.matches("A-B-C"));
        assert!(NoiseRule::SeparatedCode.matches("1.2.3"));
        assert!(NoiseRule::SeparatedCode.matches("x::y"));

        // Two different separators
        assert!(!NoiseRule::SeparatedCode.matches("a:b-c"));
        // Separator not enclosed by alphanumerics
        assert!(!NoiseRule::SeparatedCode.matches(":abc"));
        assert!(!NoiseRule::SeparatedCode.matches("Wait..."));
        // Whitespace means a phrase, not a code
        assert!(!NoiseRule::SeparatedCode.matches("Yes, sir"));
        assert!(!NoiseRule::SeparatedCode.matches("abc123"));
    }

    #[test]
    fn test_digit_letter_run() {
        assert!(NoiseRule::DigitLetterRun.matches("item9"));
        assert!(NoiseRule::DigitLetterRun.matches("9mm"));
        assert!(NoiseRule::DigitLetterRun.matches("Stage 2nd"));
        assert!(!NoiseRule::DigitLetterRun.matches("Level 5"));
        assert!(!NoiseRule::DigitLetterRun.matches("Score"));
    }

    #[test]
    fn test_punctuation_only() {
        assert!(NoiseRule::PunctuationOnly.matches("..."));
        assert!(NoiseRule::PunctuationOnly.matches(">>"));
        assert!(NoiseRule::PunctuationOnly.matches("★"));
        assert!(!NoiseRule::PunctuationOnly.matches("... ..."));
        assert!(!NoiseRule::PunctuationOnly.matches("_"));
        assert!(!NoiseRule::PunctuationOnly.matches("Hi!"));
    }

    #[test]
    fn test_custom_rule_order() {
        let filter = NoiseFilter::with_rules(vec![NoiseRule::WordLikeToken, NoiseRule::DigitsOnly]);
        assert_eq!(filter.rejection("42"), Some(NoiseRule::WordLikeToken));

        let permissive = NoiseFilter::with_rules(Vec::new());
        assert!(!permissive.is_noise("42"));
        assert!(permissive.rules().is_empty());
    }
}
