//! Literal text search over reconstructed page text.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Search parameters, as supplied by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub search: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
}

impl SearchOptions {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            case_sensitive: false,
            whole_word: false,
        }
    }
}

/// A compiled literal search. `None` from [`Matcher::new`] means the search
/// term was empty or whitespace-only — zero matches, not an error.
#[derive(Debug)]
pub struct Matcher {
    re: Regex,
}

impl Matcher {
    pub fn new(options: &SearchOptions) -> Option<Self> {
        let term = if options.whole_word {
            options.search.trim()
        } else {
            options.search.as_str()
        };
        if term.trim().is_empty() {
            return None;
        }

        let mut pattern = regex::escape(term);
        if options.whole_word {
            pattern = format!(r"\b{pattern}\b");
        }
        RegexBuilder::new(&pattern)
            .case_insensitive(!options.case_sensitive)
            .build()
            .ok()
            .map(|re| Self { re })
    }

    /// All non-overlapping occurrences, leftmost-first, as byte-offset
    /// spans into `text`. Zero-length matches are discarded.
    pub fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        self.re
            .find_iter(text)
            .filter(|m| m.end() > m.start())
            .map(|m| (m.start(), m.end()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(search: &str, case_sensitive: bool, whole_word: bool) -> SearchOptions {
        SearchOptions {
            search: search.to_string(),
            case_sensitive,
            whole_word,
        }
    }

    #[test]
    fn whole_word_case_insensitive_single_match() {
        let m = Matcher::new(&opts("world", false, true)).unwrap();
        let spans = m.spans("Hello World");
        assert_eq!(spans, vec![(6, 11)]);
    }

    #[test]
    fn empty_or_whitespace_search_yields_no_matcher() {
        assert!(Matcher::new(&opts("", false, false)).is_none());
        assert!(Matcher::new(&opts("   ", false, true)).is_none());
        assert!(Matcher::new(&opts("  \t ", false, false)).is_none());
    }

    #[test]
    fn case_sensitive_respects_case() {
        let m = Matcher::new(&opts("world", true, false)).unwrap();
        assert!(m.spans("Hello World").is_empty());
        let m = Matcher::new(&opts("World", true, false)).unwrap();
        assert_eq!(m.spans("Hello World").len(), 1);
    }

    #[test]
    fn whole_word_rejects_substrings() {
        let m = Matcher::new(&opts("cat", false, true)).unwrap();
        assert!(m.spans("concatenate").is_empty());
        assert_eq!(m.spans("the cat sat").len(), 1);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = Matcher::new(&opts("a.b(c)", false, false)).unwrap();
        assert_eq!(m.spans("x a.b(c) y").len(), 1);
        assert!(m.spans("aXb(c)").is_empty());
    }

    #[test]
    fn all_non_overlapping_occurrences() {
        let m = Matcher::new(&opts("aa", false, false)).unwrap();
        // Leftmost-first, non-overlapping: "aaaa" → two matches.
        assert_eq!(m.spans("aaaa"), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn whole_word_trims_search_term() {
        let m = Matcher::new(&opts("  World  ", false, true)).unwrap();
        assert_eq!(m.spans("Hello World").len(), 1);
    }
}
