//! Answer and question canonicalization.
//!
//! Every question and every raw annotator answer goes through [`normalize`]
//! before it is indexed or compared. The eight steps run in a fixed order and
//! each one consumes the previous step's output:
//!
//! 1. lowercase
//! 2. number words `zero`..`ten` to digits
//! 3. drop periods with no decimal digit (`\p{Nd}`) on either side
//! 4. drop the articles `a`, `an`, `the`
//! 5. restore apostrophes in common contractions (`dont` -> `don't`)
//! 6. anything but word characters, numbers, whitespace, `'` and `:`
//!    becomes a space
//! 7. `" ,"` collapses to `","`
//! 8. collapse whitespace runs and trim
//!
//! Steps 2 and 5 replace substrings, not words: `"someone"` becomes
//! `"some1"`. Exact-match scoring depends on this, so it is the default.
//! [`ReplacementMode::WordBoundary`] is the stricter variant.
//!
//! Step 6 keeps combining marks (`\p{M}`) because regex `\w` includes them;
//! an `isalnum`-style word class would replace them with a space.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number words and their digit forms, applied in this order.
const NUMBER_WORDS: [(&str, &str); 11] = [
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
];

/// Contractions commonly typed without their apostrophe.
const CONTRACTIONS: [(&str, &str); 7] = [
    ("dont", "don't"),
    ("isnt", "isn't"),
    ("arent", "aren't"),
    ("wont", "won't"),
    ("cant", "can't"),
    ("wouldnt", "wouldn't"),
    ("couldnt", "couldn't"),
];

static ARTICLES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(a|an|the)\b").expect("Invalid article regex"));

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\p{N}\s':]").expect("Invalid punctuation regex"));

static DECIMAL_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Nd}$").expect("Invalid digit regex"));

static SPACE_BEFORE_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+,").expect("Invalid comma regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid space regex"));

static NUMBER_WORD_BOUNDARY: Lazy<Vec<(Regex, &'static str)>> =
    Lazy::new(|| whole_word_patterns(&NUMBER_WORDS));

static CONTRACTION_BOUNDARY: Lazy<Vec<(Regex, &'static str)>> =
    Lazy::new(|| whole_word_patterns(&CONTRACTIONS));

fn whole_word_patterns(table: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    table
        .iter()
        .map(|(word, replacement)| {
            let pattern = format!(r"\b{}\b", regex::escape(word));
            (
                Regex::new(&pattern).expect("Invalid whole-word regex"),
                *replacement,
            )
        })
        .collect()
}

/// How steps 2 and 5 match their words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    /// Unanchored substring replacement (`"someone"` -> `"some1"`)
    #[default]
    Substring,
    /// Only whole words are replaced (`"someone"` stays)
    WordBoundary,
}

impl ReplacementMode {
    /// Parse a mode from its config spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "substring" => Some(Self::Substring),
            "word_boundary" | "word-boundary" | "word" => Some(Self::WordBoundary),
            _ => None,
        }
    }
}

/// Deterministic text canonicalizer.
///
/// Pure and total: it never fails and holds no state besides its mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    mode: ReplacementMode,
}

impl Normalizer {
    /// Create a normalizer with the given replacement mode.
    pub fn new(mode: ReplacementMode) -> Self {
        Self { mode }
    }

    /// The replacement mode used for number words and contractions.
    pub fn mode(&self) -> ReplacementMode {
        self.mode
    }

    /// Run all eight steps over `text`.
    pub fn normalize(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = self.replace_table(&text, &NUMBER_WORDS, &NUMBER_WORD_BOUNDARY);
        let text = strip_lone_periods(&text);
        let text = ARTICLES.replace_all(&text, "");
        let text = self.replace_table(&text, &CONTRACTIONS, &CONTRACTION_BOUNDARY);
        let text = PUNCTUATION.replace_all(&text, " ");
        let text = SPACE_BEFORE_COMMA.replace_all(&text, ",");
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }

    fn replace_table(
        &self,
        text: &str,
        table: &[(&str, &str)],
        boundary: &[(Regex, &'static str)],
    ) -> String {
        match self.mode {
            ReplacementMode::Substring => table
                .iter()
                .fold(text.to_string(), |acc, (word, replacement)| {
                    acc.replace(word, replacement)
                }),
            ReplacementMode::WordBoundary => {
                boundary
                    .iter()
                    .fold(text.to_string(), |acc, (pattern, replacement)| {
                        pattern.replace_all(&acc, *replacement).into_owned()
                    })
            }
        }
    }
}

/// Normalize with the default substring-compatible behavior.
pub fn normalize(text: &str) -> String {
    Normalizer::default().normalize(text)
}

/// Remove every `.` that has no decimal digit immediately before or after it.
///
/// Neighbors are taken from the input, so in `"a..b"` both periods go.
fn strip_lone_periods(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let is_digit_at = |i: Option<usize>| {
        i.and_then(|i| chars.get(i))
            .is_some_and(|c| DECIMAL_DIGIT.is_match(c.encode_utf8(&mut [0; 4])))
    };

    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c != '.' || is_digit_at(i.checked_sub(1)) || is_digit_at(Some(i + 1)))
        .map(|(_, &c)| c)
        .collect()
}
