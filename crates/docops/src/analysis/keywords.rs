//! Keyword extraction for the bolding transforms.
//!
//! The built-in extractor splits text into candidate phrases at stop words
//! and punctuation, then ranks phrases by the degree/frequency ratio of
//! their words. Japanese text has no spaces, so runs of kanji and katakana
//! are merged into single words and hiragana acts as a delimiter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPhrase {
    pub phrase: String,
    pub score: f64,
}

pub trait KeywordExtractor: Send + Sync {
    /// Returns at most `top_n` phrases, best first.
    fn extract(&self, text: &str, lang: &str, top_n: usize) -> Vec<ScoredPhrase>;
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "every", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours",
];

const JAPANESE_STOPWORDS: &[&str] = &[
    "事", "物", "為", "時", "方", "様", "等", "場合", "以上", "以下", "今回", "前", "後", "中",
    "上", "下", "他", "各", "毎", "的", "者", "際", "点", "内", "外",
];

/// Longest candidate phrase, in words.
const DEFAULT_MAX_PHRASE_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Hiragana,
    Ideographic,
    Other,
}

fn char_class(c: char) -> CharClass {
    match c {
        '\u{3040}'..='\u{309F}' => CharClass::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{3005}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}' | '\u{FF66}'..='\u{FF9F}' => CharClass::Ideographic,
        _ => CharClass::Other,
    }
}

fn is_ideographic(segment: &str) -> bool {
    segment.chars().all(|c| char_class(c) == CharClass::Ideographic)
}

/// A word or a break between candidate phrases.
#[derive(Debug, Clone, PartialEq)]
enum Piece<'a> {
    Word(&'a str),
    Space,
    Break,
}

/// Splits text into words, inline spaces and phrase breaks. Adjacent
/// ideographic segments are merged into one word.
fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut ideo_start: Option<usize> = None;
    let mut ideo_end = 0;

    for (index, segment) in text.split_word_bound_indices() {
        if is_ideographic(segment) {
            if ideo_start.is_none() {
                ideo_start = Some(index);
            }
            ideo_end = index + segment.len();
            continue;
        }
        flush_ideographic(text, &mut out, &mut ideo_start, ideo_end);

        if segment.chars().all(|c| c == ' ' || c == '\t' || c == '\u{3000}') {
            out.push(Piece::Space);
        } else if segment.chars().any(|c| char_class(c) == CharClass::Hiragana)
            || !segment.chars().any(char::is_alphanumeric)
        {
            out.push(Piece::Break);
        } else {
            out.push(Piece::Word(segment));
        }
    }
    flush_ideographic(text, &mut out, &mut ideo_start, ideo_end);
    out
}

fn flush_ideographic<'a>(text: &'a str, out: &mut Vec<Piece<'a>>, start: &mut Option<usize>, end: usize) {
    if let Some(s) = start.take() {
        out.push(Piece::Word(&text[s..end]));
    }
}

pub struct FrequencyKeywordExtractor {
    max_phrase_words: usize,
}

impl FrequencyKeywordExtractor {
    pub fn new() -> Self {
        Self {
            max_phrase_words: DEFAULT_MAX_PHRASE_WORDS,
        }
    }

    pub fn with_max_phrase_words(mut self, max: usize) -> Self {
        self.max_phrase_words = max.max(1);
        self
    }

    fn is_stopword(word: &str, lang: &str) -> bool {
        let lower = word.to_lowercase();
        if word.chars().count() < 2 || lower.chars().all(|c| c.is_numeric()) {
            return true;
        }
        match lang {
            "ja" => {
                JAPANESE_STOPWORDS.contains(&lower.as_str())
                    || ENGLISH_STOPWORDS.contains(&lower.as_str())
            }
            _ => ENGLISH_STOPWORDS.contains(&lower.as_str()),
        }
    }

    /// Candidate phrases as word lists, in document order.
    fn candidates<'a>(&self, text: &'a str, lang: &str) -> Vec<Vec<&'a str>> {
        let mut phrases = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for piece in pieces(text) {
            match piece {
                Piece::Space => {}
                Piece::Break => {
                    if !current.is_empty() {
                        phrases.push(std::mem::take(&mut current));
                    }
                }
                Piece::Word(word) => {
                    if Self::is_stopword(word, lang) {
                        if !current.is_empty() {
                            phrases.push(std::mem::take(&mut current));
                        }
                        continue;
                    }
                    if current.len() == self.max_phrase_words {
                        phrases.push(std::mem::take(&mut current));
                    }
                    current.push(word);
                }
            }
        }
        if !current.is_empty() {
            phrases.push(current);
        }
        phrases
    }
}

impl Default for FrequencyKeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor for FrequencyKeywordExtractor {
    fn extract(&self, text: &str, lang: &str, top_n: usize) -> Vec<ScoredPhrase> {
        if top_n == 0 {
            return Vec::new();
        }
        let candidates = self.candidates(text, lang);

        let mut frequency: HashMap<String, f64> = HashMap::new();
        let mut degree: HashMap<String, f64> = HashMap::new();
        for phrase in &candidates {
            for word in phrase {
                let key = word.to_lowercase();
                *frequency.entry(key.clone()).or_default() += 1.0;
                *degree.entry(key).or_default() += phrase.len() as f64;
            }
        }

        // Phrases separated by a single space in the display form; Japanese
        // words never carry one, so a merged run stays as written.
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut scored: Vec<(ScoredPhrase, usize, usize)> = Vec::new();
        for (position, phrase) in candidates.iter().enumerate() {
            let display = phrase.join(" ");
            let key = display.to_lowercase();
            if let Some(&index) = seen.get(&key) {
                scored[index].2 += 1;
                continue;
            }
            let score = phrase
                .iter()
                .map(|w| {
                    let key = w.to_lowercase();
                    degree.get(&key).copied().unwrap_or(0.0)
                        / frequency.get(&key).copied().unwrap_or(1.0)
                })
                .sum();
            seen.insert(key, scored.len());
            scored.push((ScoredPhrase { phrase: display, score }, position, 1));
        }

        // Repeated phrases rank above one-offs with the same word scores.
        for (phrase, _, count) in &mut scored {
            phrase.score *= 1.0 + (*count as f64).ln();
        }
        scored.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.into_iter().take(top_n).map(|(p, _, _)| p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrases(found: &[ScoredPhrase]) -> Vec<&str> {
        found.iter().map(|p| p.phrase.as_str()).collect()
    }

    #[test]
    fn test_english_candidates_split_at_stopwords() {
        let extractor = FrequencyKeywordExtractor::new();
        let candidates = extractor.candidates("The quick brown fox jumps over the lazy dog.", "en");
        assert_eq!(
            candidates,
            vec![vec!["quick", "brown", "fox"], vec!["jumps"], vec!["lazy", "dog"]]
        );
    }

    #[test]
    fn test_extract_ranks_longer_phrases_higher() {
        let extractor = FrequencyKeywordExtractor::new();
        let found = extractor.extract("Compact document pipeline. It runs a pipeline.", "en", 10);
        assert_eq!(phrases(&found)[0], "Compact document pipeline");
        assert!(found.iter().all(|p| p.score >= 0.0));
    }

    #[test]
    fn test_extract_respects_top_n() {
        let extractor = FrequencyKeywordExtractor::new();
        let text = "alpha beta. gamma delta. epsilon zeta. eta theta.";
        assert_eq!(extractor.extract(text, "en", 2).len(), 2);
        assert!(extractor.extract(text, "en", 0).is_empty());
    }

    #[test]
    fn test_duplicate_phrases_merge_case_insensitively() {
        let extractor = FrequencyKeywordExtractor::new();
        let found = extractor.extract("Rust code. rust code. Final text.", "en", 10);
        assert_eq!(phrases(&found), vec!["Rust code", "Final text"]);
    }

    #[test]
    fn test_japanese_hiragana_delimits_words() {
        let extractor = FrequencyKeywordExtractor::new();
        let candidates = extractor.candidates("文書処理の自動化を行うシステム", "ja");
        assert_eq!(
            candidates,
            vec![vec!["文書処理"], vec!["自動化"], vec!["システム"]]
        );
    }

    #[test]
    fn test_japanese_stopwords_removed() {
        let extractor = FrequencyKeywordExtractor::new();
        let found = extractor.extract("場合によっては文書を変換する", "ja", 10);
        assert_eq!(phrases(&found), vec!["文書", "変換"]);
    }

    #[test]
    fn test_max_phrase_words() {
        let extractor = FrequencyKeywordExtractor::new().with_max_phrase_words(2);
        let candidates = extractor.candidates("one two three four five", "en");
        assert_eq!(candidates, vec![vec!["one", "two"], vec!["three", "four"], vec!["five"]]);
    }
}
