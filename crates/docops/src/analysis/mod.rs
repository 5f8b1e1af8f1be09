//! Text analysis collaborators used by the word-processing backend.

pub mod keywords;

pub use keywords::{FrequencyKeywordExtractor, KeywordExtractor, ScoredPhrase};
