//! Category extraction and normalization.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::processor::collaborators::{
    CategoryExtractor, EntityRecognizer, KeyphraseExtractor, ModelError,
};

/// Number of ranked candidates kept before tokenizing.
pub const DEFAULT_TOP_K: usize = 5;

/// Turn ranked category candidates into a set of single-word tags.
///
/// The steps run in this exact order:
///
/// 1. upper-case every candidate and drop repeats, keeping the best rank;
/// 2. truncate to the `top_k` best candidates;
/// 3. split each surviving candidate on whitespace;
/// 4. deduplicate the resulting tokens.
///
/// Splitting after truncation means a multi-word candidate contributes all
/// of its words, so the result can hold more than `top_k` tags.
pub fn normalize_categories(candidates: &[String], top_k: usize) -> BTreeSet<String> {
    let mut seen = HashSet::new();

    candidates
        .iter()
        .map(|candidate| candidate.trim().to_uppercase())
        .filter(|candidate| !candidate.is_empty() && seen.insert(candidate.clone()))
        .take(top_k)
        .flat_map(|candidate| {
            candidate
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Entity mentions unioned with keyphrases.
///
/// Entities are looked up in the post body followed by its context and rank
/// ahead of keyphrases, which are taken from the body alone.
pub struct CombinedCategoryExtractor {
    entities: Arc<dyn EntityRecognizer>,
    keyphrases: Arc<dyn KeyphraseExtractor>,
}

impl CombinedCategoryExtractor {
    pub fn new(
        entities: Arc<dyn EntityRecognizer>,
        keyphrases: Arc<dyn KeyphraseExtractor>,
    ) -> Self {
        Self {
            entities,
            keyphrases,
        }
    }
}

#[async_trait]
impl CategoryExtractor for CombinedCategoryExtractor {
    async fn extract(&self, text: &str, context: &str) -> Result<Vec<String>, ModelError> {
        let combined = format!("{} {}", text, context);
        let (entities, keyphrases) = tokio::join!(
            self.entities.entities(&combined),
            self.keyphrases.keyphrases(text)
        );

        let mut candidates = entities?;
        candidates.extend(keyphrases?);
        Ok(candidates)
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
}

/// Treats runs of capitalized words within a clause as entity mentions.
///
/// A single capitalized stop word ("The", "I") is not an entity.
#[derive(Debug, Default)]
pub struct CapitalizedEntityRecognizer;

#[async_trait]
impl EntityRecognizer for CapitalizedEntityRecognizer {
    async fn entities(&self, text: &str) -> Result<Vec<String>, ModelError> {
        let mut entities = Vec::new();
        let mut run: Vec<&str> = Vec::new();

        let mut flush = |run: &mut Vec<&str>| {
            if !(run.len() == 1 && is_stop_word(run[0])) && !run.is_empty() {
                entities.push(run.join(" "));
            }
            run.clear();
        };

        for clause in text.split(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':' | '\n')) {
            for word in words(clause) {
                if word.chars().next().is_some_and(char::is_uppercase) {
                    run.push(word);
                } else {
                    flush(&mut run);
                }
            }
            flush(&mut run);
        }

        Ok(entities)
    }
}

/// Scores 1- and 2-word phrases of non-stop words by frequency.
#[derive(Debug)]
pub struct FrequencyKeyphraseExtractor {
    top_n: usize,
}

impl FrequencyKeyphraseExtractor {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

impl Default for FrequencyKeyphraseExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

#[async_trait]
impl KeyphraseExtractor for FrequencyKeyphraseExtractor {
    async fn keyphrases(&self, text: &str) -> Result<Vec<String>, ModelError> {
        let tokens: Vec<Option<String>> = words(text)
            .map(|w| (!is_stop_word(w)).then(|| w.to_lowercase()))
            .collect();

        // phrase -> (score, first position)
        let mut scores: HashMap<String, (usize, usize)> = HashMap::new();
        let mut add = |phrase: String, weight: usize, position: usize| {
            let entry = scores.entry(phrase).or_insert((0, position));
            entry.0 += weight;
        };

        for (i, token) in tokens.iter().enumerate() {
            let Some(word) = token else { continue };
            add(word.clone(), 1, i);
            if let Some(Some(next)) = tokens.get(i + 1) {
                // bigrams weigh double
                add(format!("{} {}", word, next), 2, i);
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = scores.into_iter().collect();
        ranked.sort_by(|(_, (score_a, pos_a)), (_, (score_b, pos_b))| {
            score_b.cmp(score_a).then(pos_a.cmp(pos_b))
        });

        Ok(ranked
            .into_iter()
            .take(self.top_n)
            .map(|(phrase, _)| phrase)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_truncates_before_splitting() {
        let candidates = strings(&["new york", "a", "b", "c", "d", "e"]);

        let categories = normalize_categories(&candidates, 5);

        // Splitting first would have cut "D" instead of "E"
        assert_eq!(categories, set(&["NEW", "YORK", "A", "B", "C", "D"]));
    }

    #[test]
    fn test_normalize_dedupes_case_insensitively_before_truncating() {
        let candidates = strings(&["Apple", "APPLE", "apple pie", "x", "y", "z", "w"]);

        let categories = normalize_categories(&candidates, 5);

        assert_eq!(categories, set(&["APPLE", "PIE", "X", "Y", "Z"]));
    }

    #[test]
    fn test_normalize_ignores_blank_candidates() {
        let categories = normalize_categories(&strings(&["  ", "", "product"]), 5);
        assert_eq!(categories, set(&["PRODUCT"]));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let candidates = strings(&["Rust Lang", "tokio", "rust"]);
        assert_eq!(
            normalize_categories(&candidates, 5),
            normalize_categories(&candidates, 5)
        );
    }

    #[tokio::test]
    async fn test_capitalized_entities() {
        let recognizer = CapitalizedEntityRecognizer;
        let entities = recognizer
            .entities("I moved from New York to Berlin last May. The weather")
            .await
            .unwrap();

        assert_eq!(entities, strings(&["New York", "Berlin", "May"]));
    }

    #[tokio::test]
    async fn test_frequency_keyphrases_rank_repeated_phrases_first() {
        let extractor = FrequencyKeyphraseExtractor::new(3);
        let phrases = extractor
            .keyphrases("battery life is great, battery life beats my old phone")
            .await
            .unwrap();

        assert_eq!(phrases[0], "battery life");
        assert!(phrases.contains(&"battery".to_string()));
        assert!(!phrases.iter().any(|p| p == "is" || p == "my"));
    }

    #[tokio::test]
    async fn test_combined_extractor_puts_entities_first() {
        let extractor = CombinedCategoryExtractor::new(
            Arc::new(CapitalizedEntityRecognizer),
            Arc::new(FrequencyKeyphraseExtractor::default()),
        );

        let candidates = extractor
            .extract("loving the camera", "Photography")
            .await
            .unwrap();

        assert_eq!(candidates[0], "Photography");
        assert!(candidates.contains(&"camera".to_string()));
    }
}
