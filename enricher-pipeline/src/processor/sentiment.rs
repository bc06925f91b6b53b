//! Word-list sentiment classifier.

use async_trait::async_trait;

use crate::processor::collaborators::{ModelError, SentimentClassifier};

pub const POSITIVE: &str = "positive";
pub const NEGATIVE: &str = "negative";
pub const NEUTRAL: &str = "neutral";

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "best", "better", "brilliant", "excellent", "fantastic", "fast", "fine",
    "fun", "glad", "good", "great", "happy", "helpful", "like", "love", "loved", "loving", "nice",
    "perfect", "pleased", "recommend", "reliable", "solid", "superb", "thanks", "useful",
    "wonderful", "works",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoying", "awful", "bad", "boring", "broken", "bug", "buggy", "crash", "crashes",
    "disappointed", "disappointing", "fail", "failed", "hate", "hated", "horrible", "issue",
    "poor", "problem", "refund", "sad", "scam", "slow", "terrible", "ugly", "unusable", "useless",
    "worse", "worst",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "wasn't", "can't", "won't",
];

/// Counts positive and negative words, flipping the word after a negation.
///
/// Returns [`NEUTRAL`] on a tie.
#[derive(Debug)]
pub struct LexiconSentimentClassifier {
    labels: Vec<String>,
}

impl LexiconSentimentClassifier {
    pub fn new() -> Self {
        Self {
            labels: vec![POSITIVE.to_string(), NEGATIVE.to_string(), NEUTRAL.to_string()],
        }
    }

    fn score(text: &str) -> i64 {
        let mut score = 0;
        let mut negate = false;

        for word in text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let polarity = if POSITIVE_WORDS.contains(&word.as_str()) {
                1
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                -1
            } else {
                0
            };

            score += if negate { -polarity } else { polarity };
            negate = NEGATIONS.contains(&word.as_str());
        }

        score
    }
}

impl Default for LexiconSentimentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentClassifier for LexiconSentimentClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    async fn classify(&self, text: &str) -> Result<String, ModelError> {
        let label = match Self::score(text) {
            s if s > 0 => POSITIVE,
            s if s < 0 => NEGATIVE,
            _ => NEUTRAL,
        };
        Ok(label.to_string())
    }
}
