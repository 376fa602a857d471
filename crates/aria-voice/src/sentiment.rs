//! Lexicon sentiment polarity for turn analytics.
//!
//! Scores user text in [-1, 1] from small positive/negative word lists with
//! single-word negation flips. Recorded with the stored turn; never consulted
//! by the reply path.

const POSITIVE: &[&str] = &[
    "good", "great", "love", "loved", "like", "liked", "awesome", "amazing", "happy", "nice",
    "wonderful", "excellent", "fantastic", "perfect", "thanks", "thank", "helpful", "fun", "glad",
    "cool", "best", "yes",
];

const NEGATIVE: &[&str] = &[
    "bad", "terrible", "hate", "hated", "awful", "horrible", "sad", "angry", "annoying", "worst",
    "broken", "useless", "slow", "wrong", "problem", "problems", "fail", "failed", "no", "never",
    "frustrated", "stupid",
];

const NEGATIONS: &[&str] = &["not", "never", "no", "don't", "dont", "isn't", "isnt", "won't", "wont"];

/// Polarity in [-1, 1]; 0.0 for neutral or empty text.
pub fn polarity(text: &str) -> f32 {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_ascii_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let mut score = 0i32;
    let mut hits = 0i32;
    for (i, word) in words.iter().enumerate() {
        let weight = if POSITIVE.contains(&word.as_str()) {
            1
        } else if NEGATIVE.contains(&word.as_str()) {
            -1
        } else {
            continue;
        };
        let negated = i > 0 && NEGATIONS.contains(&words[i - 1].as_str());
        score += if negated { -weight } else { weight };
        hits += 1;
    }
    if hits == 0 {
        return 0.0;
    }
    (score as f32 / hits as f32).clamp(-1.0, 1.0)
}
