//! Lexical features used as a stand-in for semantic similarity
//!
//! Tokens are lowercase alphanumeric words longer than three characters that
//! are not stop words. Long texts also contribute adjacent-token bigrams.

use rustc_hash::FxHashSet;

/// Minimum token count before bigrams are added to the feature set
pub const BIGRAM_MIN_TOKENS: usize = 10;

/// Shared features required before any content score is produced
pub const MIN_SHARED_FEATURES: usize = 3;

/// Texts shorter than this (in characters) take an extra penalty
pub const SHORT_TEXT_CHARS: usize = 200;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "been", "before", "being", "below",
    "between", "both", "cannot", "could", "does", "doing", "down", "during", "each", "even",
    "every", "from", "further", "have", "having", "here", "hers", "herself", "himself", "into",
    "itself", "just", "like", "made", "make", "many", "more", "most", "much", "must", "myself",
    "need", "only", "other", "ought", "ours", "ourselves", "over", "same", "should", "some",
    "such", "than", "that", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "under", "until", "upon", "very", "want", "were", "what",
    "when", "where", "which", "while", "will", "with", "within", "without", "would", "your",
    "yours", "yourself", "yourselves",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Lowercase, strip non-alphanumerics, drop stop words and words of three
/// characters or fewer
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3 && !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// Unigrams, plus bigrams when there are at least `BIGRAM_MIN_TOKENS` tokens
pub fn feature_set(text: &str) -> FxHashSet<String> {
    let tokens = tokenize(text);
    let mut features: FxHashSet<String> = tokens.iter().cloned().collect();
    if tokens.len() >= BIGRAM_MIN_TOKENS {
        for pair in tokens.windows(2) {
            features.insert(format!("{} {}", pair[0], pair[1]));
        }
    }
    features
}

/// Words of a short title: lowercase alphanumeric words of two or more
/// characters that are not stop words
pub fn title_tokens(title: &str) -> FxHashSet<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1 && !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|; zero when both sets are empty
pub fn jaccard<T: std::hash::Hash + Eq>(a: &FxHashSet<T>, b: &FxHashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Content similarity between two feature sets with the given text lengths
/// (in characters).
///
/// Squared Jaccard, then a length-ratio penalty: 0.5x when one text is more
/// than three times longer, 0.7x when more than twice, and a further 0.5x
/// when the shorter text is under `SHORT_TEXT_CHARS`.
pub fn content_similarity(
    a: &FxHashSet<String>,
    a_len: usize,
    b: &FxHashSet<String>,
    b_len: usize,
) -> f64 {
    let shared = a.intersection(b).count();
    if shared < MIN_SHARED_FEATURES {
        return 0.0;
    }

    let base = jaccard(a, b).powi(2);

    let shorter = a_len.min(b_len).max(1) as f64;
    let longer = a_len.max(b_len) as f64;
    let ratio = longer / shorter;

    let mut penalty = 1.0;
    if ratio > 3.0 {
        penalty *= 0.5;
    } else if ratio > 2.0 {
        penalty *= 0.7;
    }
    if a_len.min(b_len) < SHORT_TEXT_CHARS {
        penalty *= 0.5;
    }

    base * penalty
}
