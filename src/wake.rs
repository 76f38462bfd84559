//! Wake-word detection on transcribed text.
//!
//! Decides whether an utterance addresses the assistant and, if so, strips
//! the keyword and returns the residual command. Exact substring matching is
//! tried first; when it fails, every token of the utterance is scored against
//! the keyword with a normalized edit-distance similarity (0–100) so that
//! mis-transcriptions like "stewart" still trigger at the configured
//! confidence threshold.
//!
//! Operates purely on already-transcribed text and never blocks.

/// Text-based wake-word detector.
///
/// Holds only configuration; no state is carried across utterances.
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    keyword: String,
    confidence: u8,
}

impl WakeWordDetector {
    /// Create a detector for `keyword` with a fuzzy confidence threshold
    /// (0–100). The keyword is matched case-insensitively.
    #[must_use]
    pub fn new(keyword: &str, confidence: u8) -> Self {
        Self {
            keyword: keyword.trim().to_lowercase(),
            confidence: confidence.min(100),
        }
    }

    /// The configured keyword, lowercased.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Check an utterance for the wake word and extract the command.
    ///
    /// Returns `None` when the utterance does not address the assistant.
    /// Returns `Some("")` when the keyword was spoken on its own — an
    /// explicit invitation for the user to state what they want, which the
    /// caller answers with a clarification prompt instead of routing.
    #[must_use]
    pub fn detect(&self, utterance: &str) -> Option<String> {
        if self.keyword.is_empty() {
            return None;
        }

        let lower = utterance.to_lowercase();

        // Exact path: keyword appears verbatim somewhere in the utterance.
        if lower.contains(&self.keyword) {
            return Some(self.strip_keyword(&lower));
        }

        // Fuzzy path: score every token, take the best one.
        let mut best: Option<(&str, u8)> = None;
        for token in lower.split_whitespace() {
            let score = similarity(&self.keyword, token);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((token, score));
            }
        }

        let (token, score) = best?;
        if score < self.confidence {
            return None;
        }

        // Replace the first occurrence of the matched token with the
        // canonical keyword, then re-run residual extraction.
        let fixed = replace_first_token(&lower, token, &self.keyword);
        Some(self.strip_keyword(&fixed))
    }

    /// Remove the first keyword occurrence and clean up the residual.
    fn strip_keyword(&self, lower: &str) -> String {
        let residual = lower.replacen(&self.keyword, "", 1);
        residual
            .trim()
            .trim_start_matches([',', '.', ':', ';', '!', '?'])
            .trim()
            .to_owned()
    }
}

/// Rebuild `text` with the first whitespace-delimited occurrence of
/// `target` replaced by `replacement`.
fn replace_first_token(text: &str, target: &str, replacement: &str) -> String {
    let mut replaced = false;
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|token| {
            if !replaced && token == target {
                replaced = true;
                replacement
            } else {
                token
            }
        })
        .collect();
    tokens.join(" ")
}

/// Normalized edit-distance similarity between two strings (0–100).
///
/// `100 * (len_a + len_b - distance) / (len_a + len_b)`, rounded. Identical
/// strings score 100, fully dissimilar strings approach 0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100;
    }
    let dist = levenshtein(a, b).min(total);
    ((total - dist) as f32 / total as f32 * 100.0).round() as u8
}

/// Levenshtein distance over characters, two-row dynamic programming.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
