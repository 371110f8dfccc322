//! Decoded hypotheses.

use serde::Serialize;

/// One decoded path, aligned frame by frame.
///
/// `words` and `tokens` have one entry per buffered frame: the initial state,
/// each decoded frame, then the final state once decoding has ended.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodeResult {
    /// Total score
    pub score: f64,
    /// Acoustic part of the score
    pub am_score: f64,
    /// Unweighted language model part of the score
    pub lm_score: f64,
    /// Word completed at each frame
    pub words: Vec<Option<usize>>,
    /// Token emitted at each frame
    pub tokens: Vec<usize>,
}

impl DecodeResult {
    /// Completed words in order.
    pub fn word_sequence(&self) -> Vec<usize> {
        self.words.iter().flatten().copied().collect()
    }

    /// Tokens with repeats collapsed, then `blank` removed.
    pub fn reduced_tokens(&self, blank: Option<usize>) -> Vec<usize> {
        let mut reduced: Vec<usize> = Vec::with_capacity(self.tokens.len());

        for &token in &self.tokens {
            if reduced.last() != Some(&token) {
                reduced.push(token);
            }
        }

        if let Some(blank) = blank {
            reduced.retain(|&t| t != blank);
        }
        reduced
    }
}
