//! Per-frame hypothesis storage and backtracking.

use super::DecodeResult;

/// Extra frames walked back past `look_back` to reach a word boundary.
pub(crate) const LOOK_BACK_LIMIT: usize = 100;

/// Beam entry. `K` carries the decoder-specific merge state.
#[derive(Clone, Debug)]
pub(crate) struct Hypothesis<K> {
    pub score: f64,
    pub am_score: f64,
    pub lm_score: f64,
    pub key: K,
    /// Index into the previous frame.
    pub parent: Option<usize>,
    pub token: usize,
    pub word: Option<usize>,
    pub prev_blank: bool,
}

impl<K> Hypothesis<K> {
    pub fn initial(key: K, token: usize) -> Self {
        Self {
            score: 0.0,
            am_score: 0.0,
            lm_score: 0.0,
            key,
            parent: None,
            token,
            word: None,
            prev_blank: false,
        }
    }

    /// Successor of the hypothesis stored at `index`, with its scores carried over.
    pub fn extend(&self, index: usize, key: K, token: usize) -> Self {
        Self {
            score: self.score,
            am_score: self.am_score,
            lm_score: self.lm_score,
            key,
            parent: Some(index),
            token,
            word: None,
            prev_blank: false,
        }
    }

    pub fn with_scores(mut self, score: f64, am_score: f64, lm_score: f64) -> Self {
        self.score = score;
        self.am_score = am_score;
        self.lm_score = lm_score;
        self
    }

    pub fn with_word(mut self, word: usize) -> Self {
        self.word = Some(word);
        self
    }

    pub fn with_blank(mut self) -> Self {
        self.prev_blank = true;
        self
    }
}

/// Frames of hypotheses linked by parent indices.
#[derive(Debug)]
pub(crate) struct HypothesisBuffer<K> {
    frames: Vec<Vec<Hypothesis<K>>>,
}

impl<K> Default for HypothesisBuffer<K> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<K> HypothesisBuffer<K> {
    /// Drop everything and start over from `initial`.
    pub fn reset(&mut self, initial: Vec<Hypothesis<K>>) {
        self.frames.clear();
        self.frames.push(initial);
    }

    pub fn is_started(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn last(&self) -> &[Hypothesis<K>] {
        self.frames.last().map_or(&[], Vec::as_slice)
    }

    pub fn push(&mut self, frame: Vec<Hypothesis<K>>) {
        self.frames.push(frame);
    }

    /// Rebuild the path ending at `frames[frame][index]`.
    fn path(&self, frame: usize, index: usize) -> DecodeResult {
        let end = &self.frames[frame][index];
        let mut words = Vec::with_capacity(frame + 1);
        let mut tokens = Vec::with_capacity(frame + 1);

        let (mut f, mut i) = (frame, index);
        loop {
            let hyp = &self.frames[f][i];
            words.push(hyp.word);
            tokens.push(hyp.token);

            match (hyp.parent, f.checked_sub(1)) {
                (Some(parent), Some(prev)) => (f, i) = (prev, parent),
                _ => break,
            }
        }

        words.reverse();
        tokens.reverse();

        DecodeResult {
            score: end.score,
            am_score: end.am_score,
            lm_score: end.lm_score,
            words,
            tokens,
        }
    }

    /// Paths of every hypothesis in the last frame, best first.
    pub fn all_final(&self) -> Vec<DecodeResult> {
        let Some(last) = self.frames.len().checked_sub(1) else {
            return Vec::new();
        };

        let mut results: Vec<DecodeResult> = (0..self.frames[last].len())
            .map(|i| self.path(last, i))
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }

    /// Index of the first best-scoring hypothesis in the last frame.
    fn best_in_last(&self) -> Option<usize> {
        let frame = self.frames.last()?;
        let mut best: Option<(usize, f64)> = None;

        for (i, hyp) in frame.iter().enumerate() {
            if best.is_none_or(|(_, score)| hyp.score > score) {
                best = Some((i, hyp.score));
            }
        }
        best.map(|(i, _)| i)
    }

    /// A hypothesis ends a stable prefix when its parent completed a word.
    fn is_complete(&self, frame: usize, index: usize, word_boundaries: bool) -> bool {
        let hyp = &self.frames[frame][index];
        match (hyp.parent, frame.checked_sub(1)) {
            (Some(parent), Some(prev)) => {
                !word_boundaries || self.frames[prev][parent].word.is_some()
            }
            _ => true,
        }
    }

    /// Walk back `look_back` frames from the best current hypothesis, then on
    /// to a complete hypothesis, at most [`LOOK_BACK_LIMIT`] frames further.
    ///
    /// Returns `(frame, index)` of the ancestor, or `None` when fewer than
    /// `look_back` frames are buffered.
    fn best_ancestor(&self, look_back: usize, word_boundaries: bool) -> Option<(usize, usize)> {
        let mut index = self.best_in_last()?;
        let mut frame = self.frames.len() - 1;

        for _ in 0..look_back {
            index = self.frames[frame][index].parent?;
            frame = frame.checked_sub(1)?;
        }

        for _ in 0..LOOK_BACK_LIMIT {
            if self.is_complete(frame, index, word_boundaries) {
                break;
            }
            match (self.frames[frame][index].parent, frame.checked_sub(1)) {
                (Some(parent), Some(prev)) => (frame, index) = (prev, parent),
                _ => break,
            }
        }

        Some((frame, index))
    }

    /// Best path up to its stable ancestor, see [`Self::best_ancestor`].
    pub fn best_path(&self, look_back: usize, word_boundaries: bool) -> Option<DecodeResult> {
        let (frame, index) = self.best_ancestor(look_back, word_boundaries)?;
        Some(self.path(frame, index))
    }

    /// Drop frames before the best path's stable ancestor, detach the new
    /// first frame and shift the last frame so its best score is 0.
    ///
    /// Returns the number of dropped frames.
    pub fn prune(&mut self, look_back: usize, word_boundaries: bool) -> usize {
        let last = self.frames.len().saturating_sub(1);
        if last <= look_back {
            return 0;
        }

        let start = match self.best_ancestor(look_back, word_boundaries) {
            Some((frame, _)) if frame > 0 => frame,
            _ => return 0,
        };

        self.frames.drain(..start);
        for hyp in &mut self.frames[0] {
            hyp.parent = None;
        }

        if let Some(frame) = self.frames.last_mut() {
            let best = frame
                .iter()
                .map(|h| h.score)
                .fold(f64::NEG_INFINITY, f64::max);
            if best.is_finite() {
                for hyp in frame {
                    hyp.score -= best;
                }
            }
        }

        start
    }
}
