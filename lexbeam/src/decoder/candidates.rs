//! Candidate pool for the next frame.

use super::beam::Hypothesis;
use crate::math::log_add;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

/// Identity under which candidates of one frame are merged.
#[derive(PartialEq, Eq, Hash)]
struct MergeKey<K> {
    key: K,
    token: usize,
    prev_blank: bool,
}

/// Candidates generated while expanding one frame.
#[derive(Debug)]
pub(crate) struct Candidates<K> {
    hyps: Vec<Hypothesis<K>>,
    best: f64,
}

impl<K> Default for Candidates<K> {
    fn default() -> Self {
        Self {
            hyps: Vec::new(),
            best: f64::NEG_INFINITY,
        }
    }
}

impl<K: Clone + Eq + Hash> Candidates<K> {
    pub fn reset(&mut self) {
        self.hyps.clear();
        self.best = f64::NEG_INFINITY;
    }

    /// Admit `hyp` if it is within `threshold` of the best score seen so far.
    pub fn add(&mut self, hyp: Hypothesis<K>, threshold: f64) {
        if hyp.score > self.best {
            self.best = hyp.score;
        }
        if hyp.score >= self.best - threshold {
            self.hyps.push(hyp);
        }
    }

    /// Prune against the final best score, merge equal states and keep the
    /// `beam_size` best, best first.
    ///
    /// A merged entry keeps the fields of its highest-scoring member (the
    /// earliest one on ties). Its score is the max, or the log-sum-exp of all
    /// members with `log_add`.
    pub fn store(&mut self, beam_size: usize, threshold: f64, log_add_scores: bool) -> Vec<Hypothesis<K>> {
        let floor = self.best - threshold;
        let mut slots: HashMap<MergeKey<K>, usize> = HashMap::with_capacity(self.hyps.len());
        let mut merged: Vec<Hypothesis<K>> = Vec::with_capacity(self.hyps.len());

        for hyp in self.hyps.drain(..) {
            if hyp.score < floor {
                continue;
            }

            let key = MergeKey {
                key: hyp.key.clone(),
                token: hyp.token,
                prev_blank: hyp.prev_blank,
            };

            match slots.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(merged.len());
                    merged.push(hyp);
                }
                Entry::Occupied(entry) => {
                    let slot = &mut merged[*entry.get()];
                    let score = if log_add_scores {
                        log_add(slot.score, hyp.score)
                    } else {
                        slot.score.max(hyp.score)
                    };
                    if hyp.score > slot.score {
                        *slot = hyp;
                    }
                    slot.score = score;
                }
            }
        }

        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(beam_size);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: u8, token: usize, score: f64, parent: usize) -> Hypothesis<u8> {
        Hypothesis::initial(key, 0)
            .extend(parent, key, token)
            .with_scores(score, score, 0.0)
    }

    #[test]
    fn admission_tracks_running_best() {
        let mut pool = Candidates::default();
        pool.add(candidate(0, 0, -20.0, 0), 5.0);
        pool.add(candidate(1, 0, -1.0, 0), 5.0);
        pool.add(candidate(2, 0, -10.0, 0), 5.0);

        // -20 was admitted before -1 raised the bar, and is pruned on store.
        assert_eq!(pool.hyps.len(), 2);
        let beam = pool.store(10, 5.0, false);
        assert_eq!(beam.len(), 1);
        assert_eq!(beam[0].key, 1);
    }

    #[test]
    fn merges_equal_states_keeping_best_parent() {
        let mut pool = Candidates::default();
        pool.add(candidate(0, 1, -2.0, 0), 100.0);
        pool.add(candidate(0, 1, -1.0, 1), 100.0);
        pool.add(candidate(0, 2, -1.5, 2), 100.0);

        let beam = pool.store(10, 100.0, false);
        assert_eq!(beam.len(), 2);
        assert_eq!(beam[0].score, -1.0);
        assert_eq!(beam[0].parent, Some(1));
        assert_eq!(beam[1].token, 2);
    }

    #[test]
    fn log_add_merging_sums_probabilities() {
        let mut pool = Candidates::default();
        pool.add(candidate(3, 1, 0.5f64.ln(), 0), 100.0);
        pool.add(candidate(3, 1, 0.25f64.ln(), 1), 100.0);

        let beam = pool.store(10, 100.0, true);
        assert_eq!(beam.len(), 1);
        assert!((beam[0].score - 0.75f64.ln()).abs() < 1e-12);
        assert_eq!(beam[0].parent, Some(0));
    }

    #[test]
    fn ties_keep_generation_order() {
        let mut pool = Candidates::default();
        for key in 0..4 {
            pool.add(candidate(key, 0, -1.0, key as usize), 10.0);
        }

        let beam = pool.store(3, 10.0, false);
        let keys: Vec<u8> = beam.iter().map(|h| h.key).collect();
        assert_eq!(keys, [0, 1, 2]);
    }

    #[test]
    fn blank_flag_separates_states() {
        let mut pool = Candidates::default();
        pool.add(candidate(0, 4, -1.0, 0), 10.0);
        pool.add(candidate(0, 4, -1.0, 1).with_blank(), 10.0);

        assert_eq!(pool.store(10, 10.0, false).len(), 2);
    }
}
