//! Beam search constrained to words of a lexicon trie.

use super::beam::{Hypothesis, HypothesisBuffer};
use super::candidates::Candidates;
use super::options::LexiconDecoderOptions;
use super::{
    CriterionType, DecodeResult, acoustic_score, check_blank, check_token, check_transitions,
    top_tokens,
};
use crate::error::{ConfigError, DecodeError, Result};
use crate::traits::{Decoder, LanguageModel};
use crate::trie::{NodeId, Trie};
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Reserved indices used by [`LexiconDecoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialIndices {
    /// Silence token, also the token of the trie root.
    pub silence: usize,
    /// Blank token, required under CTC.
    pub blank: Option<usize>,
    /// Word index emitted for spellings without a label.
    pub unknown_word: usize,
}

/// Merge state of a lexicon hypothesis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LexiconKey<S> {
    lm_state: S,
    node: NodeId,
}

/// Lexicon-constrained beam-search decoder.
///
/// Hypotheses walk the trie while inside a word and pick up the smeared
/// lookahead score; when a word ends, the lookahead is swapped for the real
/// language model score and the hypothesis returns to the root.
///
/// The trie and the language model are shared; each decoder owns its beam,
/// so decode several utterances in parallel with one decoder each.
pub struct LexiconDecoder<L: LanguageModel> {
    options: LexiconDecoderOptions,
    trie: Arc<Trie>,
    lm: Arc<L>,
    special: SpecialIndices,
    transitions: Array2<f32>,
    token_lm: bool,
    tokens: usize,
    buffer: HypothesisBuffer<LexiconKey<L::State>>,
    candidates: Candidates<LexiconKey<L::State>>,
    top: Vec<usize>,
    decoded_frames: usize,
}

impl<L: LanguageModel> LexiconDecoder<L> {
    /// Create a decoder over the trie's token alphabet.
    ///
    /// The trie must be smeared. `transitions` is `(tokens, tokens)` under
    /// ASG and may be empty under CTC.
    pub fn new(
        options: LexiconDecoderOptions,
        trie: Arc<Trie>,
        lm: Arc<L>,
        special: SpecialIndices,
        transitions: Array2<f32>,
    ) -> Result<Self> {
        options.validate()?;

        if trie.smearing().is_none() {
            return Err(ConfigError::TrieNotSmeared.into());
        }

        let tokens = trie.max_children();
        check_token("silence", special.silence, tokens)?;
        check_blank(special.blank, tokens, options.criterion)?;
        check_transitions(&transitions, tokens, options.criterion)?;

        Ok(Self {
            options,
            trie,
            lm,
            special,
            transitions,
            token_lm: false,
            tokens,
            buffer: HypothesisBuffer::default(),
            candidates: Candidates::default(),
            top: Vec::new(),
            decoded_frames: 0,
        })
    }

    /// Score tokens with the language model instead of words.
    ///
    /// The smeared lookahead is then unused and completed words add no extra
    /// language model score.
    pub fn with_token_lm(mut self, token_lm: bool) -> Self {
        self.token_lm = token_lm;
        self
    }

    pub fn options(&self) -> &LexiconDecoderOptions {
        &self.options
    }

    /// Frames decoded since `decode_begin`, pruned ones included.
    pub fn decoded_frames(&self) -> usize {
        self.decoded_frames
    }
}

impl<L: LanguageModel> Decoder for LexiconDecoder<L> {
    fn decode_begin(&mut self) {
        self.candidates.reset();
        self.decoded_frames = 0;

        if self.trie.is_empty() {
            self.buffer.reset(Vec::new());
            tracing::debug!("empty lexicon, nothing to decode");
            return;
        }

        let key = LexiconKey {
            lm_state: self.lm.start(false),
            node: NodeId::ROOT,
        };
        self.buffer
            .reset(vec![Hypothesis::initial(key, self.special.silence)]);
        tracing::debug!(
            beam_size = self.options.beam_size,
            criterion = ?self.options.criterion,
            "decode begin"
        );
    }

    fn decode_step(&mut self, emissions: ArrayView2<'_, f32>) -> Result<()> {
        let (frames, width) = emissions.dim();
        if width != self.tokens {
            return Err(DecodeError::EmissionShape {
                expected: self.tokens,
                got: width,
            }
            .into());
        }
        if !self.buffer.is_started() {
            return Err(DecodeError::NotStarted.into());
        }

        let Self {
            options,
            trie,
            lm,
            special,
            transitions,
            token_lm,
            buffer,
            candidates,
            top,
            decoded_frames,
            ..
        } = self;
        let ctc = options.criterion == CriterionType::Ctc;
        let threshold = options.beam_threshold;

        for (t, frame) in emissions.outer_iter().enumerate() {
            let first_frame = *decoded_frames + t == 0;
            top_tokens(frame, options.beam_size_token, top);
            candidates.reset();

            for (prev_index, prev) in buffer.last().iter().enumerate() {
                let prev_id = prev.key.node;
                let prev_node = trie.node(prev_id);
                let at_root = prev_id == NodeId::ROOT;
                let lex_max = if at_root { 0.0 } else { prev_node.max_score() as f64 };

                // (1) Extend along the trie.
                for &n in top.iter() {
                    let Some(child_id) = prev_node.child(n) else {
                        continue;
                    };
                    let child = trie.node(child_id);

                    let am = acoustic_score(
                        frame,
                        transitions,
                        options.criterion,
                        first_frame,
                        prev.token,
                        n,
                    );
                    let mut score = prev.score + am;
                    if n == special.silence {
                        score += options.sil_score;
                    }

                    let token_scored = token_lm.then(|| lm.score(&prev.key.lm_state, n));

                    if (!ctc || prev.prev_blank || n != prev.token) && child.has_children() {
                        let (lm_state, lm_score) = match &token_scored {
                            Some((state, s)) => (state.clone(), *s as f64),
                            None => (
                                prev.key.lm_state.clone(),
                                child.max_score() as f64 - lex_max,
                            ),
                        };
                        let key = LexiconKey {
                            lm_state,
                            node: child_id,
                        };
                        candidates.add(
                            prev.extend(prev_index, key, n).with_scores(
                                score + options.lm_weight * lm_score,
                                prev.am_score + am,
                                prev.lm_score + lm_score,
                            ),
                            threshold,
                        );
                    }

                    for label in child.labels() {
                        // A one-token word repeated at the root needs a break in between.
                        if at_root && prev.token == n {
                            continue;
                        }

                        let (lm_state, lm_score) = match &token_scored {
                            Some((state, s)) => (state.clone(), *s as f64),
                            None => {
                                let (state, s) = lm.score(&prev.key.lm_state, label.word);
                                (state, s as f64 - lex_max)
                            }
                        };
                        let key = LexiconKey {
                            lm_state,
                            node: NodeId::ROOT,
                        };
                        candidates.add(
                            prev.extend(prev_index, key, n)
                                .with_scores(
                                    score + options.lm_weight * lm_score + options.word_score,
                                    prev.am_score + am,
                                    prev.lm_score + lm_score,
                                )
                                .with_word(label.word),
                            threshold,
                        );
                    }

                    if child.labels().is_empty() && options.unk_score > f64::NEG_INFINITY {
                        let (lm_state, lm_score) = match &token_scored {
                            Some((state, s)) => (state.clone(), *s as f64),
                            None => {
                                let (state, s) =
                                    lm.score(&prev.key.lm_state, special.unknown_word);
                                (state, s as f64 - lex_max)
                            }
                        };
                        let key = LexiconKey {
                            lm_state,
                            node: NodeId::ROOT,
                        };
                        candidates.add(
                            prev.extend(prev_index, key, n)
                                .with_scores(
                                    score + options.lm_weight * lm_score + options.unk_score,
                                    prev.am_score + am,
                                    prev.lm_score + lm_score,
                                )
                                .with_word(special.unknown_word),
                            threshold,
                        );
                    }
                }

                // (2) Stay on the same node.
                if !ctc || !prev.prev_blank || at_root {
                    let n = if at_root { special.silence } else { prev.token };
                    let am = acoustic_score(
                        frame,
                        transitions,
                        options.criterion,
                        first_frame,
                        prev.token,
                        n,
                    );
                    let mut score = prev.score + am;
                    if n == special.silence {
                        score += options.sil_score;
                    }

                    candidates.add(
                        prev.extend(prev_index, prev.key.clone(), n).with_scores(
                            score,
                            prev.am_score + am,
                            prev.lm_score,
                        ),
                        threshold,
                    );
                }

                // (3) Blank.
                if ctc && let Some(blank) = special.blank {
                    let am = frame[blank] as f64;
                    candidates.add(
                        prev.extend(prev_index, prev.key.clone(), blank)
                            .with_scores(prev.score + am, prev.am_score + am, prev.lm_score)
                            .with_blank(),
                        threshold,
                    );
                }
            }

            let next = candidates.store(options.beam_size, threshold, options.log_add);
            tracing::trace!(
                frame = *decoded_frames + t,
                beam = next.len(),
                best = next.first().map(|h| h.score),
                "decode step"
            );
            buffer.push(next);
        }

        *decoded_frames += frames;
        Ok(())
    }

    fn decode_end(&mut self) {
        if !self.buffer.is_started() {
            return;
        }

        self.candidates.reset();
        let last = self.buffer.last();
        let nice_ending = last.iter().any(|h| h.key.node == NodeId::ROOT);

        for (index, prev) in last.iter().enumerate() {
            if nice_ending && prev.key.node != NodeId::ROOT {
                continue;
            }

            let (lm_state, lm_score) = self.lm.finish(&prev.key.lm_state);
            let lm_score = lm_score as f64;
            let key = LexiconKey {
                lm_state,
                node: prev.key.node,
            };
            self.candidates.add(
                prev.extend(index, key, self.special.silence).with_scores(
                    prev.score + self.options.lm_weight * lm_score,
                    prev.am_score,
                    prev.lm_score + lm_score,
                ),
                self.options.beam_threshold,
            );
        }

        let finals = self.candidates.store(
            self.options.beam_size,
            self.options.beam_threshold,
            self.options.log_add,
        );
        tracing::debug!(
            frames = self.decoded_frames,
            hypotheses = finals.len(),
            best = finals.first().map(|h| h.score),
            nice_ending,
            "decode end"
        );
        self.buffer.push(finals);
        self.decoded_frames += 1;
    }

    fn get_all_final_hypothesis(&self) -> Vec<DecodeResult> {
        self.buffer.all_final()
    }

    fn get_best_hypothesis(&self, look_back: usize) -> Option<DecodeResult> {
        self.buffer.best_path(look_back, true)
    }

    fn n_hypothesis(&self) -> usize {
        self.buffer.last().len()
    }

    fn n_decoded_frames_in_buffer(&self) -> usize {
        self.buffer.len()
    }

    fn prune(&mut self, look_back: usize) {
        let dropped = self.buffer.prune(look_back, true);
        if dropped > 0 {
            tracing::trace!(dropped, kept = self.buffer.len(), "beam pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::lm::ZeroLm;
    use crate::trie::SmearingMode;
    use ndarray::array;

    const SIL: usize = 0;

    /// Tokens: 0 = sil, 1 = a, 2 = b, 3 = c.
    /// Words: 0 = "ab", 1 = "c", 2 = "abc".
    fn trie() -> Arc<Trie> {
        let mut trie = Trie::new(4, SIL);
        trie.insert(&[1, 2], 0, 0.0).unwrap();
        trie.insert(&[3], 1, 0.0).unwrap();
        trie.insert(&[1, 2, 3], 2, 0.0).unwrap();
        trie.smear(SmearingMode::Max);
        Arc::new(trie)
    }

    fn options(criterion: CriterionType) -> LexiconDecoderOptions {
        LexiconDecoderOptions {
            beam_size: 10,
            beam_size_token: 4,
            beam_threshold: 100.0,
            lm_weight: 0.0,
            word_score: 0.0,
            unk_score: f64::NEG_INFINITY,
            sil_score: 0.0,
            log_add: false,
            criterion,
        }
    }

    fn special(blank: Option<usize>) -> SpecialIndices {
        SpecialIndices {
            silence: SIL,
            blank,
            unknown_word: 3,
        }
    }

    fn decoder(criterion: CriterionType) -> LexiconDecoder<ZeroLm> {
        let transitions = Array2::zeros((4, 4));
        LexiconDecoder::new(
            options(criterion),
            trie(),
            Arc::new(ZeroLm),
            special(Some(SIL)),
            transitions,
        )
        .unwrap()
    }

    /// Emissions that strongly favour one token per frame.
    fn emissions(path: &[usize]) -> Array2<f32> {
        let mut e = Array2::from_elem((path.len(), 4), -10.0);
        for (t, &token) in path.iter().enumerate() {
            e[[t, token]] = 0.0;
        }
        e
    }

    #[test]
    fn decodes_word_sequence() {
        let mut decoder = decoder(CriterionType::Asg);
        let results = decoder.decode(emissions(&[0, 1, 2, 0, 3, 0]).view()).unwrap();

        let best = &results[0];
        assert_eq!(best.word_sequence(), [0, 1]);
        assert_eq!(best.tokens.len(), 6 + 2);
        assert_eq!(best.score, 0.0);
        assert_eq!(best.tokens, [SIL, 0, 1, 2, 0, 3, 0, SIL]);
    }

    #[test]
    fn prefers_longer_word_when_acoustics_say_so() {
        let mut decoder = decoder(CriterionType::Asg);
        let results = decoder.decode(emissions(&[1, 2, 3]).view()).unwrap();

        // "abc" and "ab" + "c" score the same acoustically; both must be present.
        let sequences: Vec<Vec<usize>> = results.iter().map(|r| r.word_sequence()).collect();
        assert!(sequences.contains(&vec![2]));
        assert!(sequences.contains(&vec![0, 1]));
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn repeated_single_token_word_needs_a_break() {
        let mut decoder = decoder(CriterionType::Asg);
        let results = decoder.decode(emissions(&[3, 3, 3]).view()).unwrap();

        // "c c c" would score 0; a second "c" needs a silence frame in between.
        assert_eq!(results[0].score, -10.0);
        assert!(results.iter().all(|r| r.word_sequence().len() < 3));
    }

    #[test]
    fn ctc_collapses_repeats_and_uses_blank() {
        let transitions = Array2::zeros((0, 0));
        let mut decoder = LexiconDecoder::new(
            options(CriterionType::Ctc),
            trie(),
            Arc::new(ZeroLm),
            special(Some(SIL)),
            transitions,
        )
        .unwrap();

        // a a b c _ c
        let results = decoder
            .decode(emissions(&[1, 1, 2, 3, 0, 3]).view())
            .unwrap();
        let best = &results[0];

        assert_eq!(best.score, 0.0);
        assert!(
            [vec![2, 1], vec![0, 1, 1]].contains(&best.word_sequence()),
            "{:?}",
            best.word_sequence()
        );
    }

    #[test]
    fn unknown_words_need_finite_score() {
        // "a" alone is a prefix without a label.
        let mut decoder = decoder(CriterionType::Asg);
        let results = decoder.decode(emissions(&[1, 0]).view()).unwrap();
        assert!(results.iter().all(|r| !r.word_sequence().contains(&3)));

        let mut opts = options(CriterionType::Asg);
        opts.unk_score = -1.0;
        let mut decoder = LexiconDecoder::new(
            opts,
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .unwrap();
        let results = decoder.decode(emissions(&[1, 0]).view()).unwrap();
        assert_eq!(results[0].word_sequence(), [3]);
        assert_eq!(results[0].score, -1.0);
    }

    #[test]
    fn empty_trie_gives_no_results() {
        let mut trie = Trie::new(4, SIL);
        trie.smear(SmearingMode::Max);

        let mut decoder = LexiconDecoder::new(
            options(CriterionType::Asg),
            Arc::new(trie),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .unwrap();

        let results = decoder.decode(emissions(&[0, 1, 2]).view()).unwrap();
        assert!(results.is_empty());
        assert_eq!(decoder.n_hypothesis(), 0);
    }

    #[test]
    fn rejects_bad_configuration() {
        let mut unsmeared = Trie::new(4, SIL);
        unsmeared.insert(&[1], 0, 0.0).unwrap();
        let err = LexiconDecoder::new(
            options(CriterionType::Asg),
            Arc::new(unsmeared),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .err();
        assert!(matches!(err, Some(Error::Config(ConfigError::TrieNotSmeared))));

        let err = LexiconDecoder::new(
            options(CriterionType::Ctc),
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((0, 0)),
        )
        .err();
        assert!(matches!(err, Some(Error::Config(ConfigError::MissingBlank))));

        let err = LexiconDecoder::new(
            options(CriterionType::Asg),
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((3, 3)),
        )
        .err();
        assert!(matches!(
            err,
            Some(Error::Config(ConfigError::TransitionShape { .. }))
        ));
    }

    #[test]
    fn rejects_mismatched_emissions() {
        let mut decoder = decoder(CriterionType::Asg);
        decoder.decode_begin();

        let err = decoder.decode_step(Array2::zeros((2, 5)).view()).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::EmissionShape {
                expected: 4,
                got: 5
            })
        ));
    }

    #[test]
    fn step_requires_begin() {
        let mut decoder = decoder(CriterionType::Asg);
        let err = decoder.decode_step(emissions(&[0]).view()).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::NotStarted)));
    }

    #[test]
    fn asg_transitions_shift_scores() {
        let mut transitions = Array2::zeros((4, 4));
        transitions[[1, 2]] = -0.5;
        let mut decoder = LexiconDecoder::new(
            options(CriterionType::Asg),
            trie(),
            Arc::new(ZeroLm),
            special(None),
            transitions,
        )
        .unwrap();

        let results = decoder.decode(emissions(&[1, 2]).view()).unwrap();
        assert_eq!(results[0].word_sequence(), [0]);
        assert_eq!(results[0].score, -0.5);
        assert_eq!(results[0].am_score, -0.5);
    }

    #[test]
    fn chunked_decoding_matches_whole() {
        let e = emissions(&[0, 1, 2, 0, 3, 0, 1, 2, 3]);
        let mut whole = decoder(CriterionType::Asg);
        let expected = whole.decode(e.view()).unwrap();

        let mut chunked = decoder(CriterionType::Asg);
        chunked.decode_begin();
        chunked.decode_step(e.slice(ndarray::s![..4, ..])).unwrap();
        chunked.decode_step(e.slice(ndarray::s![4.., ..])).unwrap();
        chunked.decode_end();

        assert_eq!(chunked.get_all_final_hypothesis(), expected);
        assert_eq!(chunked.decoded_frames(), 10);
    }

    #[test]
    fn word_score_rewards_words() {
        let mut opts = options(CriterionType::Asg);
        opts.word_score = 2.0;
        let mut decoder = LexiconDecoder::new(
            opts,
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .unwrap();

        let results = decoder.decode(emissions(&[1, 2, 3]).view()).unwrap();
        assert_eq!(results[0].word_sequence(), [0, 1]);
        assert_eq!(results[0].score, 4.0);
    }

    #[test]
    fn silence_score_applies_per_frame() {
        let mut opts = options(CriterionType::Asg);
        opts.sil_score = -0.25;
        let mut decoder = LexiconDecoder::new(
            opts,
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .unwrap();

        let results = decoder.decode(emissions(&[0, 3, 0]).view()).unwrap();
        assert_eq!(results[0].word_sequence(), [1]);
        assert_eq!(results[0].score, -0.5);
    }

    #[test]
    fn decode_end_prefers_word_boundaries() {
        // a b b: the best path waits inside "ab" on its way to "abc".
        let e = emissions(&[1, 2, 2]);

        let mut wide = decoder(CriterionType::Asg);
        let results = wide.decode(e.view()).unwrap();
        assert_eq!(results[0].score, -10.0);
        assert_eq!(results[0].word_sequence(), [2]);
        assert!(results.iter().all(|r| r.score <= -10.0));

        // With a single survivor inside the word there is no boundary to prefer.
        let mut opts = options(CriterionType::Asg);
        opts.beam_size = 1;
        let mut narrow = LexiconDecoder::new(
            opts,
            trie(),
            Arc::new(ZeroLm),
            special(None),
            Array2::zeros((4, 4)),
        )
        .unwrap();
        let results = narrow.decode(e.view()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
        assert!(results[0].word_sequence().is_empty());
        assert_eq!(results[0].tokens, [SIL, 1, 2, 2, SIL]);
    }

    /// Charges -0.5 for index 1 and -5 for index 3.
    #[derive(Debug)]
    struct Charges;

    impl LanguageModel for Charges {
        type State = Option<usize>;

        fn start(&self, _zero_context: bool) -> Self::State {
            None
        }

        fn score(&self, _state: &Self::State, index: usize) -> (Self::State, f32) {
            let score = match index {
                1 => -0.5,
                3 => -5.0,
                _ => 0.0,
            };
            (Some(index), score)
        }

        fn finish(&self, state: &Self::State) -> (Self::State, f32) {
            (*state, 0.0)
        }
    }

    #[test]
    fn token_lm_scores_every_token() {
        // Words: 0 = "ab", 1 = "ac".
        let mut trie = Trie::new(4, SIL);
        trie.insert(&[1, 2], 0, 0.0).unwrap();
        trie.insert(&[1, 3], 1, 0.0).unwrap();
        trie.smear(SmearingMode::Max);
        let trie = Arc::new(trie);

        let mut opts = options(CriterionType::Asg);
        opts.lm_weight = 1.0;
        let build = |token_lm: bool| {
            LexiconDecoder::new(
                opts.clone(),
                trie.clone(),
                Arc::new(Charges),
                special(None),
                Array2::zeros((4, 4)),
            )
            .unwrap()
            .with_token_lm(token_lm)
        };
        // a, then c with b close behind
        let e = array![[-10.0f32, 0.0, -10.0, -10.0], [-10.0, -10.0, -1.0, 0.0]];

        // Scoring words, "ac" costs only its word score.
        let results = build(false).decode(e.view()).unwrap();
        assert_eq!(results[0].word_sequence(), [1]);
        assert_eq!(results[0].score, -0.5);

        // Scoring tokens, the expensive "c" loses to "b".
        let results = build(true).decode(e.view()).unwrap();
        let best = &results[0];
        assert_eq!(best.word_sequence(), [0]);
        assert_eq!(best.score, -1.5);
        assert_eq!(best.am_score, -1.0);
        assert_eq!(best.lm_score, -0.5);

        let ac = results.iter().find(|r| r.word_sequence() == [1]).unwrap();
        assert_eq!(ac.lm_score, -5.5);
        assert_eq!(ac.score, -5.5);
    }

    #[test]
    fn accepts_array_literal_emissions() {
        let mut decoder = decoder(CriterionType::Asg);
        let e = array![[-1.0f32, -5.0, -5.0, 0.0]];
        let results = decoder.decode(e.view()).unwrap();
        assert_eq!(results[0].word_sequence(), [1]);
        assert_eq!(results[0].score, 0.0);
    }
}
