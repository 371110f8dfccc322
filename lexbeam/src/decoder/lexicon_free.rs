//! Beam search over raw tokens, without a lexicon.

use super::beam::{Hypothesis, HypothesisBuffer};
use super::candidates::Candidates;
use super::options::LexiconFreeDecoderOptions;
use super::{
    CriterionType, DecodeResult, acoustic_score, check_blank, check_token, check_transitions,
    top_tokens,
};
use crate::error::{DecodeError, Result};
use crate::traits::{Decoder, LanguageModel};
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Token-level beam-search decoder.
///
/// The language model scores every newly emitted token; repeats and blanks
/// keep the current state. Results carry no words.
pub struct LexiconFreeDecoder<L: LanguageModel> {
    options: LexiconFreeDecoderOptions,
    lm: Arc<L>,
    silence: usize,
    blank: Option<usize>,
    transitions: Array2<f32>,
    tokens: usize,
    buffer: HypothesisBuffer<L::State>,
    candidates: Candidates<L::State>,
    top: Vec<usize>,
    decoded_frames: usize,
}

impl<L: LanguageModel> LexiconFreeDecoder<L> {
    /// Create a decoder over `tokens` tokens.
    pub fn new(
        options: LexiconFreeDecoderOptions,
        lm: Arc<L>,
        tokens: usize,
        silence: usize,
        blank: Option<usize>,
        transitions: Array2<f32>,
    ) -> Result<Self> {
        options.validate()?;
        check_token("silence", silence, tokens)?;
        check_blank(blank, tokens, options.criterion)?;
        check_transitions(&transitions, tokens, options.criterion)?;

        Ok(Self {
            options,
            lm,
            silence,
            blank,
            transitions,
            tokens,
            buffer: HypothesisBuffer::default(),
            candidates: Candidates::default(),
            top: Vec::new(),
            decoded_frames: 0,
        })
    }

    pub fn options(&self) -> &LexiconFreeDecoderOptions {
        &self.options
    }

    pub fn decoded_frames(&self) -> usize {
        self.decoded_frames
    }
}

impl<L: LanguageModel> Decoder for LexiconFreeDecoder<L> {
    fn decode_begin(&mut self) {
        self.candidates.reset();
        self.decoded_frames = 0;
        self.buffer
            .reset(vec![Hypothesis::initial(self.lm.start(false), self.silence)]);
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
            lm,
            silence,
            blank,
            transitions,
            buffer,
            candidates,
            top,
            decoded_frames,
            ..
        } = self;
        let threshold = options.beam_threshold;

        for (t, frame) in emissions.outer_iter().enumerate() {
            let first_frame = *decoded_frames + t == 0;
            top_tokens(frame, options.beam_size_token, top);
            candidates.reset();

            for (prev_index, prev) in buffer.last().iter().enumerate() {
                for &n in top.iter() {
                    let am = acoustic_score(
                        frame,
                        transitions,
                        options.criterion,
                        first_frame,
                        prev.token,
                        n,
                    );
                    let mut score = prev.score + am;
                    if n == *silence {
                        score += options.sil_score;
                    }

                    let is_blank = *blank == Some(n);
                    let emits = match options.criterion {
                        CriterionType::Asg => n != prev.token,
                        CriterionType::Ctc => !is_blank && (n != prev.token || prev.prev_blank),
                    };

                    let next = if emits {
                        let (state, lm_score) = lm.score(&prev.key, n);
                        let lm_score = lm_score as f64;
                        prev.extend(prev_index, state, n).with_scores(
                            score + options.lm_weight * lm_score,
                            prev.am_score + am,
                            prev.lm_score + lm_score,
                        )
                    } else {
                        let next = prev.extend(prev_index, prev.key.clone(), n).with_scores(
                            score,
                            prev.am_score + am,
                            prev.lm_score,
                        );
                        if is_blank && options.criterion == CriterionType::Ctc {
                            next.with_blank()
                        } else {
                            next
                        }
                    };
                    candidates.add(next, threshold);
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
        for (index, prev) in self.buffer.last().iter().enumerate() {
            let (state, lm_score) = self.lm.finish(&prev.key);
            let lm_score = lm_score as f64;
            self.candidates.add(
                prev.extend(index, state, self.silence).with_scores(
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
            "decode end"
        );
        self.buffer.push(finals);
        self.decoded_frames += 1;
    }

    fn get_all_final_hypothesis(&self) -> Vec<DecodeResult> {
        self.buffer.all_final()
    }

    fn get_best_hypothesis(&self, look_back: usize) -> Option<DecodeResult> {
        self.buffer.best_path(look_back, false)
    }

    fn n_hypothesis(&self) -> usize {
        self.buffer.last().len()
    }

    fn n_decoded_frames_in_buffer(&self) -> usize {
        self.buffer.len()
    }

    fn prune(&mut self, look_back: usize) {
        let dropped = self.buffer.prune(look_back, false);
        if dropped > 0 {
            tracing::trace!(dropped, kept = self.buffer.len(), "beam pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::ZeroLm;

    const BLANK: usize = 0;

    /// Token model that charges -1 for every emitted token except token 2.
    #[derive(Debug)]
    struct FavourTwo;

    impl LanguageModel for FavourTwo {
        type State = Option<usize>;

        fn start(&self, _zero_context: bool) -> Self::State {
            None
        }

        fn score(&self, _state: &Self::State, index: usize) -> (Self::State, f32) {
            (Some(index), if index == 2 { 0.0 } else { -1.0 })
        }

        fn finish(&self, state: &Self::State) -> (Self::State, f32) {
            (*state, 0.0)
        }
    }

    fn options(criterion: CriterionType, lm_weight: f64) -> LexiconFreeDecoderOptions {
        LexiconFreeDecoderOptions {
            beam_size: 8,
            beam_size_token: 4,
            beam_threshold: 50.0,
            lm_weight,
            sil_score: 0.0,
            log_add: false,
            criterion,
        }
    }

    fn emissions(rows: &[[f32; 4]]) -> Array2<f32> {
        Array2::from_shape_fn((rows.len(), 4), |(t, n)| rows[t][n])
    }

    #[test]
    fn ctc_emits_after_blank_or_change() {
        let mut decoder = LexiconFreeDecoder::new(
            options(CriterionType::Ctc, 0.0),
            Arc::new(ZeroLm),
            4,
            3,
            Some(BLANK),
            Array2::zeros((0, 0)),
        )
        .unwrap();

        // 1 1 _ 1 2
        let e = emissions(&[
            [-5.0, 0.0, -5.0, -5.0],
            [-5.0, 0.0, -5.0, -5.0],
            [0.0, -5.0, -5.0, -5.0],
            [-5.0, 0.0, -5.0, -5.0],
            [-5.0, -5.0, 0.0, -5.0],
        ]);
        let results = decoder.decode(e.view()).unwrap();
        let best = &results[0];

        assert_eq!(best.score, 0.0);
        assert_eq!(best.tokens, [3, 1, 1, 0, 1, 2, 3]);
        assert_eq!(best.reduced_tokens(Some(BLANK)), [3, 1, 1, 2, 3]);
        assert!(best.words.iter().all(Option::is_none));
    }

    #[test]
    fn zero_lm_state_counts_emissions() {
        let mut decoder = LexiconFreeDecoder::new(
            options(CriterionType::Ctc, 1.0),
            Arc::new(ZeroLm),
            4,
            3,
            Some(BLANK),
            Array2::zeros((0, 0)),
        )
        .unwrap();

        let e = emissions(&[
            [-5.0, 0.0, -5.0, -5.0],
            [-5.0, 0.0, -5.0, -5.0],
            [-5.0, -5.0, 0.0, -5.0],
        ]);
        decoder.decode(e.view()).unwrap();

        let best = &decoder.buffer.last()[0];
        assert_eq!(best.key.history(), [1, 2]);
    }

    #[test]
    fn token_lm_steers_search() {
        let e = emissions(&[[-5.0, -1.0, -1.2, -5.0]]);

        let mut plain = LexiconFreeDecoder::new(
            options(CriterionType::Ctc, 0.0),
            Arc::new(FavourTwo),
            4,
            3,
            Some(BLANK),
            Array2::zeros((0, 0)),
        )
        .unwrap();
        assert_eq!(plain.decode(e.view()).unwrap()[0].tokens[1], 1);

        let mut weighted = LexiconFreeDecoder::new(
            options(CriterionType::Ctc, 1.0),
            Arc::new(FavourTwo),
            4,
            3,
            Some(BLANK),
            Array2::zeros((0, 0)),
        )
        .unwrap();
        let results = weighted.decode(e.view()).unwrap();
        assert_eq!(results[0].tokens[1], 2);
        assert!((results[0].score - -1.2).abs() < 1e-6);
        assert_eq!(results[1].lm_score, -1.0);
    }

    #[test]
    fn asg_scores_transitions_after_first_frame() {
        let mut transitions = Array2::zeros((4, 4));
        transitions[[1, 2]] = -3.0;

        let mut decoder = LexiconFreeDecoder::new(
            options(CriterionType::Asg, 0.0),
            Arc::new(ZeroLm),
            4,
            0,
            None,
            transitions,
        )
        .unwrap();

        // 1 then 2 vs 1 then 1: the transition penalty flips the choice.
        let e = emissions(&[[-5.0, 0.0, -5.0, -5.0], [-5.0, -1.0, 0.0, -5.0]]);
        let results = decoder.decode(e.view()).unwrap();
        assert_eq!(results[0].tokens, [0, 1, 1, 0]);
        assert_eq!(results[0].score, -1.0);
    }

    #[test]
    fn streaming_prunes_buffer() {
        let mut decoder = LexiconFreeDecoder::new(
            options(CriterionType::Ctc, 0.0),
            Arc::new(ZeroLm),
            4,
            3,
            Some(BLANK),
            Array2::zeros((0, 0)),
        )
        .unwrap();

        let e = emissions(&[[-5.0, 0.0, -5.0, -5.0]; 6]);
        decoder.decode_begin();
        decoder.decode_step(e.view()).unwrap();
        assert_eq!(decoder.n_decoded_frames_in_buffer(), 7);

        let partial = decoder.get_best_hypothesis(2).unwrap();
        assert_eq!(partial.tokens.len(), 5);

        decoder.prune(2);
        assert_eq!(decoder.n_decoded_frames_in_buffer(), 3);
        assert!(decoder.n_hypothesis() > 0);

        decoder.decode_step(e.view()).unwrap();
        decoder.decode_end();
        assert_eq!(decoder.decoded_frames(), 13);
        assert_eq!(decoder.get_all_final_hypothesis()[0].score, 0.0);
    }
}
