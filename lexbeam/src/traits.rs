//! Core traits for decoder components.

use crate::decoder::DecodeResult;
use crate::error::Result;
use ndarray::ArrayView2;
use std::fmt::Debug;
use std::hash::Hash;

/// Language model queried by the decoders.
///
/// States are opaque values. The decoders only hand them back to the model
/// and compare them to merge hypotheses that share a context, so `Eq` and
/// `Hash` must agree with the model's notion of "same context".
pub trait LanguageModel {
    /// Context carried by a hypothesis.
    type State: Clone + Eq + Hash + Debug;

    /// Initial state; `zero_context` starts from an empty history instead of
    /// beginning-of-sentence.
    fn start(&self, zero_context: bool) -> Self::State;

    /// Consume one word (or token) and return the new state with its score.
    ///
    /// Unknown words must already be mapped to the unknown index by the caller.
    fn score(&self, state: &Self::State, index: usize) -> (Self::State, f32);

    /// Apply end-of-sentence scoring.
    fn finish(&self, state: &Self::State) -> (Self::State, f32);
}

/// Frame-synchronous beam-search decoder.
///
/// Decoding can run incrementally (`decode_begin`, any number of
/// `decode_step` calls on consecutive chunks, `decode_end`) or in one go with
/// [`Decoder::decode`].
pub trait Decoder {
    /// Reset the search to a single initial hypothesis.
    fn decode_begin(&mut self);

    /// Advance the search over `emissions`, shaped `(frames, tokens)`.
    fn decode_step(&mut self, emissions: ArrayView2<'_, f32>) -> Result<()>;

    /// Finalize every surviving hypothesis with the end-of-sentence score.
    fn decode_end(&mut self);

    /// Hypotheses of the last frame, best first.
    fn get_all_final_hypothesis(&self) -> Vec<DecodeResult>;

    /// Best path ending at least `look_back` frames before the last frame,
    /// extended back to the closest word boundary.
    fn get_best_hypothesis(&self, look_back: usize) -> Option<DecodeResult>;

    /// Number of hypotheses in the last frame.
    fn n_hypothesis(&self) -> usize;

    /// Number of frames kept in the hypothesis buffer.
    fn n_decoded_frames_in_buffer(&self) -> usize;

    /// Drop buffered frames older than the best path's stable prefix.
    fn prune(&mut self, look_back: usize);

    /// Decode a whole utterance.
    fn decode(&mut self, emissions: ArrayView2<'_, f32>) -> Result<Vec<DecodeResult>> {
        self.decode_begin();
        self.decode_step(emissions)?;
        self.decode_end();
        Ok(self.get_all_final_hypothesis())
    }
}
