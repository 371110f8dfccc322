//! Language model that scores everything as 0.

use crate::traits::LanguageModel;
use std::sync::Arc;

/// Word history seen by [`ZeroLm`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ZeroLmState(Arc<[usize]>);

impl ZeroLmState {
    pub fn history(&self) -> &[usize] {
        &self.0
    }
}

/// Stub model for lexicon-only decoding.
///
/// Scores are always 0, but the state still tracks the full history so that
/// hypotheses with different word sequences are never merged.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroLm;

impl LanguageModel for ZeroLm {
    type State = ZeroLmState;

    fn start(&self, _zero_context: bool) -> Self::State {
        ZeroLmState::default()
    }

    fn score(&self, state: &Self::State, index: usize) -> (Self::State, f32) {
        let history: Arc<[usize]> = state.0.iter().copied().chain([index]).collect();
        (ZeroLmState(history), 0.0)
    }

    fn finish(&self, state: &Self::State) -> (Self::State, f32) {
        (state.clone(), 0.0)
    }
}
