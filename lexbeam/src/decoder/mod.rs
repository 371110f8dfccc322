//! Frame-synchronous beam-search decoders.
//!
//! Both decoders consume an emission matrix shaped `(frames, tokens)` and an
//! optional `(tokens, tokens)` transition matrix where `transitions[[i, j]]`
//! scores moving from token `i` to token `j`.

mod beam;
mod candidates;
pub mod lexicon;
pub mod lexicon_free;
pub mod options;
pub mod result;

pub use lexicon::{LexiconDecoder, SpecialIndices};
pub use lexicon_free::LexiconFreeDecoder;
pub use options::{LexiconDecoderOptions, LexiconFreeDecoderOptions};
pub use result::DecodeResult;

use crate::error::{ConfigError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Training criterion of the acoustic model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionType {
    /// Auto segmentation: scores token transitions, no blank.
    Asg,
    /// Connectionist temporal classification: blank token, no transitions.
    Ctc,
}

/// Indices of the `k` best tokens of a frame, best first.
///
/// Ties keep index order. When `k` covers the whole alphabet every token is
/// returned in index order.
pub(crate) fn top_tokens(frame: ArrayView1<'_, f32>, k: usize, out: &mut Vec<usize>) {
    out.clear();
    out.extend(0..frame.len());

    if k < frame.len() {
        out.sort_by(|&a, &b| frame[b].total_cmp(&frame[a]));
        out.truncate(k);
    }
}

/// Acoustic score of emitting `token` after `prev`.
pub(crate) fn acoustic_score(
    frame: ArrayView1<'_, f32>,
    transitions: &Array2<f32>,
    criterion: CriterionType,
    first_frame: bool,
    prev: usize,
    token: usize,
) -> f64 {
    let mut score = frame[token] as f64;
    if criterion == CriterionType::Asg && !first_frame {
        score += transitions[[prev, token]] as f64;
    }
    score
}

pub(crate) fn check_token(name: &'static str, index: usize, tokens: usize) -> Result<()> {
    if index >= tokens {
        return Err(ConfigError::TokenOutOfRange {
            name,
            index,
            tokens,
        }
        .into());
    }
    Ok(())
}

/// ASG needs a full `tokens x tokens` matrix; CTC accepts an empty one.
pub(crate) fn check_transitions(
    transitions: &Array2<f32>,
    tokens: usize,
    criterion: CriterionType,
) -> Result<()> {
    let (rows, cols) = transitions.dim();
    let full = rows == tokens && cols == tokens;
    let empty = rows == 0 && cols == 0;

    if full || (empty && criterion == CriterionType::Ctc) {
        Ok(())
    } else {
        Err(ConfigError::TransitionShape { rows, cols, tokens }.into())
    }
}

/// Blank index, required under CTC.
pub(crate) fn check_blank(
    blank: Option<usize>,
    tokens: usize,
    criterion: CriterionType,
) -> Result<()> {
    match blank {
        Some(index) => check_token("blank", index, tokens),
        None if criterion == CriterionType::Ctc => Err(ConfigError::MissingBlank.into()),
        None => Ok(()),
    }
}
