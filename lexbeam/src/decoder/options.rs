//! Decoder configuration.

use super::CriterionType;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Options of [`LexiconDecoder`](super::LexiconDecoder).
///
/// `unk_score` is usually `-inf`, which disables unknown words; in JSON it is
/// written as `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexiconDecoderOptions {
    /// Hypotheses kept per frame
    pub beam_size: usize,
    /// Tokens expanded per hypothesis and frame
    pub beam_size_token: usize,
    /// Score gap to the frame's best hypothesis
    pub beam_threshold: f64,
    pub lm_weight: f64,
    /// Bonus per completed word
    pub word_score: f64,
    #[serde(with = "neg_inf_as_null")]
    pub unk_score: f64,
    pub sil_score: f64,
    /// Merge colliding hypotheses with log-sum-exp instead of max
    pub log_add: bool,
    pub criterion: CriterionType,
}

impl LexiconDecoderOptions {
    pub fn validate(&self) -> Result<()> {
        check_beam(self.beam_size, self.beam_size_token, self.beam_threshold)?;
        check_numbers(&[
            ("lm_weight", self.lm_weight),
            ("word_score", self.word_score),
            ("unk_score", self.unk_score),
            ("sil_score", self.sil_score),
        ])
    }
}

/// Options of [`LexiconFreeDecoder`](super::LexiconFreeDecoder).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LexiconFreeDecoderOptions {
    pub beam_size: usize,
    pub beam_size_token: usize,
    pub beam_threshold: f64,
    pub lm_weight: f64,
    pub sil_score: f64,
    pub log_add: bool,
    pub criterion: CriterionType,
}

impl LexiconFreeDecoderOptions {
    pub fn validate(&self) -> Result<()> {
        check_beam(self.beam_size, self.beam_size_token, self.beam_threshold)?;
        check_numbers(&[
            ("lm_weight", self.lm_weight),
            ("sil_score", self.sil_score),
        ])
    }
}

fn check_beam(beam_size: usize, beam_size_token: usize, beam_threshold: f64) -> Result<()> {
    if beam_size == 0 {
        return Err(ConfigError::InvalidBeamSize(beam_size).into());
    }
    if beam_size_token == 0 {
        return Err(ConfigError::InvalidBeamSizeToken(beam_size_token).into());
    }
    if beam_threshold.is_nan() || beam_threshold < 0.0 {
        return Err(ConfigError::InvalidBeamThreshold(beam_threshold).into());
    }
    Ok(())
}

fn check_numbers(values: &[(&'static str, f64)]) -> Result<()> {
    match values.iter().find(|(_, v)| v.is_nan()) {
        Some(&(name, _)) => Err(ConfigError::NotANumber { name }.into()),
        None => Ok(()),
    }
}

mod neg_inf_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if *value == f64::NEG_INFINITY {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}
