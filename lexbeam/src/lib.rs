//! lexbeam: lexicon-constrained beam-search decoding for acoustic models.
//!
//! This crate turns per-frame token scores into ranked word sequences. The
//! search is constrained by a pronunciation lexicon stored in a prefix trie
//! and rescored by an n-gram language model at word boundaries.
//!
//! # Architecture
//!
//! The library is built around two core traits:
//!
//! - [`traits::LanguageModel`]: Scores words (or tokens) against an opaque context state
//! - [`traits::Decoder`]: Frame-synchronous search with a streaming interface
//!
//! Implementations:
//!
//! - [`decoder::LexiconDecoder`]: Search over the words of a smeared [`trie::Trie`]
//! - [`decoder::LexiconFreeDecoder`]: Search over raw tokens
//! - [`lm::ArpaLm`] and [`lm::ZeroLm`]: Language models
//!
//! # Quick Start
//!
//! ```
//! use lexbeam::decoder::{CriterionType, LexiconDecoder, LexiconDecoderOptions, SpecialIndices};
//! use lexbeam::lm::ZeroLm;
//! use lexbeam::pipelines::build_trie;
//! use lexbeam::traits::Decoder;
//! use lexbeam::trie::SmearingMode;
//! use lexbeam_text::Dictionary;
//! use lexbeam_text::lexicon::{create_word_dict, load_words};
//! use ndarray::Array2;
//! use std::sync::Arc;
//!
//! let tokens = Dictionary::from_reader("|\na\nb\n".as_bytes())?;
//! let lexicon = load_words("ab a b\n".as_bytes(), None)?;
//! let words = create_word_dict(&lexicon)?;
//!
//! let trie = build_trie(&lexicon, &tokens, &words, &ZeroLm, 0, 0, SmearingMode::Max)?;
//!
//! let options = LexiconDecoderOptions {
//!     beam_size: 8,
//!     beam_size_token: 3,
//!     beam_threshold: 20.0,
//!     lm_weight: 1.0,
//!     word_score: 0.0,
//!     unk_score: f64::NEG_INFINITY,
//!     sil_score: 0.0,
//!     log_add: false,
//!     criterion: CriterionType::Asg,
//! };
//! let special = SpecialIndices { silence: 0, blank: None, unknown_word: 1 };
//! let transitions = Array2::zeros((3, 3));
//!
//! let mut decoder = LexiconDecoder::new(options, Arc::new(trie), Arc::new(ZeroLm), special, transitions)?;
//!
//! // frames: a, b, silence
//! let emissions = ndarray::array![[-5.0f32, 0.0, -5.0], [-5.0, -5.0, 0.0], [0.0, -5.0, -5.0]];
//! let results = decoder.decode(emissions.view())?;
//!
//! assert_eq!(results[0].word_sequence(), vec![words.index("ab")?]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod decoder;
pub mod error;
pub mod lm;
pub mod math;
pub mod pipelines;
pub mod traits;
pub mod trie;

pub use error::{Error, Result};
