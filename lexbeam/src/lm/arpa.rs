//! Back-off n-gram language model read from ARPA files.
//!
//! Probabilities and back-off weights stay in log10, as stored in the file.
//!
//! ```text
//! \data\
//! ngram 1=<count>
//! ngram 2=<count>
//!
//! \1-grams:
//! <log10_prob> <word> [<log10_backoff>]
//!
//! \2-grams:
//! <log10_prob> <word1> <word2> [<log10_backoff>]
//!
//! \end\
//! ```

use crate::error::{LmError, Result};
use crate::traits::LanguageModel;
use lexbeam_text::Dictionary;
use lexbeam_text::lexicon::{BOS_TOKEN, EOS_TOKEN, UNK_TOKEN};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// log10 probability of `<unk>` when the model does not list it.
const MISSING_UNK_LOG10_PROB: f32 = -100.0;

#[derive(Clone, Copy, Debug)]
struct NGram {
    prob: f32,
    backoff: f32,
}

/// Context of an [`ArpaLm`] hypothesis.
///
/// Holds the longest suffix of the history (oldest word first) that the model
/// can still extend, so equal states always score identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArpaState(Vec<u32>);

impl ArpaState {
    /// Model vocabulary ids of the retained context.
    pub fn context(&self) -> &[u32] {
        &self.0
    }
}

/// ARPA back-off model keyed by word-dictionary indices.
#[derive(Clone, Debug)]
pub struct ArpaLm {
    order: usize,
    vocab: HashMap<String, u32>,
    /// `ngrams[k]` holds the (k + 1)-grams.
    ngrams: Vec<HashMap<Box<[u32]>, NGram>>,
    /// Word-dictionary index → model id.
    word_to_lm: Vec<u32>,
    unk: u32,
    bos: u32,
    eos: u32,
}

/// Parser position inside an ARPA file.
enum Section {
    Preamble,
    Data,
    NGrams(usize),
}

impl ArpaLm {
    /// Parse an ARPA model and map `word_dict` indices onto its vocabulary.
    ///
    /// Words unknown to the model map to `<unk>`; a model without `<unk>`
    /// gets one with log10 probability -100.
    pub fn from_reader<R: BufRead>(reader: R, word_dict: &Dictionary) -> Result<Self> {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        let mut ngrams: Vec<HashMap<Box<[u32]>, NGram>> = Vec::new();
        let mut section = Section::Preamble;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            let parse_error = |message: String| LmError::Parse {
                line: line_no + 1,
                message,
            };

            if line.is_empty() {
                continue;
            }

            if line == "\\data\\" {
                section = Section::Data;
                continue;
            }

            if line == "\\end\\" {
                break;
            }

            if let Some(order) = line
                .strip_prefix('\\')
                .and_then(|l| l.strip_suffix("-grams:"))
            {
                let order: usize = order
                    .parse()
                    .map_err(|_| parse_error(format!("bad section header '{line}'")))?;
                if order == 0 {
                    return Err(parse_error("n-gram order must be positive".into()).into());
                }
                if ngrams.len() < order {
                    ngrams.resize_with(order, HashMap::new);
                }
                section = Section::NGrams(order);
                continue;
            }

            match section {
                Section::Preamble => {}
                Section::Data => {
                    if !line.starts_with("ngram ") {
                        return Err(parse_error(format!("unexpected line in header '{line}'")).into());
                    }
                }
                Section::NGrams(order) => {
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() != order + 1 && fields.len() != order + 2 {
                        return Err(parse_error(format!(
                            "expected {order}-gram entry, got {} fields",
                            fields.len()
                        ))
                        .into());
                    }

                    let prob: f32 = fields[0]
                        .parse()
                        .map_err(|_| parse_error(format!("bad probability '{}'", fields[0])))?;
                    let backoff: f32 = match fields.get(order + 1) {
                        Some(b) => b
                            .parse()
                            .map_err(|_| parse_error(format!("bad backoff '{b}'")))?,
                        None => 0.0,
                    };

                    let ids: Box<[u32]> = fields[1..=order]
                        .iter()
                        .map(|word| {
                            let next = vocab.len() as u32;
                            *vocab.entry(word.to_string()).or_insert(next)
                        })
                        .collect();

                    ngrams[order - 1].insert(ids, NGram { prob, backoff });
                }
            }
        }

        if ngrams.is_empty() {
            return Err(LmError::Parse {
                line: 0,
                message: "no n-gram sections".into(),
            }
            .into());
        }

        let bos = *vocab.get(BOS_TOKEN).ok_or(LmError::MissingToken(BOS_TOKEN))?;
        let eos = *vocab.get(EOS_TOKEN).ok_or(LmError::MissingToken(EOS_TOKEN))?;
        let unk = match vocab.get(UNK_TOKEN) {
            Some(&id) => id,
            None => {
                tracing::warn!(
                    prob = MISSING_UNK_LOG10_PROB,
                    "arpa model has no <unk>, substituting"
                );
                let id = vocab.len() as u32;
                vocab.insert(UNK_TOKEN.to_string(), id);
                ngrams[0].insert(
                    Box::new([id]),
                    NGram {
                        prob: MISSING_UNK_LOG10_PROB,
                        backoff: 0.0,
                    },
                );
                id
            }
        };

        let word_to_lm = (0..word_dict.index_size())
            .map(|i| {
                word_dict
                    .entry(i)
                    .ok()
                    .and_then(|word| vocab.get(word).copied())
                    .unwrap_or(unk)
            })
            .collect();

        let order = ngrams.len();
        tracing::debug!(
            order,
            vocab = vocab.len(),
            ngrams = ngrams.iter().map(HashMap::len).sum::<usize>(),
            "arpa model loaded"
        );

        Ok(Self {
            order,
            vocab,
            ngrams,
            word_to_lm,
            unk,
            bos,
            eos,
        })
    }

    /// Load an ARPA model from a file, see [`ArpaLm::from_reader`].
    pub fn from_file(path: impl AsRef<Path>, word_dict: &Dictionary) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), word_dict)
    }

    /// Highest n-gram order.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Model id for a word-dictionary index, `<unk>` if unmapped.
    pub fn lm_index(&self, word: usize) -> u32 {
        self.word_to_lm.get(word).copied().unwrap_or(self.unk)
    }

    fn lookup(&self, ngram: &[u32]) -> Option<&NGram> {
        let table = self.ngrams.get(ngram.len().checked_sub(1)?)?;
        table.get(ngram)
    }

    /// Score `word` after `context` with Katz back-off and compute the next state.
    fn score_id(&self, context: &[u32], word: u32) -> (ArpaState, f32) {
        let mut ngram = Vec::with_capacity(context.len() + 1);
        ngram.extend_from_slice(context);
        ngram.push(word);

        let last = ngram.len() - 1;
        let mut backoff = 0.0;
        let mut prob = None;

        for start in 0..=last {
            if let Some(entry) = self.lookup(&ngram[start..]) {
                prob = Some(entry.prob);
                break;
            }
            if let Some(ctx) = self.lookup(&ngram[start..last]) {
                backoff += ctx.backoff;
            }
        }

        let prob = match prob {
            Some(p) => p,
            None => self
                .lookup(&[self.unk])
                .map_or(MISSING_UNK_LOG10_PROB, |e| e.prob),
        };

        let keep = ngram.len().min(self.order - 1);
        let mut state = &ngram[ngram.len() - keep..];
        while !state.is_empty() && self.lookup(state).is_none() {
            state = &state[1..];
        }

        (ArpaState(state.to_vec()), prob + backoff)
    }
}

impl LanguageModel for ArpaLm {
    type State = ArpaState;

    fn start(&self, zero_context: bool) -> Self::State {
        if zero_context || self.order < 2 {
            ArpaState::default()
        } else {
            ArpaState(vec![self.bos])
        }
    }

    fn score(&self, state: &Self::State, index: usize) -> (Self::State, f32) {
        self.score_id(&state.0, self.lm_index(index))
    }

    fn finish(&self, state: &Self::State) -> (Self::State, f32) {
        self.score_id(&state.0, self.eos)
    }
}
