//! Assembly of decoding resources.

use crate::error::Result;
use crate::lm::ArpaLm;
use crate::traits::LanguageModel;
use crate::trie::{SmearingMode, Trie};
use eyre::{Result as EyreResult, WrapErr, eyre};
use lexbeam_text::lexicon::{self, spelling_to_indices};
use lexbeam_text::{Dictionary, Lexicon};
use std::path::{Path, PathBuf};

/// Build a smeared trie holding every spelling of `lexicon`.
///
/// Each label is seeded with the word's score from the start state of `lm`.
pub fn build_trie<L: LanguageModel>(
    lexicon: &Lexicon,
    token_dict: &Dictionary,
    word_dict: &Dictionary,
    lm: &L,
    silence: usize,
    max_reps: usize,
    mode: SmearingMode,
) -> Result<Trie> {
    let mut trie = Trie::new(token_dict.index_size(), silence);
    let start = lm.start(false);

    for (word, spellings) in lexicon.iter() {
        let index = word_dict.index(word)?;
        let (_, score) = lm.score(&start, index);

        for spelling in spellings {
            let tokens = spelling_to_indices(spelling, token_dict, max_reps)?;
            trie.insert(&tokens, index, score)?;
        }
    }

    trie.smear(mode);
    tracing::info!(
        words = lexicon.len(),
        nodes = trie.len(),
        ?mode,
        "lexicon trie built"
    );

    Ok(trie)
}

pub trait AssetRepo {
    fn resolve(&self, file_name: &str) -> EyreResult<PathBuf>;

    /// Resolve the first file name that exists.
    ///
    /// The error lists every name tried, in order.
    fn resolve_any<I, S>(&self, candidates: I) -> EyreResult<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tried = Vec::new();
        for name in candidates {
            let name = name.as_ref();
            match self.resolve(name) {
                Ok(path) => return Ok(path),
                Err(_) => tried.push(name.to_string()),
            }
        }
        Err(eyre!("no decoder asset found, tried: {}", tried.join(", ")))
    }
}

impl AssetRepo for &Path {
    fn resolve(&self, file_name: &str) -> EyreResult<PathBuf> {
        self.join(file_name)
            .canonicalize()
            .wrap_err(format!("failed to resolve asset: {file_name}"))
    }
}

/// Files that make up a lexicon decoding setup.
#[derive(Debug)]
pub struct DecoderAssets {
    pub tokens: Dictionary,
    pub lexicon: Lexicon,
    pub words: Dictionary,
    pub lm: ArpaLm,
    /// Largest repeat count packed into spellings
    pub max_reps: usize,
}

impl DecoderAssets {
    /// Load a token list, a word list and an ARPA model.
    ///
    /// # Arguments
    ///
    /// * `tokens_path` - Token dictionary, one index per line
    /// * `lexicon_path` - Word list, `word [token ...]` per line
    /// * `arpa_path` - Word-level ARPA model
    /// * `max_reps` - Repeat count tokens `<1>`..`<max_reps>` in the token dictionary, 0 for none
    pub fn load(
        tokens_path: impl AsRef<Path>,
        lexicon_path: impl AsRef<Path>,
        arpa_path: impl AsRef<Path>,
        max_reps: usize,
    ) -> EyreResult<Self> {
        let tokens_path = tokens_path.as_ref();
        let lexicon_path = lexicon_path.as_ref();
        let arpa_path = arpa_path.as_ref();

        let tokens = Dictionary::from_file(tokens_path)
            .wrap_err_with(|| format!("failed to load tokens: {}", tokens_path.display()))?;

        let lexicon = lexicon::load_words_file(lexicon_path, None)
            .wrap_err_with(|| format!("failed to load lexicon: {}", lexicon_path.display()))?;

        let words = lexicon::create_word_dict(&lexicon).wrap_err("failed to build word dictionary")?;

        let lm = ArpaLm::from_file(arpa_path, &words)
            .wrap_err_with(|| format!("failed to load language model: {}", arpa_path.display()))?;

        tracing::info!(
            tokens = tokens.index_size(),
            words = words.index_size(),
            lm_order = lm.order(),
            "decoder assets loaded"
        );

        Ok(Self {
            tokens,
            lexicon,
            words,
            lm,
            max_reps,
        })
    }

    /// Load assets from a directory with conventional file names.
    pub fn from_repo<R: AssetRepo>(repo: R, max_reps: usize) -> EyreResult<Self> {
        let tokens_path = repo.resolve_any(["tokens.txt", "tokens.dict"])?;
        let lexicon_path = repo.resolve_any(["lexicon.txt", "words.txt"])?;
        let arpa_path = repo.resolve_any(["lm.arpa", "lm.arpa.txt"])?;

        Self::load(tokens_path, lexicon_path, arpa_path, max_reps)
    }

    /// Build a smeared trie rooted at the `silence` token.
    pub fn build_trie(&self, silence: &str, mode: SmearingMode) -> EyreResult<Trie> {
        let silence = self
            .tokens
            .index(silence)
            .wrap_err_with(|| format!("silence token not in dictionary: {silence}"))?;

        build_trie(
            &self.lexicon,
            &self.tokens,
            &self.words,
            &self.lm,
            silence,
            self.max_reps,
            mode,
        )
        .wrap_err("failed to build lexicon trie")
    }

    /// Word index used for unknown words.
    pub fn unknown_word(&self) -> Option<usize> {
        self.words.default_index()
    }
}
