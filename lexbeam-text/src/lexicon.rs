//! Word-list (lexicon) loading and spelling utilities.

use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::replabel::pack_replabels;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const UNK_TOKEN: &str = "<unk>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

/// Spelling of a word as a sequence of token strings.
pub type Spelling = Vec<String>;

/// Words with their alternative spellings, in order of first appearance.
#[derive(Clone, Debug, Default)]
pub struct Lexicon {
    words: Vec<(String, Vec<Spelling>)>,
    positions: HashMap<String, usize>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spelling for `word`, creating the word if needed.
    pub fn insert(&mut self, word: &str, spelling: Spelling) {
        match self.positions.get(word) {
            Some(&pos) => self.words[pos].1.push(spelling),
            None => {
                self.positions.insert(word.to_string(), self.words.len());
                self.words.push((word.to_string(), vec![spelling]));
            }
        }
    }

    pub fn spellings(&self, word: &str) -> Option<&[Spelling]> {
        self.positions
            .get(word)
            .map(|&pos| self.words[pos].1.as_slice())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.positions.contains_key(word)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate over `(word, spellings)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Spelling])> {
        self.words
            .iter()
            .map(|(word, spellings)| (word.as_str(), spellings.as_slice()))
    }
}

/// Split a word into its characters, e.g. `"abc"` into `["a", "b", "c"]`.
pub fn split_word(word: &str) -> Spelling {
    word.chars().map(String::from).collect()
}

/// Read a word list where each line is `word [token token ...]`.
///
/// A line with only a word is spelled with [`split_word`]. Repeated words
/// collect alternative spellings. At most `max_words` distinct words are read
/// when a limit is given.
pub fn load_words<R: BufRead>(reader: R, max_words: Option<usize>) -> Result<Lexicon> {
    let mut lexicon = Lexicon::new();

    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();

        let Some(word) = fields.next() else {
            continue;
        };

        if let Some(max) = max_words
            && lexicon.len() >= max
            && !lexicon.contains(word)
        {
            break;
        }

        // A bare word is never empty, so neither is its default spelling.
        let mut spelling: Spelling = fields.map(str::to_string).collect();
        if spelling.is_empty() {
            spelling = split_word(word);
        }

        lexicon.insert(word, spelling);
    }

    tracing::debug!(words = lexicon.len(), "lexicon loaded");

    Ok(lexicon)
}

/// Read a word list from a file, see [`load_words`].
pub fn load_words_file(path: impl AsRef<Path>, max_words: Option<usize>) -> Result<Lexicon> {
    let file = File::open(path)?;
    load_words(BufReader::new(file), max_words)
}

/// Build a word dictionary with one entry per lexicon word.
///
/// `<unk>` is added when the lexicon lacks it and becomes the default index.
pub fn create_word_dict(lexicon: &Lexicon) -> Result<Dictionary> {
    let mut dict = Dictionary::new();

    for (word, _) in lexicon.iter() {
        dict.add_entry(word)?;
    }

    let unk = if dict.contains(UNK_TOKEN) {
        dict.index(UNK_TOKEN)?
    } else {
        dict.add_entry(UNK_TOKEN)?
    };
    dict.set_default_index(unk);

    Ok(dict)
}

/// Map a spelling to token indices and pack repeats with count tokens.
pub fn spelling_to_indices<S: AsRef<str>>(
    spelling: &[S],
    token_dict: &Dictionary,
    max_reps: usize,
) -> Result<Vec<usize>> {
    let indices = token_dict.map_entries_to_indices(spelling)?;
    pack_replabels(&indices, token_dict, max_reps)
}
