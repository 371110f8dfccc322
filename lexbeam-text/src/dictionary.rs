//! Bidirectional token/word ↔ index table.

use crate::error::{DictionaryError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// String ↔ index mapping.
///
/// Several spellings may share one index; the first spelling registered for an
/// index is the one returned by [`Dictionary::entry`]. When a default index is
/// set, lookups of unknown entries resolve to it instead of failing.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    entry_to_index: HashMap<String, usize>,
    index_to_entry: HashMap<usize, String>,
    default_index: Option<usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a dictionary where each non-empty line holds one or more
    /// whitespace separated spellings sharing the next free index.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut dict = Self::new();

        for line in reader.lines() {
            let line = line?;
            let mut spellings = line.split_whitespace().peekable();

            if spellings.peek().is_none() {
                continue;
            }

            let index = dict.index_size();
            for spelling in spellings {
                dict.add_entry_with_index(spelling, index)?;
            }
        }

        tracing::debug!(
            entries = dict.entry_size(),
            indices = dict.index_size(),
            "dictionary loaded"
        );

        Ok(dict)
    }

    /// Read a dictionary from a file, see [`Dictionary::from_reader`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Register `entry` at the first free index at or above the number of
    /// distinct indices, returning that index.
    ///
    /// Gaps left by [`Dictionary::add_entry_with_index`] below that point are
    /// not filled.
    pub fn add_entry(&mut self, entry: &str) -> Result<usize> {
        if self.entry_to_index.contains_key(entry) {
            return Err(DictionaryError::Duplicate(entry.to_string()).into());
        }

        let mut index = self.index_to_entry.len();
        while self.index_to_entry.contains_key(&index) {
            index += 1;
        }

        self.add_entry_with_index(entry, index)?;
        Ok(index)
    }

    /// Register `entry` as a spelling of `index`.
    pub fn add_entry_with_index(&mut self, entry: &str, index: usize) -> Result<()> {
        if self.entry_to_index.contains_key(entry) {
            return Err(DictionaryError::Duplicate(entry.to_string()).into());
        }

        self.entry_to_index.insert(entry.to_string(), index);
        self.index_to_entry
            .entry(index)
            .or_insert_with(|| entry.to_string());

        Ok(())
    }

    /// Canonical spelling of `index`.
    pub fn entry(&self, index: usize) -> Result<&str> {
        self.index_to_entry
            .get(&index)
            .map(String::as_str)
            .ok_or_else(|| DictionaryError::UnknownIndex(index).into())
    }

    /// Index of `entry`, falling back to the default index when one is set.
    pub fn index(&self, entry: &str) -> Result<usize> {
        self.entry_to_index
            .get(entry)
            .copied()
            .or(self.default_index)
            .ok_or_else(|| DictionaryError::UnknownEntry(entry.to_string()).into())
    }

    pub fn set_default_index(&mut self, index: usize) {
        self.default_index = Some(index);
    }

    pub fn default_index(&self) -> Option<usize> {
        self.default_index
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entry_to_index.contains_key(entry)
    }

    /// Number of spellings.
    pub fn entry_size(&self) -> usize {
        self.entry_to_index.len()
    }

    /// Number of distinct indices.
    pub fn index_size(&self) -> usize {
        self.index_to_entry.len()
    }

    /// True when indices cover `0..index_size()` with no gaps.
    pub fn is_contiguous(&self) -> bool {
        let size = self.index_size();
        (0..size).all(|i| self.index_to_entry.contains_key(&i))
            && self.entry_to_index.values().all(|i| *i < size)
    }

    pub fn map_entries_to_indices<S: AsRef<str>>(&self, entries: &[S]) -> Result<Vec<usize>> {
        entries.iter().map(|e| self.index(e.as_ref())).collect()
    }

    pub fn map_indices_to_entries(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices
            .iter()
            .map(|&i| self.entry(i).map(str::to_string))
            .collect()
    }
}
