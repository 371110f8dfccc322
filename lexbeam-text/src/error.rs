//! Error types for lexbeam-text organized by data source.

use thiserror::Error;

/// Text layer error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Dictionary lookup or construction error
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    /// IO error while reading a dictionary or lexicon
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Dictionary errors.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// Entry already registered
    #[error("duplicate entry in dictionary: '{0}'")]
    Duplicate(String),

    /// Entry not found and no default index configured
    #[error("unknown entry in dictionary: '{0}'")]
    UnknownEntry(String),

    /// Index not found
    #[error("unknown index in dictionary: {0}")]
    UnknownIndex(usize),
}

/// Result type alias for lexbeam-text operations.
pub type Result<T> = std::result::Result<T, Error>;
