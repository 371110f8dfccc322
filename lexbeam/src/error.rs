//! Error types for lexbeam organized by processing stage.

use thiserror::Error;

/// Decoder error variants organized by processing stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration stage error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Trie construction or lookup error
    #[error(transparent)]
    Trie(#[from] TrieError),

    /// Language model loading error
    #[error(transparent)]
    Lm(#[from] LmError),

    /// Decoding stage error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Dictionary or lexicon error
    #[error(transparent)]
    Text(#[from] lexbeam_text::Error),
}

/// Decoder configuration errors, reported at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Beam size must be positive
    #[error("invalid beam size: {0} (must be at least 1)")]
    InvalidBeamSize(usize),

    /// Token beam size must be positive
    #[error("invalid token beam size: {0} (must be at least 1)")]
    InvalidBeamSizeToken(usize),

    /// Beam threshold must be a non-negative number
    #[error("invalid beam threshold: {0}")]
    InvalidBeamThreshold(f64),

    /// Weight or score option is NaN
    #[error("option {name} is not a number")]
    NotANumber { name: &'static str },

    /// CTC decoding needs a blank token
    #[error("ctc criterion requires a blank token")]
    MissingBlank,

    /// Special token outside the token alphabet
    #[error("{name} index {index} out of range (token count {tokens})")]
    TokenOutOfRange {
        name: &'static str,
        index: usize,
        tokens: usize,
    },

    /// Transition matrix is not N x N
    #[error("transition matrix shape {rows}x{cols} does not match token count {tokens}")]
    TransitionShape {
        rows: usize,
        cols: usize,
        tokens: usize,
    },

    /// Trie has not been smeared
    #[error("trie must be smeared before decoding")]
    TrieNotSmeared,
}

/// Trie errors.
#[derive(Debug, Error)]
pub enum TrieError {
    /// Token index outside the trie alphabet
    #[error("invalid token index {index} (max children {max})")]
    InvalidToken { index: usize, max: usize },
}

/// Language model loading errors.
#[derive(Debug, Error)]
pub enum LmError {
    /// Malformed ARPA content
    #[error("arpa parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// ARPA file lacks a required token
    #[error("arpa model has no '{0}' entry")]
    MissingToken(&'static str),

    /// IO error while reading the model
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors reported at the start of a decode step.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Emission matrix width differs from the token count
    #[error("emission matrix has {got} tokens per frame, decoder expects {expected}")]
    EmissionShape { expected: usize, got: usize },

    /// Step called without decode_begin
    #[error("decode_step called before decode_begin")]
    NotStarted,
}

/// Result type alias for lexbeam operations.
pub type Result<T> = std::result::Result<T, Error>;

// std::io::Error → LmError → Error
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Lm(LmError::Io(e))
    }
}

// DictionaryError → lexbeam_text::Error → Error
impl From<lexbeam_text::error::DictionaryError> for Error {
    fn from(e: lexbeam_text::error::DictionaryError) -> Self {
        Error::Text(e.into())
    }
}
