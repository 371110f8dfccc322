//! lexbeam-text: token dictionaries, lexicons and replabel packing.
//!
//! These are the text-side inputs of a lexicon-constrained decoder:
//!
//! - [`dictionary::Dictionary`]: token or word ↔ index table
//! - [`lexicon`]: word-list loading and spelling → index mapping
//! - [`replabel`]: packing of repeated tokens into count tokens
//!
//! # Quick Start
//!
//! ```
//! use lexbeam_text::dictionary::Dictionary;
//! use lexbeam_text::lexicon::{create_word_dict, load_words, spelling_to_indices};
//!
//! let tokens = Dictionary::from_reader("|\nb\no\nk\n<1>\n".as_bytes())?;
//! let lexicon = load_words("book b o o k |\n".as_bytes(), None)?;
//! let words = create_word_dict(&lexicon)?;
//!
//! let spelling = &lexicon.spellings("book").unwrap()[0];
//! let indices = spelling_to_indices(spelling, &tokens, 1)?;
//!
//! assert_eq!(indices, vec![1, 2, 4, 3, 0]);
//! assert_eq!(words.index("book")?, 0);
//! # Ok::<(), lexbeam_text::error::Error>(())
//! ```

pub mod dictionary;
pub mod error;
pub mod lexicon;
pub mod replabel;

pub use dictionary::Dictionary;
pub use error::{Error, Result};
pub use lexicon::Lexicon;
