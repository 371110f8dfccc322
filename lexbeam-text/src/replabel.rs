//! Replabel packing: compact encoding of repeated tokens.
//!
//! A run of a token followed by `r` extra repeats is written as the token
//! followed by the count token `<r>`, e.g. `a b b c c c` packs to
//! `a b <1> c <2>`. Count tokens `<1>` .. `<max_reps>` must already be in the
//! dictionary.

use crate::dictionary::Dictionary;
use crate::error::{DictionaryError, Result};
use std::collections::HashMap;

/// Spelling of the count token for `count` extra repeats.
pub fn replabel_token(count: usize) -> String {
    format!("<{count}>")
}

/// Dictionary indices of `<1>` .. `<max_reps>`; position `i` holds count `i + 1`.
fn replabel_indices(dict: &Dictionary, max_reps: usize) -> Result<Vec<usize>> {
    (1..=max_reps)
        .map(|count| {
            let token = replabel_token(count);
            if !dict.contains(&token) {
                return Err(DictionaryError::UnknownEntry(token).into());
            }
            dict.index(&token)
        })
        .collect()
}

/// Replace runs of repeated tokens by a single token and a count token.
///
/// Runs with more than `max_reps` extra repeats are split into chunks. With
/// `max_reps == 0` the input is returned unchanged.
pub fn pack_replabels(tokens: &[usize], dict: &Dictionary, max_reps: usize) -> Result<Vec<usize>> {
    if tokens.is_empty() || max_reps == 0 {
        return Ok(tokens.to_vec());
    }

    let replabels = replabel_indices(dict, max_reps)?;

    let mut packed = Vec::with_capacity(tokens.len());
    let mut prev = None;
    let mut reps = 0;

    for &token in tokens {
        if prev == Some(token) && reps < max_reps {
            reps += 1;
            continue;
        }
        if reps > 0 {
            packed.push(replabels[reps - 1]);
            reps = 0;
        }
        packed.push(token);
        prev = Some(token);
    }

    if reps > 0 {
        packed.push(replabels[reps - 1]);
    }

    Ok(packed)
}

/// Expand count tokens back into repeated tokens.
///
/// A count token with nothing before it (or right after another count token)
/// is dropped.
pub fn unpack_replabels(
    tokens: &[usize],
    dict: &Dictionary,
    max_reps: usize,
) -> Result<Vec<usize>> {
    if tokens.is_empty() || max_reps == 0 {
        return Ok(tokens.to_vec());
    }

    let counts: HashMap<usize, usize> = replabel_indices(dict, max_reps)?
        .into_iter()
        .enumerate()
        .map(|(i, index)| (index, i + 1))
        .collect();

    let mut unpacked = Vec::with_capacity(tokens.len());
    let mut prev = None;

    for &token in tokens {
        match counts.get(&token) {
            None => {
                unpacked.push(token);
                prev = Some(token);
            }
            Some(&count) => {
                if let Some(repeated) = prev.take() {
                    unpacked.extend(std::iter::repeat_n(repeated, count));
                }
            }
        }
    }

    Ok(unpacked)
}
