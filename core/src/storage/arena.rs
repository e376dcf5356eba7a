// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bit-packed PIN failure arena.
//!
//! Failure counts are stored as a run of cleared bits across an array of
//! words that starts all-ones. Recording a failure clears the next set
//! bit, which on NOR flash is a single in-place word program with no
//! erase, so an attacker cannot cut power to dodge the count. Returning
//! the arena to all-ones requires a full record rewrite and only happens
//! through a storage commit.
//!
//! ```text
//!  word 0            word 1
//! +-----------------+-----------------+--
//! | 1 1 1 ... 1 0 0 | 1 1 1 ... 1 1 1 |    count = 2
//! +-----------------+-----------------+--
//! ```
//!
//! Bits clear from least significant upward, a well-formed word is always
//! a run of ones above a run of zeros.

/// Number of words in the on-record arena
pub const ARENA_WORDS: usize = 16;

/// Maximum count an arena can express, also the sentinel reported for a
/// corrupt arena
pub const CEILING: u32 = ARENA_WORDS as u32 * u32::BITS;

/// Arena corruption marker, the bit pattern is not a valid count
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ArenaCorrupt;

/// Single-word update produced by [`increment`].
///
/// `value` is the complete new contents of word `word`, suitable for an
/// in-place flash program.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Update {
    /// Index of the updated word
    pub word: usize,
    /// New word value
    pub value: u32,
}

/// Compute the failure count encoded by `words`.
///
/// Returns [`ArenaCorrupt`] when the bit pattern is not a run of cleared
/// bits: the live word must be ones-above-zeros and every later word must
/// be untouched.
pub fn fail_count(words: &[u32]) -> Result<u32, ArenaCorrupt> {
    let mut count = 0;

    for (i, w) in words.iter().enumerate() {
        if *w == 0 {
            count += u32::BITS;
            continue;
        }

        // First non-exhausted word carries the tail of the count
        let tz = w.trailing_zeros();
        if *w != u32::MAX << tz {
            return Err(ArenaCorrupt);
        }

        // Words past the live one must be untouched
        if words[i + 1..].iter().any(|later| *later != u32::MAX) {
            return Err(ArenaCorrupt);
        }

        return Ok(count + tz);
    }

    // Every word exhausted
    Ok(count)
}

/// Record one failure, clearing the next bit in sequence.
///
/// Returns the single-word [`Update`] the caller must program to make the
/// failure durable, or [`None`] once the arena is exhausted. Skips over
/// corrupt words rather than failing, corruption is surfaced by
/// [`fail_count`].
pub fn increment(words: &mut [u32]) -> Option<Update> {
    for (i, w) in words.iter_mut().enumerate() {
        if *w == 0 {
            continue;
        }

        // Clearing the lowest set bit never sets a bit, so the new value
        // can always be programmed over the old one
        let value = *w & (*w - 1);
        *w = value;

        return Some(Update { word: i, value });
    }

    None
}

/// Return the arena to the all-ones unset state.
///
/// Callers persist this via a full record rewrite (commit rotation),
/// never an in-place program, as it sets bits.
pub fn reset(words: &mut [u32]) {
    words.fill(u32::MAX);
}
