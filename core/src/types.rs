// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bounded owned strings for storage records and engine state.
//!
//! [`BoundedStr`] replaces fixed char-array-plus-flag fields with a
//! capacity-checked owned string. The backing buffer past the live length
//! is always zero, so stale secret bytes never survive truncation or reuse
//! and full-capacity comparisons are well defined.

use zeroize::Zeroize;

/// Owned string bounded to `N` bytes
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct BoundedStr<const N: usize> {
    buff: [u8; N],
    len: u8,
}

impl<const N: usize> BoundedStr<N> {
    /// Create an empty string
    pub const fn new() -> Self {
        Self {
            buff: [0u8; N],
            len: 0,
        }
    }

    /// Build from `s`, returning [`None`] when `s` exceeds the capacity
    pub fn try_from_str(s: &str) -> Option<Self> {
        let mut v = Self::new();
        match v.set(s) {
            true => Some(v),
            false => None,
        }
    }

    /// Replace the contents with `s`, zeroizing the prior value first.
    ///
    /// Returns `false` and leaves the string empty when `s` exceeds the
    /// capacity.
    pub fn set(&mut self, s: &str) -> bool {
        self.zeroize();

        let d = s.as_bytes();
        if d.len() > N {
            return false;
        }

        self.buff[..d.len()].copy_from_slice(d);
        self.len = d.len() as u8;

        true
    }

    /// Fetch the contents as a string slice
    pub fn as_str(&self) -> &str {
        // Contents are copied from `&str` only, so this cannot fail
        core::str::from_utf8(&self.buff[..self.len as usize]).unwrap_or_default()
    }

    /// Fetch the live length in bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear the string, zeroizing the backing buffer
    pub fn clear(&mut self) {
        self.zeroize();
    }

    /// Constant-time comparison against `other`.
    ///
    /// Always walks the full capacity so timing reveals neither the stored
    /// length nor the position of the first mismatch. Relies on the
    /// zero-past-length invariant of the backing buffer.
    pub fn ct_eq(&self, other: &str) -> bool {
        let d = other.as_bytes();

        let mut diff = self.len as usize ^ d.len();

        for i in 0..N {
            let b = match i < d.len() {
                true => d[i],
                false => 0,
            };
            diff |= (self.buff[i] ^ b) as usize;
        }

        diff == 0
    }
}

impl<const N: usize> Default for BoundedStr<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for BoundedStr<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> core::fmt::Display for BoundedStr<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
