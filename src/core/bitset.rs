//! Fixed-capacity flag bitsets.
//!
//! A `FlagBits` value is the bit-vector stored for one interned flag set: one
//! 32-bit word per registry word, bit `n` living in word `n / 32` at position
//! `n % 32`. The capacity is fixed so values are `Copy` and can sit in a frozen
//! table without indirection.

use std::cmp::Ordering;

/// Maximum number of 32-bit words in a flag bitset.
pub const MAX_FLAG_WORDS: usize = 8;

/// Bits per bitset word.
pub const WORD_BITS: u32 = 32;

/// Global bit index of a declared flag.
pub type FlagBit = u32;

/// Bit set for tracking instruction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagBits {
    words: [u32; MAX_FLAG_WORDS],
}

impl FlagBits {
    /// Total number of bits a bitset can hold.
    pub const CAPACITY: u32 = MAX_FLAG_WORDS as u32 * WORD_BITS;

    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            words: [0; MAX_FLAG_WORDS],
        }
    }

    /// Create a set from raw words; missing words are zero.
    pub fn from_words(words: &[u32]) -> Self {
        let mut set = Self::new();
        for (dst, src) in set.words.iter_mut().zip(words) {
            *dst = *src;
        }
        set
    }

    /// Word index holding `bit`.
    #[inline]
    pub const fn word_index(bit: FlagBit) -> usize {
        (bit / WORD_BITS) as usize
    }

    /// Mask of `bit` within its word.
    #[inline]
    pub const fn word_mask(bit: FlagBit) -> u32 {
        1u32 << (bit % WORD_BITS)
    }

    /// Check if a bit is set. Bits beyond capacity are never set.
    pub fn test(&self, bit: FlagBit) -> bool {
        if bit >= Self::CAPACITY {
            return false;
        }
        (self.words[Self::word_index(bit)] & Self::word_mask(bit)) != 0
    }

    /// Set a bit.
    pub fn set(&mut self, bit: FlagBit) {
        if bit < Self::CAPACITY {
            self.words[Self::word_index(bit)] |= Self::word_mask(bit);
        }
    }

    /// Clear a bit.
    pub fn clear(&mut self, bit: FlagBit) {
        if bit < Self::CAPACITY {
            self.words[Self::word_index(bit)] &= !Self::word_mask(bit);
        }
    }

    /// Clear all bits.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Set every bit, the "worst possible" value under [`Ord`].
    pub fn set_all(&mut self) {
        self.words.fill(u32::MAX);
    }

    /// Set union with another set.
    pub fn union(&mut self, other: &FlagBits) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    /// Set intersection with another set.
    pub fn intersect(&mut self, other: &FlagBits) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= *b;
        }
    }

    /// Symmetric difference, returned as a new set.
    pub fn xor(&self, other: &FlagBits) -> FlagBits {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a ^= *b;
        }
        out
    }

    /// Keep only the words in `range`, zeroing the rest.
    pub fn masked_words(&self, range: std::ops::Range<usize>) -> FlagBits {
        let mut out = FlagBits::new();
        let end = range.end.min(MAX_FLAG_WORDS);
        let start = range.start.min(end);
        out.words[start..end].copy_from_slice(&self.words[start..end]);
        out
    }

    /// True when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Raw word `index`; out-of-range words read as zero.
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// The first `count` words.
    pub fn words(&self, count: usize) -> &[u32] {
        &self.words[..count.min(MAX_FLAG_WORDS)]
    }

    /// Number of set bits.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Highest set bit, if any.
    pub fn highest(&self) -> Option<FlagBit> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i as FlagBit * WORD_BITS + (WORD_BITS - 1 - w.leading_zeros()))
    }

    /// Iterate set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = FlagBit> + '_ {
        (0..Self::CAPACITY).filter(move |bit| self.test(*bit))
    }
}

impl Ord for FlagBits {
    /// Compare from the highest word downward, so a set whose highest
    /// differing word is larger orders after the other.
    fn cmp(&self, other: &Self) -> Ordering {
        self.words.iter().rev().cmp(other.words.iter().rev())
    }
}

impl PartialOrd for FlagBits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
