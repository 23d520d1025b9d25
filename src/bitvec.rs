//! Packed atomic bit vector backing both filter layouts.
//!
//! Storage is a flat array of 64-bit words. Writers use word-level atomic
//! OR / AND-NOT, so concurrent updates to disjoint bits of the same word
//! commute. Readers use relaxed loads; callers must quiesce writers before
//! querying.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::directory::FilterError;
use crate::geometry::WORD_BITS;

/// A packed bit vector of a fixed number of bits.
pub struct BitVector {
    bits: u64,
    words: Vec<AtomicU64>,
}

impl BitVector {
    /// Allocate an all-zero vector of `bits` bits.
    pub fn new(bits: u64) -> Result<Self, FilterError> {
        let n = bits.div_ceil(WORD_BITS) as usize;
        let mut words = Vec::new();
        words.try_reserve_exact(n).map_err(|_| {
            FilterError::Resource(format!("cannot allocate {n} words for the bit vector"))
        })?;
        words.resize_with(n, || AtomicU64::new(0));
        Ok(BitVector { bits, words })
    }

    /// Rebuild a vector from deserialized words.
    pub(crate) fn from_words(bits: u64, raw: &[u64]) -> Result<Self, FilterError> {
        let fresh = BitVector::new(bits)?;
        for (word, &value) in fresh.words.iter().zip(raw) {
            word.store(value, Ordering::Relaxed);
        }
        Ok(fresh)
    }

    /// Length in bits.
    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Number of backing words.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Return the `len`-bit integer starting at bit `pos`, right to left:
    /// bit `pos` becomes the LSB of the result. `len <= 64`; unaligned
    /// reads combine at most two adjacent words.
    #[inline]
    pub fn get_int(&self, pos: u64, len: u64) -> u64 {
        debug_assert!(len >= 1 && len <= WORD_BITS);
        debug_assert!(pos + len <= self.bits, "read past the end of the vector");
        let word = (pos / WORD_BITS) as usize;
        let off = pos % WORD_BITS;
        let Some(lo) = self.words.get(word) else {
            return 0;
        };
        let lo = lo.load(Ordering::Relaxed) >> off;
        let value = if off + len <= WORD_BITS {
            lo
        } else {
            let hi = match self.words.get(word + 1) {
                Some(w) => w.load(Ordering::Relaxed),
                None => 0,
            };
            lo | (hi << (WORD_BITS - off))
        };
        if len == WORD_BITS {
            value
        } else {
            value & ((1u64 << len) - 1)
        }
    }

    /// Atomically set bit `pos` to 1. Concurrent writers to other bits of
    /// the same word do not lose updates.
    #[inline]
    pub fn set_pos(&self, pos: u64) {
        debug_assert!(pos < self.bits, "set past the end of the vector");
        if let Some(word) = self.words.get((pos / WORD_BITS) as usize) {
            word.fetch_or(1u64 << (pos % WORD_BITS), Ordering::Relaxed);
        }
    }

    /// Atomically clear bit `pos`.
    #[inline]
    pub fn unset_pos(&self, pos: u64) {
        debug_assert!(pos < self.bits, "unset past the end of the vector");
        if let Some(word) = self.words.get((pos / WORD_BITS) as usize) {
            word.fetch_and(!(1u64 << (pos % WORD_BITS)), Ordering::Relaxed);
        }
    }

    /// Copy of the backing words in index order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }

    /// Re-emit the vector with a new block width.
    ///
    /// The current words are streamed to a temporary file, a fresh vector
    /// of `new_bits` bits is allocated, and each of the old blocks of
    /// `old_block_words` words is read back (buffered) into the start of
    /// the corresponding new block of `new_block_words` words; the added
    /// words stay zero. On any I/O failure this vector is left untouched
    /// and no replacement escapes.
    pub(crate) fn rewidth(
        &self,
        old_block_words: usize,
        new_block_words: usize,
        new_bits: u64,
    ) -> Result<BitVector, FilterError> {
        let mut spill = tempfile::tempfile()?;
        {
            let mut w = BufWriter::new(&mut spill);
            for word in &self.words {
                w.write_u64::<LE>(word.load(Ordering::Relaxed))?;
            }
            w.flush()?;
        }
        spill.seek(SeekFrom::Start(0))?;

        let fresh = BitVector::new(new_bits)?;
        let mut r = BufReader::new(spill);
        let blocks = self.words.len() / old_block_words;
        let keep = old_block_words.min(new_block_words);
        for block in 0..blocks {
            for w in 0..old_block_words {
                let word = r.read_u64::<LE>()?;
                if w < keep {
                    fresh.words[block * new_block_words + w].store(word, Ordering::Relaxed);
                }
            }
        }
        Ok(fresh)
    }
}
