//! Bin-block geometry: pure arithmetic shared by both filter layouts.

/// Mixing seed for the per-hash-function multipliers.
pub const SEED: u64 = 0x90b4_5d39_fb6d_a1fa;

/// Xorshift amount used in hash finalization.
pub const SHIFT: u32 = 27;

/// Bits per machine word; every block is padded to a multiple of this.
pub const WORD_BITS: u64 = 64;

/// Derived block layout for a filter of `bins` bins over `bits` total bits.
///
/// The `pre_calc` multipliers are `i ^ (k * SEED)` for each hash function
/// `i`, so `pre_calc[0]` equals `k * SEED`. For a specific `k` this value
/// could coincide with another multiplier and degrade hash-function
/// independence; the table is kept verbatim rather than deduplicated.
#[derive(Clone, Debug)]
pub struct Geometry {
    /// 64-bit words spanning one block of bins.
    pub bin_width: u64,
    /// Bits per hash block (`bin_width * 64`, >= bins).
    pub block_bit_size: u64,
    /// Number of distinct hash-block positions.
    pub blocks: u64,
    pre_calc: Vec<u64>,
}

impl Geometry {
    /// Derive the layout from `(bins, hash_funcs, kmer_size, bits)`.
    ///
    /// `hash_funcs` is zero for the direct-addressing layout, which probes
    /// the k-mer hash itself instead of the multiplier table.
    pub fn new(bins: u32, hash_funcs: u16, kmer_size: u16, bits: u64) -> Geometry {
        let bin_width = u64::from(bins).div_ceil(WORD_BITS);
        let block_bit_size = bin_width * WORD_BITS;
        let blocks = bits / block_bit_size;
        let pre_calc = (0..u64::from(hash_funcs))
            .map(|i| i ^ u64::from(kmer_size).wrapping_mul(SEED))
            .collect();
        Geometry {
            bin_width,
            block_bit_size,
            blocks,
            pre_calc,
        }
    }

    /// First bit index of the block a mixed hash value maps to.
    #[inline]
    pub fn hash_to_index(&self, mut hash: u64) -> u64 {
        hash ^= hash >> SHIFT;
        // Bring it into [0, blocks), then scale to the block's first bit.
        hash %= self.blocks;
        hash * self.block_bit_size
    }

    /// Block start index for k-mer hash `kmer_hash` under hash function `i`.
    ///
    /// The multiply wraps; overflow is part of the mixing.
    #[inline]
    pub fn probe_index(&self, kmer_hash: u64, i: usize) -> u64 {
        self.hash_to_index(self.pre_calc[i].wrapping_mul(kmer_hash))
    }
}
