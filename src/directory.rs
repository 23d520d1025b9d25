//! BinningDirectory: k-mer membership over N bins, in an interleaved Bloom
//! filter or a direct-addressing layout.
//!
//! Both layouts share the block geometry: the bits answering "is this hash
//! present in bin b" for all b are stored contiguously, so one word-aligned
//! read covers 64 bins. The Bloom layout probes `h` mixed positions per
//! k-mer and may report false positives; the direct layout uses the k-mer
//! hash as the block index and is exact.

use thiserror::Error;

use crate::bitvec::BitVector;
use crate::geometry::{Geometry, WORD_BITS};
use crate::shape::KmerShape;

/// Errors surfaced by construction, I/O and resize.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Parameters out of range at construction.
    #[error("invalid filter parameters: {0}")]
    Config(String),
    /// File open/read/write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File length or header inconsistent with the parameters.
    #[error("invalid filter file: {0}")]
    Format(String),
    /// Allocation failed.
    #[error("insufficient memory: {0}")]
    Resource(String),
}

/// Bit-layout variant, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Interleaved Bloom filter probing `hash_funcs` positions per k-mer.
    Bloom {
        /// Number of Bloom hash functions (1..=5).
        hash_funcs: u16,
    },
    /// Direct addressing: the k-mer hash is the block index.
    Direct,
}

/// A k-mer binning directory over a fixed set of bins.
pub struct BinningDirectory {
    layout: Layout,
    bins: u32,
    kmer_size: u16,
    bits: u64,
    geometry: Geometry,
    bitvector: BitVector,
    current_chunk: u32,
}

impl BinningDirectory {
    /// Construct an interleaved Bloom filter directory.
    ///
    /// `bits` is the total bit-vector size and must be a multiple of the
    /// block size (`ceil(bins / 64) * 64`).
    pub fn new(bins: u32, hash_funcs: u16, kmer_size: u16, bits: u64) -> Result<Self, FilterError> {
        Self::with_layout(Layout::Bloom { hash_funcs }, bins, kmer_size, bits)
    }

    /// Construct a direct-addressing directory.
    pub fn new_direct(bins: u32, kmer_size: u16, bits: u64) -> Result<Self, FilterError> {
        Self::with_layout(Layout::Direct, bins, kmer_size, bits)
    }

    fn with_layout(
        layout: Layout,
        bins: u32,
        kmer_size: u16,
        bits: u64,
    ) -> Result<Self, FilterError> {
        let geometry = Self::validated_geometry(layout, bins, kmer_size, bits)?;
        let bitvector = BitVector::new(bits)?;
        Ok(BinningDirectory {
            layout,
            bins,
            kmer_size,
            bits,
            geometry,
            bitvector,
            current_chunk: 0,
        })
    }

    /// Rebuild a directory around an already-deserialized bit vector.
    pub(crate) fn from_parts(
        layout: Layout,
        bins: u32,
        kmer_size: u16,
        bits: u64,
        bitvector: BitVector,
    ) -> Result<Self, FilterError> {
        let geometry = Self::validated_geometry(layout, bins, kmer_size, bits)?;
        Ok(BinningDirectory {
            layout,
            bins,
            kmer_size,
            bits,
            geometry,
            bitvector,
            current_chunk: 0,
        })
    }

    fn validated_geometry(
        layout: Layout,
        bins: u32,
        kmer_size: u16,
        bits: u64,
    ) -> Result<Geometry, FilterError> {
        if bins == 0 {
            return Err(FilterError::Config("bins must be at least 1".into()));
        }
        if !(1..=32).contains(&kmer_size) {
            return Err(FilterError::Config(format!(
                "kmer_size must be 1..=32, got {kmer_size}"
            )));
        }
        let hash_funcs = match layout {
            Layout::Bloom { hash_funcs } => {
                if !(1..=5).contains(&hash_funcs) {
                    return Err(FilterError::Config(format!(
                        "hash_funcs must be 1..=5, got {hash_funcs}"
                    )));
                }
                hash_funcs
            }
            Layout::Direct => 0,
        };
        let geometry = Geometry::new(bins, hash_funcs, kmer_size, bits);
        if bits == 0 || bits % geometry.block_bit_size != 0 {
            return Err(FilterError::Config(format!(
                "bit vector size {bits} is not a multiple of the block size {}",
                geometry.block_bit_size
            )));
        }
        Ok(geometry)
    }

    /// The layout variant.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Number of bins.
    #[inline]
    pub fn bins(&self) -> u32 {
        self.bins
    }

    /// The k used by this directory.
    #[inline]
    pub fn kmer_size(&self) -> u16 {
        self.kmer_size
    }

    /// Total bit-vector size in bits.
    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// The derived block geometry.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The backing bit vector.
    #[inline]
    pub fn bitvector(&self) -> &BitVector {
        &self.bitvector
    }

    /// The chunk recorded by the last chunked insert.
    #[inline]
    pub fn current_chunk(&self) -> u32 {
        self.current_chunk
    }

    /// Insert every k-mer of `text` into bin `bin_no`.
    ///
    /// Concurrent inserters into different bins are safe; inserters into
    /// the same bin must be serialized by the caller.
    pub fn insert_kmer(&self, text: &[u8], bin_no: u32) {
        debug_assert!(bin_no < self.bins, "bin {bin_no} out of range");
        let shape = KmerShape::new(self.kmer_size as usize);
        match self.layout {
            Layout::Bloom { hash_funcs } => {
                for kmer_hash in shape.hashes(text) {
                    for i in 0..hash_funcs as usize {
                        let vec_index = self.geometry.probe_index(kmer_hash, i) + u64::from(bin_no);
                        self.bitvector.set_pos(vec_index);
                    }
                }
            }
            Layout::Direct => {
                let mut dropped = 0u64;
                for kmer_hash in shape.hashes(text) {
                    if kmer_hash >= self.geometry.blocks {
                        dropped += 1;
                        continue;
                    }
                    let vec_index = kmer_hash * self.geometry.block_bit_size + u64::from(bin_no);
                    self.bitvector.set_pos(vec_index);
                }
                if dropped > 0 {
                    eprintln!("[bd] filter too small: dropped {dropped} k-mers for bin {bin_no}");
                }
            }
        }
    }

    /// Chunked-build variant of [`insert_kmer`](Self::insert_kmer):
    /// records the active chunk, then inserts. With a single chunk the
    /// behavior is identical to `insert_kmer`.
    pub fn insert_kmer_in_chunk(&mut self, text: &[u8], bin_no: u32, chunk_no: u32) {
        self.current_chunk = chunk_no;
        self.insert_kmer(text, bin_no);
    }

    /// Count, for every bin, how many k-mers of `text` the bin contains.
    ///
    /// Not safe to run concurrently with `insert_kmer` or `clear` on the
    /// same directory; quiesce writers before querying.
    pub fn count(&self, text: &[u8]) -> Vec<u32> {
        let mut counts = vec![0u32; self.bins as usize];
        match self.layout {
            Layout::Bloom { hash_funcs } => {
                self.count_bloom(&mut counts, text, hash_funcs as usize)
            }
            Layout::Direct => self.count_direct(&mut counts, text),
        }
        counts
    }

    fn count_bloom(&self, counts: &mut [u32], text: &[u8], hash_funcs: usize) {
        let shape = KmerShape::new(self.kmer_size as usize);
        let mut vec_indices = vec![0u64; hash_funcs];
        for kmer_hash in shape.hashes(text) {
            for (i, vec_index) in vec_indices.iter_mut().enumerate() {
                *vec_index = self.geometry.probe_index(kmer_hash, i);
            }
            for batch_no in 0..self.geometry.bin_width as usize {
                let bin_no = batch_no * WORD_BITS as usize;
                // One aligned read answers this batch of 64 bins at once; a
                // k-mer is in a bin iff every hash function's bit is set.
                let mut tmp = self.bitvector.get_int(vec_indices[0], WORD_BITS);
                for vec_index in &vec_indices[1..] {
                    tmp &= self.bitvector.get_int(*vec_index, WORD_BITS);
                }
                scan_batch(counts, bin_no, tmp);
                for vec_index in vec_indices.iter_mut() {
                    *vec_index += WORD_BITS;
                }
            }
        }
    }

    fn count_direct(&self, counts: &mut [u32], text: &[u8]) {
        let shape = KmerShape::new(self.kmer_size as usize);
        for kmer_hash in shape.hashes(text) {
            if kmer_hash >= self.geometry.blocks {
                continue;
            }
            let mut vec_index = kmer_hash * self.geometry.block_bit_size;
            for batch_no in 0..self.geometry.bin_width as usize {
                let bin_no = batch_no * WORD_BITS as usize;
                let tmp = self.bitvector.get_int(vec_index, WORD_BITS);
                scan_batch(counts, bin_no, tmp);
                vec_index += WORD_BITS;
            }
        }
    }

    /// Which bins contain `text`: true where the k-mer count reaches
    /// `threshold`.
    pub fn select(&self, text: &[u8], threshold: u32) -> Vec<bool> {
        self.count(text).iter().map(|&c| c >= threshold).collect()
    }

    /// Reset the listed bins to zero across all blocks, using `threads`
    /// workers over contiguous block ranges.
    pub fn clear(&self, bins: &[u32], threads: usize) -> Result<(), FilterError> {
        let threads = threads.max(1) as u64;
        let blocks = self.geometry.blocks;
        let mut batch_size = blocks / threads;
        if batch_size * threads < blocks {
            batch_size += 1;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .build()
            .map_err(|e| FilterError::Resource(format!("cannot build worker pool: {e}")))?;
        pool.scope(|s| {
            for task_no in 0..threads {
                s.spawn(move |_| {
                    let hi = blocks.min((task_no + 1) * batch_size);
                    for hash_block in task_no * batch_size..hi {
                        let vec_pos = hash_block * self.geometry.block_bit_size;
                        for &bin_no in bins {
                            self.bitvector.unset_pos(vec_pos + u64::from(bin_no));
                        }
                    }
                });
            }
        });
        Ok(())
    }

    /// Grow the directory to `new_bins` bins.
    ///
    /// The bit vector grows proportionally to the bin-width increase (e.g.
    /// 40 -> 73 bins doubles it): every block keeps its hash position, so
    /// no re-hashing is needed, and the added bin columns start zero. The
    /// old vector is streamed through disk, so peak memory is the new
    /// vector plus buffering. Only the Bloom layout supports this.
    pub fn resize_bins(&mut self, new_bins: u32) -> Result<(), FilterError> {
        if self.layout == Layout::Direct {
            return Err(FilterError::Config(
                "resize_bins is only available for the interleaved Bloom filter layout".into(),
            ));
        }
        if new_bins < self.bins {
            return Err(FilterError::Config(format!(
                "cannot shrink from {} to {new_bins} bins",
                self.bins
            )));
        }
        let hash_funcs = match self.layout {
            Layout::Bloom { hash_funcs } => hash_funcs,
            Layout::Direct => unreachable!(),
        };
        let new_block_bit_size = u64::from(new_bins).div_ceil(WORD_BITS) * WORD_BITS;
        let new_bits = self.geometry.blocks * new_block_bit_size;
        let new_geometry = Geometry::new(new_bins, hash_funcs, self.kmer_size, new_bits);
        let fresh = self.bitvector.rewidth(
            self.geometry.bin_width as usize,
            new_geometry.bin_width as usize,
            new_bits,
        )?;
        self.bitvector = fresh;
        self.geometry = new_geometry;
        self.bins = new_bins;
        self.bits = new_bits;
        Ok(())
    }
}

/// Count the set bits of one 64-bin batch into `counts`, starting at
/// `bin_no`, via repeated bit-scan-low.
///
/// Shifting a 64-bit value by 64 is undefined, so a word holding only its
/// top bit is counted directly instead of entering the scan loop.
#[inline]
fn scan_batch(counts: &mut [u32], mut bin_no: usize, mut tmp: u64) {
    if tmp ^ (1u64 << (WORD_BITS - 1)) != 0 {
        while tmp > 0 {
            let step = tmp.trailing_zeros() as usize;
            bin_no += step;
            tmp >>= step + 1;
            counts[bin_no] += 1;
            bin_no += 1;
        }
    } else {
        counts[bin_no + WORD_BITS as usize - 1] += 1;
    }
}
