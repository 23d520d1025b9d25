//! Binning directory: probabilistic k-mer membership over N reference bins.
//!
//! A directory answers, for a query string, how many of its k-mers occur
//! in each of N bins, and which bins pass a count threshold. Two layouts
//! share one block geometry:
//! - the **interleaved Bloom filter**, where the per-bin Bloom filters for
//!   one hash value form a contiguous block, so a single word-aligned read
//!   answers 64 bins at once (one-sided false positives, no false
//!   negatives);
//! - the **direct-addressing** filter for small k, where the k-mer hash is
//!   the block index and membership is exact.
//!
//! ```no_run
//! use binning_directory::BinningDirectory;
//! # fn main() -> Result<(), binning_directory::FilterError> {
//! let bd = BinningDirectory::new(64, 3, 20, 1 << 27)?;
//! bd.insert_kmer(b"TCGATCGATCGATCGATCGATCGA", 7);
//! let hits = bd.select(b"TCGATCGATCGATCGATCGATCGA", 1);
//! assert!(hits[7]);
//! # Ok(()) }
//! ```
//!
//! Bulk construction over many bins runs on a bounded worker pool; see
//! [`build_directory`]. Filters round-trip through a flat on-disk format
//! with a fixed 256-bit header via [`BinningDirectory::save`] and
//! [`BinningDirectory::load`].

mod bitvec;
mod build;
mod directory;
mod geometry;
mod io;
pub mod shape;

pub use bitvec::BitVector;
pub use build::{BinSource, BuildConfig, MemorySource, Progress, build_directory};
pub use directory::{BinningDirectory, FilterError, Layout};
pub use geometry::Geometry;
pub use io::FILTER_METADATA_BITS;
pub use shape::KmerShape;
